//! Rich-text editing core for the dashboard's content fields.
//!
//! # Architecture
//!
//! - [`Document`] - the editable HTML fragment, held as a node arena
//! - [`Selection`] - anchor/focus boundary points into the document
//! - formatting toggles on [`Document`] - wrap, unwrap, re-class, and clear
//!   formatting over a selection
//! - [`History`] - linear undo/redo of serialized snapshots
//! - [`Editor`] - ties the above together and records a snapshot after every
//!   successful change
//!
//! Formatting is expressed as utility classes on wrapper elements
//! (`<strong class="font-bold">`), so toggling the same command twice removes
//! the wrapper again.

mod document;
mod editor;
mod format;
mod history;
mod selection;

pub use backoffice_types::{Alignment, FormatCommand, HeadingLevel, ListKind};
pub use document::{Document, Element, NodeData, NodeId};
pub use editor::{Editor, EditorSettings, restore_snapshot};
pub use format::{ClassConfig, FormatFilter};
pub use history::{DEFAULT_HISTORY_LIMIT, History, Snapshot};
pub use selection::{Position, Selection, SelectionPath};
