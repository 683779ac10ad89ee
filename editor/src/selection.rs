use crate::document::{Document, NodeId};

/// A boundary point: a character offset inside a text node, or a child index
/// inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    #[must_use]
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A selection as the user made it. `anchor` may come after `focus`; use
/// [`Document::ordered`] for document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    #[must_use]
    pub const fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    #[must_use]
    pub const fn caret(at: Position) -> Self {
        Self {
            anchor: at,
            focus: at,
        }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A selection stored as child-index paths from the root, so it can be
/// re-resolved after the content is re-parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionPath {
    pub start_path: Vec<usize>,
    pub start_offset: usize,
    pub end_path: Vec<usize>,
    pub end_offset: usize,
}

impl SelectionPath {
    /// `None` when either boundary is detached from the document.
    #[must_use]
    pub fn capture(document: &Document, selection: &Selection) -> Option<Self> {
        let (start, end) = document.ordered(selection);
        Some(Self {
            start_path: document.path_of(start.node)?,
            start_offset: start.offset,
            end_path: document.path_of(end.node)?,
            end_offset: end.offset,
        })
    }

    /// `None` when a path or offset no longer fits the document.
    #[must_use]
    pub fn resolve(&self, document: &Document) -> Option<Selection> {
        let start = Position::new(document.resolve_path(&self.start_path)?, self.start_offset);
        let end = Position::new(document.resolve_path(&self.end_path)?, self.end_offset);
        (document.is_valid_position(start) && document.is_valid_position(end))
            .then(|| Selection::new(start, end))
    }
}
