//! Linear undo/redo history of content snapshots.
//!
//! - Saving after an undo discards everything newer than the current entry.
//! - A save identical to the current entry discards the redo branch but
//!   pushes nothing.
//! - With a limit, the oldest entries are dropped once the stack overflows.

use crate::selection::SelectionPath;

/// Default number of snapshots kept per editor.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Serialized content plus the selection at the time it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: String,
    pub selection: Option<SelectionPath>,
}

impl Snapshot {
    #[must_use]
    pub fn new(content: impl Into<String>, selection: Option<SelectionPath>) -> Self {
        Self {
            content: content.into(),
            selection,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    stack: Vec<Snapshot>,
    pointer: Option<usize>,
    limit: Option<usize>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A history that keeps at most `limit` snapshots (minimum one).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Discard everything after the current entry, then push the snapshot.
    /// Returns `false` when it matched the current entry and was not pushed.
    pub fn save(&mut self, snapshot: Snapshot) -> bool {
        match self.pointer {
            Some(pointer) => self.stack.truncate(pointer + 1),
            None => self.stack.clear(),
        }
        if self.stack.last() == Some(&snapshot) {
            return false;
        }
        self.stack.push(snapshot);
        if let Some(limit) = self.limit
            && self.stack.len() > limit
        {
            let overflow = self.stack.len().saturating_sub(limit);
            self.stack.drain(0..overflow);
        }
        self.pointer = self.stack.len().checked_sub(1);
        true
    }

    /// Step back one entry. `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        let pointer = self.pointer.filter(|&p| p > 0)?;
        self.pointer = Some(pointer - 1);
        self.stack.get(pointer - 1)
    }

    /// Step forward one entry. `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.pointer.map_or(0, |p| p + 1);
        if next >= self.stack.len() {
            return None;
        }
        self.pointer = Some(next);
        self.stack.get(next)
    }

    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.stack.get(self.pointer?)
    }

    #[must_use]
    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.pointer.is_some_and(|p| p > 0)
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.pointer.map_or(0, |p| p + 1) < self.stack.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.pointer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(content: &str) -> Snapshot {
        Snapshot::new(content, None)
    }

    fn content(snapshot: Option<&Snapshot>) -> Option<&str> {
        snapshot.map(|s| s.content.as_str())
    }

    #[test]
    fn undo_and_redo_walk_the_stack() {
        let mut history = History::new();
        for c in ["A", "B", "C"] {
            assert!(history.save(snap(c)));
        }
        assert_eq!(history.pointer(), Some(2));
        assert_eq!(content(history.undo()), Some("B"));
        assert_eq!(content(history.undo()), Some("A"));
        assert!(history.undo().is_none());
        assert_eq!(history.pointer(), Some(0));
        assert_eq!(content(history.redo()), Some("B"));
        assert_eq!(content(history.redo()), Some("C"));
        assert!(history.redo().is_none());
    }

    #[test]
    fn save_after_undo_discards_redo_branch() {
        let mut history = History::new();
        for c in ["A", "B", "C"] {
            history.save(snap(c));
        }
        history.undo();
        history.undo();
        history.save(snap("D"));

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(content(history.undo()), Some("A"));
        assert_eq!(content(history.redo()), Some("D"));
    }

    #[test]
    fn consecutive_duplicates_are_skipped() {
        let mut history = History::new();
        assert!(history.save(snap("A")));
        assert!(!history.save(snap("A")));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
    }

    #[test]
    fn duplicate_save_after_undo_still_discards_redo_branch() {
        let mut history = History::new();
        history.save(snap("A"));
        history.save(snap("B"));
        assert_eq!(content(history.undo()), Some("A"));

        assert!(!history.save(snap("A")));
        assert_eq!(history.len(), 1);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(content(history.current()), Some("A"));
    }

    #[test]
    fn limit_drops_oldest_entries() {
        let mut history = History::with_limit(2);
        for c in ["A", "B", "C"] {
            history.save(snap(c));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.pointer(), Some(1));
        assert_eq!(content(history.undo()), Some("B"));
        assert!(history.undo().is_none());
    }

    #[test]
    fn empty_history_has_nothing_to_walk() {
        let mut history = History::new();
        assert!(history.is_empty());
        assert!(history.current().is_none());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        history.save(snap("A"));
        history.clear();
        assert!(history.current().is_none());
    }
}
