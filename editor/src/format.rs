//! Formatting toggles over a selection.
//!
//! Every operation takes the current selection and returns the selection to
//! use afterwards, or `None` when it did nothing. A missing, collapsed, or
//! text-free selection is always a no-op.

use backoffice_types::{FormatCommand, ListKind};

use crate::document::{Document, Element, NodeData, NodeId};
use crate::selection::{Position, Selection};

/// Tags treated as formatting when [`Document::clear_formatting`] runs
/// without a filter.
const FORMATTING_TAGS: &[&str] = &[
    "b", "strong", "i", "em", "u", "s", "strike", "del", "ins", "mark", "code", "sub", "sup",
    "small", "big", "font", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "ul", "ol", "li",
];

/// Classes a wrapper gets, and the group of classes that cannot coexist
/// with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassConfig {
    classes: Vec<String>,
    exclusive_with: Vec<String>,
}

impl ClassConfig {
    /// Whitespace-separated class list.
    #[must_use]
    pub fn new(classes: &str) -> Self {
        Self {
            classes: classes.split_whitespace().map(str::to_string).collect(),
            exclusive_with: Vec::new(),
        }
    }

    #[must_use]
    pub fn exclusive_with(mut self, group: &[&str]) -> Self {
        self.exclusive_with = group.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn exclusive_group(&self) -> &[String] {
        &self.exclusive_with
    }
}

impl From<&str> for ClassConfig {
    fn from(classes: &str) -> Self {
        Self::new(classes)
    }
}

impl From<FormatCommand> for ClassConfig {
    fn from(command: FormatCommand) -> Self {
        Self::new(command.classes()).exclusive_with(command.exclusive_classes())
    }
}

/// Narrows [`Document::clear_formatting`]. With neither field set, any
/// element carrying a class, an inline style, or a formatting tag matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFilter<'a> {
    pub tag: Option<&'a str>,
    pub class: Option<&'a str>,
}

impl<'a> FormatFilter<'a> {
    #[must_use]
    pub const fn any() -> Self {
        Self {
            tag: None,
            class: None,
        }
    }

    #[must_use]
    pub const fn tag(tag: &'a str) -> Self {
        Self {
            tag: Some(tag),
            class: None,
        }
    }

    #[must_use]
    pub const fn class(class: &'a str) -> Self {
        Self {
            tag: None,
            class: Some(class),
        }
    }

    fn matches(&self, element: &Element) -> bool {
        if self.tag.is_none() && self.class.is_none() {
            return element.has_classes()
                || element.attr("style").is_some()
                || FORMATTING_TAGS.contains(&element.name());
        }
        self.tag.is_none_or(|tag| element.is(tag))
            && self.class.is_none_or(|class| element.has_class(class))
    }
}

impl Document {
    /// The selection, if it is usable for formatting.
    #[must_use]
    pub fn active_range(&self, selection: Option<&Selection>) -> Option<Selection> {
        let selection = *selection?;
        if selection.is_collapsed()
            || !self.is_valid_position(selection.anchor)
            || !self.is_valid_position(selection.focus)
            || self.selected_text(&selection).is_empty()
        {
            return None;
        }
        Some(selection)
    }

    /// Wrap the selection in `<tag>` with the configured classes, or toggle
    /// those classes on a `<tag>` that already wraps it.
    ///
    /// A wrapper left with no classes is removed, so applying the same toggle
    /// twice restores the original markup.
    pub fn toggle_selection_with_tag(
        &mut self,
        selection: &Selection,
        tag: &str,
        config: &ClassConfig,
    ) -> Option<Selection> {
        let selection = self.active_range(Some(selection))?;

        if let Some((wrapper, selection)) = self.existing_wrapper(&selection, tag) {
            let element = self.element_mut(wrapper)?;
            if config.classes().is_empty() {
                element.remove_attr("class");
            }
            for class in config.classes() {
                if element.has_class(class) {
                    element.remove_class(class);
                } else {
                    for other in config.exclusive_group() {
                        if other != class {
                            element.remove_class(other);
                        }
                    }
                    element.add_class(class);
                }
            }
            if element.has_classes() {
                tracing::debug!(tag, "Toggled classes on existing wrapper");
                return Some(selection);
            }
            let (parent, start, end) = self.unwrap_node(wrapper)?;
            tracing::debug!(tag, "Removed wrapper");
            return Some(Selection::new(
                Position::new(parent, start),
                Position::new(parent, end),
            ));
        }

        let (parent, start, end) = self.isolate(&selection, None)?;
        let mut element = Element::new(tag);
        for class in config.classes() {
            element.add_class(class);
        }
        self.wrap_children(parent, start, end, element);
        tracing::debug!(tag, "Wrapped selection");
        Some(Selection::caret(Position::new(parent, start + 1)))
    }

    /// Whether a `<tag>` (optionally carrying `class`) encloses the
    /// selection's focus.
    #[must_use]
    pub fn is_tag_active(
        &self,
        selection: Option<&Selection>,
        tag: &str,
        class: Option<&str>,
    ) -> bool {
        let Some(selection) = selection else {
            return false;
        };
        if !self.is_valid_position(selection.focus) {
            return false;
        }
        self.enclosing(selection.focus.node, tag, class).is_some()
    }

    /// Replace the nearest `<tag>` around the selection's focus with its
    /// children. The new selection spans those children.
    pub fn unwrap_tag(&mut self, selection: &Selection, tag: &str) -> Option<Selection> {
        let selection = self.active_range(Some(selection))?;
        let target = self.enclosing(selection.focus.node, tag, None)?;
        let (parent, start, end) = self.unwrap_node(target)?;
        Some(Selection::new(
            Position::new(parent, start),
            Position::new(parent, end),
        ))
    }

    /// Replace formatted elements in the selection with plain `<span>`s
    /// holding only their text.
    ///
    /// A matching element that encloses the selection is split so only the
    /// selected part loses its formatting.
    pub fn clear_formatting(
        &mut self,
        selection: &Selection,
        filter: FormatFilter<'_>,
    ) -> Option<Selection> {
        let selection = self.active_range(Some(selection))?;
        let (start, end) = self.ordered(&selection);
        let common = self.element_at(self.common_ancestor(start.node, end.node));
        let root = self.root();
        let ceiling = self
            .self_and_ancestors(common)
            .take_while(|&id| id != root)
            .filter(|&id| self.element(id).is_some_and(|el| filter.matches(el)))
            .last()
            .and_then(|outermost| self.parent(outermost));
        if ceiling.is_none() && !self.has_match_within(common, start, end, filter) {
            return None;
        }

        let (parent, from, to) = self.isolate(&selection, ceiling)?;
        let originals = self.children(parent)[from..to].to_vec();
        let mut cleaned = Vec::with_capacity(originals.len());
        for &id in &originals {
            cleaned.extend(self.cleaned_copy(id, filter));
        }
        for id in originals {
            self.detach(id);
        }
        for (offset, &id) in cleaned.iter().enumerate() {
            self.insert_child(parent, from + offset, id);
        }
        tracing::debug!(replaced = cleaned.len(), "Cleared formatting");
        Some(Selection::new(
            Position::new(parent, from),
            Position::new(parent, from + cleaned.len()),
        ))
    }

    /// Toggle a list of `kind`. A list of the other kind around the selection
    /// is unwrapped first.
    pub fn toggle_list(&mut self, selection: &Selection, kind: ListKind) -> Option<Selection> {
        let selection = self.active_range(Some(selection))?;
        if self.is_tag_active(Some(&selection), kind.tag(), None) {
            return self.unwrap_tag(&selection, kind.tag());
        }
        let selection = if self.is_tag_active(Some(&selection), kind.other().tag(), None) {
            self.unwrap_tag(&selection, kind.other().tag())?
        } else {
            selection
        };
        self.toggle_selection_with_tag(&selection, kind.tag(), &ClassConfig::new(kind.classes()))
    }

    /// Nearest element at or above `node`, below the root, named `tag`.
    fn enclosing(&self, node: NodeId, tag: &str, class: Option<&str>) -> Option<NodeId> {
        let root = self.root();
        self.self_and_ancestors(node)
            .take_while(|&id| id != root)
            .find(|&id| {
                self.element(id)
                    .is_some_and(|el| el.is(tag) && class.is_none_or(|c| el.has_class(c)))
            })
    }

    /// Whether an element below `scope` that overlaps `start..end` matches
    /// `filter`.
    fn has_match_within(
        &self,
        scope: NodeId,
        start: Position,
        end: Position,
        filter: FormatFilter<'_>,
    ) -> bool {
        let mut stack = self.children(scope).to_vec();
        while let Some(id) = stack.pop() {
            let Some(element) = self.element(id) else {
                continue;
            };
            if !self.overlaps(id, start, end) {
                continue;
            }
            if filter.matches(element) {
                return true;
            }
            stack.extend_from_slice(self.children(id));
        }
        false
    }

    fn overlaps(&self, id: NodeId, start: Position, end: Position) -> bool {
        let (Some(parent), Some(index)) = (self.parent(id), self.index_in_parent(id)) else {
            return false;
        };
        self.compare(Position::new(parent, index + 1), start).is_gt()
            && self.compare(Position::new(parent, index), end).is_lt()
    }

    /// A `<tag>` around the selection, paired with a selection spanning it.
    ///
    /// An enclosing `<tag>` that holds more than the selection is split so the
    /// returned wrapper holds exactly the selected content.
    fn existing_wrapper(
        &mut self,
        selection: &Selection,
        tag: &str,
    ) -> Option<(NodeId, Selection)> {
        let (start, end) = self.ordered(selection);
        if start.node == end.node
            && self.element(start.node).is_some()
            && end.offset == start.offset + 1
            && let Some(&only) = self.children(start.node).get(start.offset)
            && self.is_tag(only, tag)
        {
            return Some((only, *selection));
        }

        let common = self.element_at(self.common_ancestor(start.node, end.node));
        let enclosing = self.enclosing(common, tag, None)?;
        let ceiling = self.parent(enclosing)?;
        let (parent, index, _) = self.isolate(selection, Some(ceiling))?;
        let wrapper = *self.children(parent).get(index)?;
        let len = self.children(wrapper).len();
        Some((
            wrapper,
            Selection::new(Position::new(wrapper, 0), Position::new(wrapper, len)),
        ))
    }

    fn cleaned_copy(&mut self, id: NodeId, filter: FormatFilter<'_>) -> Vec<NodeId> {
        match self.data(id).clone() {
            NodeData::Text(text) => vec![self.create_text(text)],
            NodeData::Element(element) if filter.matches(&element) => {
                let text = self.text_content(id);
                if text.is_empty() {
                    return Vec::new();
                }
                let span = self.create_element(Element::new("span"));
                let text = self.create_text(text);
                self.append_child(span, text);
                vec![span]
            }
            NodeData::Element(element) => {
                let copy = self.create_element(element);
                for child in self.children(id).to_vec() {
                    for cleaned in self.cleaned_copy(child, filter) {
                        self.append_child(copy, cleaned);
                    }
                }
                vec![copy]
            }
        }
    }

    /// Split nodes so the selection covers whole children of one element.
    ///
    /// Returns that element and the half-open child range. With a `ceiling`
    /// above the common ancestor, the intermediate elements are split too so
    /// the range sits directly under `ceiling`.
    fn isolate(
        &mut self,
        selection: &Selection,
        ceiling: Option<NodeId>,
    ) -> Option<(NodeId, usize, usize)> {
        let (start, end) = self.ordered(selection);

        // End first: splitting there never moves the start boundary.
        let (mut end, _) = self.boundary_before(end)?;
        let (mut start, start_split) = self.boundary_before(start)?;
        // The split tail was inserted at `start.1` in the same parent.
        if start_split && end.0 == start.0 && end.1 >= start.1 {
            end.1 += 1;
        }

        let common = self.common_ancestor(start.0, end.0);

        while start.0 != common {
            let node = start.0;
            let parent = self.parent(node)?;
            let index = self.index_in_parent(node)?;
            if start.1 == 0 {
                start = (parent, index);
            } else if start.1 >= self.children(node).len() {
                start = (parent, index + 1);
            } else {
                self.split_element(node, start.1)?;
                start = (parent, index + 1);
                if end.0 == parent && end.1 > index {
                    end.1 += 1;
                }
            }
        }

        while end.0 != common {
            let node = end.0;
            let parent = self.parent(node)?;
            let index = self.index_in_parent(node)?;
            if end.1 == 0 {
                end = (parent, index);
            } else if end.1 >= self.children(node).len() {
                end = (parent, index + 1);
            } else {
                self.split_element(node, end.1)?;
                end = (parent, index + 1);
            }
        }

        let mut range = (common, start.1, end.1);
        if range.1 >= range.2 {
            return None;
        }
        if let Some(ceiling) = ceiling
            && self.self_and_ancestors(common).any(|id| id == ceiling)
        {
            while range.0 != ceiling {
                range = self.split_around(range)?;
            }
        }
        Some(range)
    }

    /// Convert a position into an `(element, child index)` boundary,
    /// splitting a text node when the offset falls inside it. The flag tells
    /// whether a split happened.
    fn boundary_before(&mut self, position: Position) -> Option<((NodeId, usize), bool)> {
        let Some(len) = self.text(position.node).map(|t| t.chars().count()) else {
            return Some(((position.node, position.offset), false));
        };
        let parent = self.parent(position.node)?;
        let index = self.index_in_parent(position.node)?;
        if position.offset == 0 {
            Some(((parent, index), false))
        } else if position.offset >= len {
            Some(((parent, index + 1), false))
        } else {
            self.split_text(position.node, position.offset)?;
            Some(((parent, index + 1), true))
        }
    }

    /// Split `node` around its children `start..end` and return the middle
    /// part's place in the parent.
    fn split_around(
        &mut self,
        (node, start, end): (NodeId, usize, usize),
    ) -> Option<(NodeId, usize, usize)> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        if end < self.children(node).len() {
            self.split_element(node, end)?;
        }
        if start > 0 {
            self.split_element(node, start)?;
            return Some((parent, index + 1, index + 2));
        }
        Some((parent, index, index + 1))
    }
}
