//! Arena-backed HTML fragment tree.
//!
//! Content is parsed with `scraper` (html5ever) and copied into a flat node
//! arena so the formatting toggles can split, wrap, and unwrap nodes without
//! fighting borrow rules. Detached nodes stay in the arena until
//! [`Document::compact`] or the next [`Document::set_inner_html`].

use std::cmp::Ordering;

use scraper::{ElementRef, Html, Node as HtmlNode};

use crate::selection::{Position, Selection};

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An element's tag name and attributes, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    #[must_use]
    pub fn has_classes(&self) -> bool {
        self.classes().next().is_some()
    }

    pub fn add_class(&mut self, class: &str) {
        if class.is_empty() || self.has_class(class) {
            return;
        }
        let joined = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    /// Remove `class`; drops the attribute once no classes remain.
    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let remaining: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attr("class");
        } else {
            let joined = remaining.join(" ");
            self.set_attr("class", joined);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An editable HTML fragment under a single root container.
///
/// The root stands in for the editable host element: it is never wrapped,
/// unwrapped, or serialized itself.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    const ROOT: NodeId = NodeId(0);

    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Element(Element::new("div")),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    #[must_use]
    pub fn parse(html: &str) -> Self {
        let mut document = Self::new();
        document.import_fragment(html);
        document
    }

    /// Replace the whole content. Every previously issued [`NodeId`] except
    /// the root becomes invalid.
    pub fn set_inner_html(&mut self, html: &str) {
        self.nodes.truncate(1);
        self.nodes[Self::ROOT.0].children.clear();
        self.import_fragment(html);
    }

    fn import_fragment(&mut self, html: &str) {
        let fragment = Html::parse_fragment(html);
        self.import_children(Self::ROOT, fragment.root_element());
    }

    fn import_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                HtmlNode::Text(text) => {
                    let text: &str = text;
                    let id = self.create_text(text);
                    self.append_child(parent, id);
                }
                HtmlNode::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        let mut element = Element::new(el.value().name());
                        for (name, value) in el.value().attrs() {
                            element.set_attr(name, value);
                        }
                        let id = self.create_element(element);
                        self.append_child(parent, id);
                        self.import_children(id, el);
                    }
                }
                // Comments and doctypes are not editable content.
                _ => {}
            }
        }
    }

    #[must_use]
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for &child in self.children(Self::ROOT) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) => escape_text(text, out),
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(element.name());
                for (name, value) in element.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.name()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(element.name());
                out.push('>');
            }
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    #[must_use]
    pub const fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Arena slots in use, detached nodes included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    #[must_use]
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    #[must_use]
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.element(id).is_some_and(|el| el.is(tag))
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[must_use]
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// `id` itself, then each ancestor up to and including the root.
    pub fn self_and_ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |&node| self.parent(node))
    }

    /// Whether `id` is still reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains_node(id) && self.self_and_ancestors(id).last() == Some(Self::ROOT)
    }

    /// Characters for text nodes, children for elements.
    #[must_use]
    pub fn node_len(&self, id: NodeId) -> usize {
        match self.data(id) {
            NodeData::Text(text) => text.chars().count(),
            NodeData::Element(_) => self.children(id).len(),
        }
    }

    #[must_use]
    pub fn is_valid_position(&self, position: Position) -> bool {
        self.is_attached(position.node) && position.offset <= self.node_len(position.node)
    }

    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(_) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Attached text nodes in document order.
    #[must_use]
    pub fn text_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            match self.data(id) {
                NodeData::Text(_) => out.push(id),
                NodeData::Element(_) => stack.extend(self.children(id).iter().rev()),
            }
        }
        out
    }

    /// First occurrence of `needle` inside a single text node, as the node and
    /// the character offset where the match starts.
    #[must_use]
    pub fn find_text(&self, needle: &str) -> Option<(NodeId, usize)> {
        if needle.is_empty() {
            return None;
        }
        self.text_nodes().into_iter().find_map(|id| {
            let text = self.text(id)?;
            let byte = text.find(needle)?;
            Some((id, text[..byte].chars().count()))
        })
    }

    // ========================================================================
    // Paths and ordering
    // ========================================================================

    /// Child indices from the root down to `id`. `None` for detached nodes.
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut node = id;
        while node != Self::ROOT {
            path.push(self.index_in_parent(node)?);
            node = self.parent(node)?;
        }
        path.reverse();
        Some(path)
    }

    #[must_use]
    pub fn resolve_path(&self, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(Self::ROOT, |node, &index| self.children(node).get(index).copied())
    }

    fn boundary_key(&self, position: Position) -> Vec<usize> {
        let mut key = self.path_of(position.node).unwrap_or_default();
        key.push(position.offset);
        key
    }

    /// Document order of two boundary points.
    #[must_use]
    pub fn compare(&self, a: Position, b: Position) -> Ordering {
        self.boundary_key(a).cmp(&self.boundary_key(b))
    }

    /// The selection's boundaries as `(start, end)` in document order.
    #[must_use]
    pub fn ordered(&self, selection: &Selection) -> (Position, Position) {
        if self.compare(selection.anchor, selection.focus) == Ordering::Greater {
            (selection.focus, selection.anchor)
        } else {
            (selection.anchor, selection.focus)
        }
    }

    #[must_use]
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let chain: Vec<NodeId> = self.self_and_ancestors(a).collect();
        self.self_and_ancestors(b)
            .find(|node| chain.contains(node))
            .unwrap_or(Self::ROOT)
    }

    /// The element closest to `id`: `id` itself, or a text node's parent.
    #[must_use]
    pub fn element_at(&self, id: NodeId) -> NodeId {
        match self.data(id) {
            NodeData::Element(_) => id,
            NodeData::Text(_) => self.parent(id).unwrap_or(Self::ROOT),
        }
    }

    /// Text covered by the selection.
    #[must_use]
    pub fn selected_text(&self, selection: &Selection) -> String {
        if !self.is_valid_position(selection.anchor) || !self.is_valid_position(selection.focus) {
            return String::new();
        }
        let (start, end) = self.ordered(selection);
        let mut out = String::new();
        for id in self.text_nodes() {
            let Some(text) = self.text(id) else { continue };
            let len = text.chars().count();
            let from = Position::new(id, 0);
            let to = Position::new(id, len);
            if self.compare(to, start) != Ordering::Greater
                || self.compare(from, end) != Ordering::Less
            {
                continue;
            }
            let skip = if start.node == id { start.offset } else { 0 };
            let take = if end.node == id { end.offset } else { len };
            out.extend(text.chars().skip(skip).take(take.saturating_sub(skip)));
        }
        out
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub(crate) fn create_element(&mut self, element: Element) -> NodeId {
        self.push_node(NodeData::Element(element))
    }

    pub(crate) fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    pub(crate) fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Split a text node at a character offset. The tail becomes a new
    /// sibling directly after `id`.
    pub(crate) fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        let NodeData::Text(text) = &mut self.nodes[id.0].data else {
            return None;
        };
        let byte = text.char_indices().nth(offset).map(|(i, _)| i)?;
        let tail = text.split_off(byte);
        let tail = self.create_text(tail);
        self.insert_child(parent, index + 1, tail);
        Some(tail)
    }

    /// Split an element before child `index`. A shallow clone holding the
    /// moved tail children is inserted directly after `id`.
    pub(crate) fn split_element(&mut self, id: NodeId, index: usize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.index_in_parent(id)?;
        let clone = self.element(id)?.clone();
        let tail: Vec<NodeId> = self.children(id).get(index..)?.to_vec();
        let twin = self.create_element(clone);
        for child in tail {
            self.append_child(twin, child);
        }
        self.insert_child(parent, position + 1, twin);
        Some(twin)
    }

    /// Move children `start..end` of `parent` into a new `element` placed
    /// where they were.
    pub(crate) fn wrap_children(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        element: Element,
    ) -> NodeId {
        let moved: Vec<NodeId> = self.children(parent)[start..end].to_vec();
        let wrapper = self.create_element(element);
        for child in moved {
            self.append_child(wrapper, child);
        }
        self.insert_child(parent, start, wrapper);
        wrapper
    }

    /// Replace `id` with its children. Returns the parent and the index range
    /// the children now occupy.
    pub(crate) fn unwrap_node(&mut self, id: NodeId) -> Option<(NodeId, usize, usize)> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        let children = self.children(id).to_vec();
        self.detach(id);
        for (offset, &child) in children.iter().enumerate() {
            self.insert_child(parent, index + offset, child);
        }
        Some((parent, index, index + children.len()))
    }

    /// Merge adjacent text nodes and drop empty ones, keeping `positions`
    /// pointing at the same content.
    ///
    /// A normalized tree keeps its shape across a serialize/parse round trip,
    /// so paths taken from it stay meaningful.
    pub fn normalize(&mut self, positions: &mut [Position]) {
        self.normalize_node(Self::ROOT, positions);
    }

    /// Drop detached nodes from the arena and renumber the rest in document
    /// order, remapping `positions`. A position on a detached node falls back
    /// to the start of the root.
    ///
    /// Every [`NodeId`] not passed in `positions` is invalid afterwards.
    pub fn compact(&mut self, positions: &mut [Position]) {
        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            remap[id.0] = Some(NodeId(order.len()));
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        if order.len() == self.nodes.len() {
            return;
        }

        let mut old = std::mem::take(&mut self.nodes);
        tracing::trace!(dropped = old.len() - order.len(), "Compacted document arena");
        self.nodes = order
            .iter()
            .map(|&id| {
                let node = &mut old[id.0];
                Node {
                    data: std::mem::replace(&mut node.data, NodeData::Text(String::new())),
                    parent: node.parent.and_then(|p| remap[p.0]),
                    children: node.children.iter().filter_map(|c| remap[c.0]).collect(),
                }
            })
            .collect();

        for position in positions.iter_mut() {
            *position = match remap.get(position.node.0).copied().flatten() {
                Some(node) => Position::new(node, position.offset),
                None => Position::new(Self::ROOT, 0),
            };
        }
    }

    fn normalize_node(&mut self, id: NodeId, positions: &mut [Position]) {
        let children = self.children(id).to_vec();
        for &child in &children {
            if self.element(child).is_some() {
                self.normalize_node(child, positions);
            }
        }

        let mut kept = Vec::with_capacity(children.len());
        // Where each old boundary index lands: an element boundary index in
        // the new child list, or a text position inside a merged run.
        let mut boundaries: Vec<Position> = Vec::with_capacity(children.len() + 1);
        let mut run: Option<(NodeId, usize)> = None;
        // Positions that already point at the new child list.
        let mut settled: Vec<(usize, Position)> = Vec::new();

        for &child in &children {
            let Some(len) = self.text(child).map(|t| t.chars().count()) else {
                boundaries.push(Position::new(id, kept.len()));
                kept.push(child);
                run = None;
                continue;
            };
            match run {
                Some((head, base)) => {
                    boundaries.push(Position::new(head, base));
                    for position in positions.iter_mut().filter(|p| p.node == child) {
                        *position = Position::new(head, base + position.offset);
                    }
                    let tail = self.text(child).unwrap_or_default().to_string();
                    if let NodeData::Text(text) = &mut self.nodes[head.0].data {
                        text.push_str(&tail);
                    }
                    self.nodes[child.0].parent = None;
                    run = Some((head, base + len));
                }
                None if len == 0 => {
                    boundaries.push(Position::new(id, kept.len()));
                    for (slot, position) in positions.iter().enumerate() {
                        if position.node == child {
                            settled.push((slot, Position::new(id, kept.len())));
                        }
                    }
                    self.nodes[child.0].parent = None;
                }
                None => {
                    boundaries.push(Position::new(id, kept.len()));
                    kept.push(child);
                    run = Some((child, len));
                }
            }
        }
        boundaries.push(Position::new(id, kept.len()));

        for position in positions.iter_mut().filter(|p| p.node == id) {
            if let Some(mapped) = boundaries.get(position.offset) {
                *position = *mapped;
            }
        }
        for (slot, position) in settled {
            positions[slot] = position;
        }
        self.nodes[id.0].children = kept;
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
