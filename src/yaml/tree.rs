//! YAML document tree (spec §4.9 "YAML document tree", §9 "Cyclic
//! back-references"): an arena of nodes with parent indices rather than
//! owned child pointers, so `parent()` is a cheap index lookup instead of
//! a weak/back-reference.
//!
//! Built by [`YamlHandler`](super::YamlHandler) events — [`TreeBuilder`]
//! is the handler the YAML parser drives to produce a [`Document`].

use crate::yaml::parser::{self, YamlHandler};
use crate::strings::StrView;
use crate::error::Result;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Map(Vec<(NodeId, NodeId)>),
    Sequence(Vec<NodeId>),
    String(String),
    Number(f64),
    BooleanTrue,
    BooleanFalse,
    Null,
    Unset,
}

#[derive(Debug, Clone)]
pub struct Node {
    value: NodeValue,
    parent: Option<NodeId>,
}

/// One parsed document (a `---`-delimited unit) as an arena of nodes.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Document {
    fn alloc(&mut self, value: NodeValue, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node { value, parent });
        self.nodes.len() - 1
    }

    pub fn root(&self) -> Option<NodeView<'_>> {
        self.root.map(|id| NodeView { doc: self, id })
    }

    pub fn node(&self, id: NodeId) -> NodeView<'_> {
        NodeView { doc: self, id }
    }
}

/// A borrowed view of one node plus the arena it lives in — mirrors the
/// `(pointer-into-arena, arena-lifetime)` shape used by [`StrView`]
/// elsewhere in this crate.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    /// Stable, pointer-like identifier for reference-equality testing
    /// (spec §4.9 `identity()`): the node's arena index.
    pub fn identity(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeView<'a>> {
        self.doc.nodes[self.id].parent.map(|id| NodeView { doc: self.doc, id })
    }

    pub fn child_count(&self) -> usize {
        match &self.doc.nodes[self.id].value {
            NodeValue::Map(pairs) => pairs.len(),
            NodeValue::Sequence(items) => items.len(),
            _ => 0,
        }
    }

    pub fn child(&self, index: usize) -> Option<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Map(pairs) => pairs.get(index).map(|(_, v)| NodeView { doc: self.doc, id: *v }),
            NodeValue::Sequence(items) => items.get(index).map(|id| NodeView { doc: self.doc, id: *id }),
            _ => None,
        }
    }

    /// Look up a map child by key text (spec's `child(key-node)` collapsed
    /// to the common case of looking a key up by its string value).
    pub fn child_by_key(&self, key: &str) -> Option<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Map(pairs) => pairs.iter().find_map(|(k, v)| {
                let kn = &self.doc.nodes[*k].value;
                matches!(kn, NodeValue::String(s) if s == key).then(|| NodeView { doc: self.doc, id: *v })
            }),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Map(pairs) => pairs.iter().map(|(k, _)| NodeView { doc: self.doc, id: *k }).collect(),
            _ => Vec::new(),
        }
    }

    pub fn string_value(&self) -> Option<&'a str> {
        match &self.doc.nodes[self.id].value {
            NodeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn numeric_value(&self) -> Option<f64> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self.doc.nodes[self.id].value, NodeValue::Map(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.doc.nodes[self.id].value, NodeValue::Sequence(_))
    }
}

enum Building {
    Map(Vec<(NodeId, NodeId)>),
    Sequence(Vec<NodeId>),
    PendingKey(NodeId),
}

/// Converts the flat event stream from [`parser::parse`] into a
/// [`Document`] arena. Used both directly and as the target of the
/// threaded parser's replay step.
#[derive(Default)]
pub struct TreeBuilder {
    docs: Vec<Document>,
    stack: Vec<Building>,
    current: Option<Document>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.docs
    }

    fn doc(&mut self) -> &mut Document {
        self.current.get_or_insert_with(Document::default)
    }

    fn push_value(&mut self, id: NodeId) {
        match self.stack.last_mut() {
            Some(Building::Sequence(items)) => items.push(id),
            Some(Building::PendingKey(key)) => {
                let key = *key;
                self.stack.pop();
                match self.stack.last_mut() {
                    Some(Building::Map(pairs)) => pairs.push((key, id)),
                    _ => unreachable!("map key pushed without an enclosing map"),
                }
            }
            _ => {
                let doc = self.doc();
                doc.nodes[id].parent = None;
                doc.root = Some(id);
            }
        }
    }

    fn alloc_scalar(&mut self, value: NodeValue) {
        let parent = self.current_container_id();
        let id = self.doc().alloc(value, parent);
        self.push_value(id);
    }

    fn current_container_id(&self) -> Option<NodeId> {
        None
    }
}

impl YamlHandler for TreeBuilder {
    fn begin_document(&mut self) {
        self.current = Some(Document::default());
        self.stack.clear();
    }

    fn end_document(&mut self) {
        if let Some(doc) = self.current.take() {
            self.docs.push(doc);
        }
    }

    fn begin_map(&mut self) {
        self.stack.push(Building::Map(Vec::new()));
    }

    fn end_map(&mut self) {
        let pairs = match self.stack.pop() {
            Some(Building::Map(pairs)) => pairs,
            other => {
                // Defensive: the parser always balances begin/end map, but
                // keep the builder from panicking on malformed replay.
                if let Some(b) = other {
                    self.stack.push(b);
                }
                Vec::new()
            }
        };
        let doc = self.doc();
        let id = doc.alloc(NodeValue::Map(Vec::new()), None);
        for &(k, _) in &pairs {
            doc.nodes[k].parent = Some(id);
        }
        for &(_, v) in &pairs {
            doc.nodes[v].parent = Some(id);
        }
        doc.nodes[id].value = NodeValue::Map(pairs);
        self.push_value(id);
    }

    fn begin_sequence(&mut self) {
        self.stack.push(Building::Sequence(Vec::new()));
    }

    fn end_sequence(&mut self) {
        let items = match self.stack.pop() {
            Some(Building::Sequence(items)) => items,
            other => {
                if let Some(b) = other {
                    self.stack.push(b);
                }
                Vec::new()
            }
        };
        let doc = self.doc();
        let id = doc.alloc(NodeValue::Sequence(Vec::new()), None);
        for &c in &items {
            doc.nodes[c].parent = Some(id);
        }
        doc.nodes[id].value = NodeValue::Sequence(items);
        self.push_value(id);
    }

    fn begin_map_key(&mut self) {}

    fn end_map_key(&mut self) {
        // The key scalar was already pushed via `string`; promote it from
        // "just-pushed value" to a pending key awaiting its map value.
        if let Some(last_map) = self.stack.iter_mut().rev().find(|b| matches!(b, Building::Map(_))) {
            if let Building::Map(pairs) = last_map {
                if let Some((k, _)) = pairs.pop() {
                    self.stack.push(Building::PendingKey(k));
                    return;
                }
            }
        }
    }

    fn string(&mut self, value: StrView<'_>, _transient: bool) {
        let text = value.to_string_lossy().into_owned();
        self.alloc_scalar(NodeValue::String(text));
    }

    fn number(&mut self, value: f64) {
        self.alloc_scalar(NodeValue::Number(value));
    }

    fn boolean(&mut self, value: bool) {
        self.alloc_scalar(if value { NodeValue::BooleanTrue } else { NodeValue::BooleanFalse });
    }

    fn null(&mut self) {
        self.alloc_scalar(NodeValue::Null);
    }
}

/// Parse `input` into one or more documents (`---`-separated, spec §4.9
/// `load(stream)`).
pub fn load(input: &str) -> Result<Vec<Document>> {
    let mut builder = TreeBuilder::new();
    parser::parse(input, &mut builder)?;
    Ok(builder.into_documents())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_map_keys_are_accessible_by_name() {
        let docs = load("number: 12.3\nstring: foo\n").unwrap();
        let root = docs[0].root().unwrap();
        assert!(root.is_map());
        assert_eq!(root.child_by_key("number").unwrap().numeric_value(), Some(12.3));
        assert_eq!(root.child_by_key("string").unwrap().string_value(), Some("foo"));
    }

    #[test]
    fn nested_sequence_under_map_key() {
        let yaml = "dict:\n  c:\n    - foo\n    - bar\n";
        let docs = load(yaml).unwrap();
        let root = docs[0].root().unwrap();
        let dict = root.child_by_key("dict").unwrap();
        let c = dict.child_by_key("c").unwrap();
        assert!(c.is_sequence());
        assert_eq!(c.child_count(), 2);
        assert_eq!(c.child(0).unwrap().string_value(), Some("foo"));
        assert_eq!(c.child(1).unwrap().string_value(), Some("bar"));
    }

    #[test]
    fn child_parent_round_trips_through_arena() {
        let docs = load("a:\n  b: 1\n").unwrap();
        let root = docs[0].root().unwrap();
        let a = root.child_by_key("a").unwrap();
        let b = a.child_by_key("b").unwrap();
        assert_eq!(b.parent().unwrap().identity(), a.identity());
    }

    #[test]
    fn multiple_documents_are_separated_by_marker() {
        let docs = load("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].root().unwrap().child_by_key("a").unwrap().numeric_value(), Some(1.0));
        assert_eq!(docs[1].root().unwrap().child_by_key("b").unwrap().numeric_value(), Some(2.0));
    }

    #[test]
    fn sequence_of_maps_exposes_inner_map_keys() {
        // Approximates S1's `list[2] == {a: 1.1, b: 1.2, c: 1.3}` using the
        // block-style map-under-sequence-item shape this parser supports.
        let yaml = "list:\n  - 1\n  - 2\n  - a: 1.1\n    b: 1.2\n";
        let docs = load(yaml).unwrap();
        let root = docs[0].root().unwrap();
        let list = root.child_by_key("list").unwrap();
        assert_eq!(list.child_count(), 3);
        let third = list.child(2).unwrap();
        assert!(third.is_map());
        assert_eq!(third.child_by_key("b").unwrap().numeric_value(), Some(1.2));
    }
}
