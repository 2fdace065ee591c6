//! JSON document tree (C11, spec §4.9 "YAML / XML / JSON document
//! trees"). Same arena-with-parent-index shape as [`crate::yaml::tree`]
//! and [`crate::xml::tree`].

use crate::error::Result;
use crate::json::parser::{self, JsonHandler};
use crate::strings::StrView;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Object(Vec<(NodeId, NodeId)>),
    Array(Vec<NodeId>),
    String(String),
    Number(f64),
    BooleanTrue,
    BooleanFalse,
    Null,
}

#[derive(Debug, Clone)]
struct Node {
    value: NodeValue,
    parent: Option<NodeId>,
}

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
}

#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeView<'a> {
    pub fn identity(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeView<'a>> {
        self.doc.nodes[self.id].parent.map(|id| NodeView { doc: self.doc, id })
    }

    pub fn child_count(&self) -> usize {
        match &self.doc.nodes[self.id].value {
            NodeValue::Object(pairs) => pairs.len(),
            NodeValue::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub fn child(&self, index: usize) -> Option<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Object(pairs) => pairs.get(index).map(|(_, v)| NodeView { doc: self.doc, id: *v }),
            NodeValue::Array(items) => items.get(index).map(|id| NodeView { doc: self.doc, id: *id }),
            _ => None,
        }
    }

    pub fn child_by_key(&self, key: &str) -> Option<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Object(pairs) => pairs.iter().find_map(|(k, v)| {
                let kn = &self.doc.nodes[*k].value;
                matches!(kn, NodeValue::String(s) if s == key).then(|| NodeView { doc: self.doc, id: *v })
            }),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Object(pairs) => pairs.iter().map(|(k, _)| NodeView { doc: self.doc, id: *k }).collect(),
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

    pub fn is_object(&self) -> bool {
        matches!(self.doc.nodes[self.id].value, NodeValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.doc.nodes[self.id].value, NodeValue::Array(_))
    }
}

enum Building {
    Object(Vec<(NodeId, NodeId)>),
    Array(Vec<NodeId>),
    PendingKey(NodeId),
}

#[derive(Default)]
pub struct TreeBuilder {
    doc: Document,
    stack: Vec<Building>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    fn push_value(&mut self, id: NodeId) {
        match self.stack.last_mut() {
            Some(Building::Array(items)) => items.push(id),
            Some(Building::PendingKey(key)) => {
                let key = *key;
                self.stack.pop();
                match self.stack.last_mut() {
                    Some(Building::Object(pairs)) => pairs.push((key, id)),
                    _ => unreachable!("object key pushed without an enclosing object"),
                }
            }
            _ => {
                self.doc.nodes[id].parent = None;
                self.doc.root = Some(id);
            }
        }
    }

    fn alloc_scalar(&mut self, value: NodeValue) {
        let id = self.doc.alloc(value, None);
        self.push_value(id);
    }
}

impl JsonHandler for TreeBuilder {
    fn begin_object(&mut self) {
        self.stack.push(Building::Object(Vec::new()));
    }

    fn end_object(&mut self) {
        let pairs = match self.stack.pop() {
            Some(Building::Object(pairs)) => pairs,
            other => {
                if let Some(b) = other {
                    self.stack.push(b);
                }
                Vec::new()
            }
        };
        let id = self.doc.alloc(NodeValue::Object(Vec::new()), None);
        for &(k, v) in &pairs {
            self.doc.nodes[k].parent = Some(id);
            self.doc.nodes[v].parent = Some(id);
        }
        self.doc.nodes[id].value = NodeValue::Object(pairs);
        self.push_value(id);
    }

    fn object_key(&mut self, key: StrView<'_>, _transient: bool) {
        let text = key.to_string_lossy().into_owned();
        let id = self.doc.alloc(NodeValue::String(text), None);
        self.stack.push(Building::PendingKey(id));
    }

    fn begin_array(&mut self) {
        self.stack.push(Building::Array(Vec::new()));
    }

    fn end_array(&mut self) {
        let items = match self.stack.pop() {
            Some(Building::Array(items)) => items,
            other => {
                if let Some(b) = other {
                    self.stack.push(b);
                }
                Vec::new()
            }
        };
        let id = self.doc.alloc(NodeValue::Array(Vec::new()), None);
        for &c in &items {
            self.doc.nodes[c].parent = Some(id);
        }
        self.doc.nodes[id].value = NodeValue::Array(items);
        self.push_value(id);
    }

    fn boolean(&mut self, value: bool) {
        self.alloc_scalar(if value { NodeValue::BooleanTrue } else { NodeValue::BooleanFalse });
    }

    fn null(&mut self) {
        self.alloc_scalar(NodeValue::Null);
    }

    fn string(&mut self, value: StrView<'_>, _transient: bool) {
        self.alloc_scalar(NodeValue::String(value.to_string_lossy().into_owned()));
    }

    fn number(&mut self, value: f64) {
        self.alloc_scalar(NodeValue::Number(value));
    }
}

/// Note: `object_key`'s node is allocated with `push_value` deferred
/// until its paired value arrives; unlike the map key handling in
/// `TreeBuilder::object_key` above, this path never promotes the key
/// through `push_value` directly — `PendingKey` is resolved the moment
/// the following value is pushed.
pub fn load(input: &[u8]) -> Result<Document> {
    let mut builder = TreeBuilder::new();
    parser::parse(input, &mut builder)?;
    Ok(builder.into_document())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_object_keys_are_accessible_by_name() {
        let doc = load(br#"{"number": 12.3, "string": "foo"}"#).unwrap();
        let root = doc.root().unwrap();
        assert!(root.is_object());
        assert_eq!(root.child_by_key("number").unwrap().numeric_value(), Some(12.3));
        assert_eq!(root.child_by_key("string").unwrap().string_value(), Some("foo"));
    }

    #[test]
    fn nested_array_under_object_key() {
        let doc = load(br#"{"list": [1, 2, {"a": 1.1}]}"#).unwrap();
        let root = doc.root().unwrap();
        let list = root.child_by_key("list").unwrap();
        assert!(list.is_array());
        assert_eq!(list.child_count(), 3);
        assert_eq!(list.child(2).unwrap().child_by_key("a").unwrap().numeric_value(), Some(1.1));
    }

    #[test]
    fn child_parent_round_trips_through_arena() {
        let doc = load(br#"{"a": {"b": 1}}"#).unwrap();
        let root = doc.root().unwrap();
        let a = root.child_by_key("a").unwrap();
        let b = a.child_by_key("b").unwrap();
        assert_eq!(b.parent().unwrap().identity(), a.identity());
    }
}
