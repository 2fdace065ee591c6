//! XML document tree (C11, spec §4.9/§9): builds an in-memory tree from
//! the SAX parser's callbacks. Same arena-with-parent-indices shape as
//! [`crate::yaml::tree`] and [`crate::json::tree`] (spec §9 "Cyclic
//! back-references").

use crate::error::Result;
use crate::strings::StrView;
use crate::xml::namespace::{NamespaceId, NamespaceRepository};
use crate::xml::sax::{self, SaxHandler, XmlAttribute, XmlDeclaration};
use crate::xml::tokens::{TokenId, TokenMap};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub ns: NamespaceId,
    pub token: TokenId,
    pub attrs: Vec<(NamespaceId, TokenId, String)>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeValue {
    Element(ElementNode),
    Text(String),
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

    pub fn node(&self, id: NodeId) -> NodeView<'_> {
        NodeView { doc: self, id }
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

    pub fn as_element(&self) -> Option<&'a ElementNode> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Element(e) => Some(e),
            NodeValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Text(s) => Some(s.as_str()),
            NodeValue::Element(_) => None,
        }
    }

    pub fn children(&self) -> Vec<NodeView<'a>> {
        match &self.doc.nodes[self.id].value {
            NodeValue::Element(e) => e.children.iter().map(|&id| NodeView { doc: self.doc, id }).collect(),
            NodeValue::Text(_) => Vec::new(),
        }
    }

    pub fn attribute(&self, token: TokenId) -> Option<&'a str> {
        self.as_element()?.attrs.iter().find(|(_, t, _)| *t == token).map(|(_, _, v)| v.as_str())
    }

    /// Concatenation of every direct text-child's content, mirroring how
    /// a format handler typically reads an element's simple scalar body.
    pub fn text_content(&self) -> String {
        self.children().iter().filter_map(|c| c.as_text()).collect::<Vec<_>>().join("")
    }
}

/// Converts SAX callbacks into a [`Document`] arena.
#[derive(Default)]
pub struct TreeBuilder {
    doc: Document,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    pub fn into_document(self) -> Document {
        self.doc
    }
}

impl SaxHandler for TreeBuilder {
    fn declaration(&mut self, _decl: &XmlDeclaration) {}

    fn start_element(&mut self, ns: NamespaceId, token: TokenId, attrs: &[XmlAttribute<'_>]) {
        let owned_attrs = attrs
            .iter()
            .map(|a| (a.ns, a.token, a.value.to_string_lossy().into_owned()))
            .collect();
        let parent = self.stack.last().copied();
        let id = self.doc.alloc(
            NodeValue::Element(ElementNode { ns, token, attrs: owned_attrs, children: Vec::new() }),
            parent,
        );
        if let Some(&parent_id) = self.stack.last() {
            if let NodeValue::Element(parent_el) = &mut self.doc.nodes[parent_id].value {
                parent_el.children.push(id);
            }
        } else {
            self.doc.root = Some(id);
        }
        self.stack.push(id);
    }

    fn end_element(&mut self, _ns: NamespaceId, _token: TokenId) {
        self.stack.pop();
    }

    fn characters(&mut self, value: StrView<'_>, _transient: bool) {
        let text = value.to_string_lossy().into_owned();
        let parent = self.stack.last().copied();
        let id = self.doc.alloc(NodeValue::Text(text), parent);
        if let Some(&parent_id) = self.stack.last() {
            if let NodeValue::Element(parent_el) = &mut self.doc.nodes[parent_id].value {
                parent_el.children.push(id);
            }
        }
    }
}

/// Parse `input` directly into a [`Document`] (spec §4.9 `load(stream)`
/// generalized from YAML to XML: a single call, single document).
pub fn load(input: &[u8], repo: &mut NamespaceRepository, tokens: &TokenMap) -> Result<Document> {
    let mut builder = TreeBuilder::new();
    sax::parse(input, repo, tokens, &mut builder)?;
    Ok(builder.into_document())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::namespace::NamespaceRepository;

    #[test]
    fn builds_tree_with_text_and_attributes() {
        let xml = br#"<root a="1"><child>hello</child></root>"#;
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "child", "a"]);
        let doc = load(xml, &mut repo, &tokens).unwrap();
        let root = doc.root().unwrap();
        let root_el = root.as_element().unwrap();
        assert_eq!(tokens.name_of(root_el.token), Some("root"));
        assert_eq!(root.attribute(tokens.get("a")), Some("1"));
        let child = root.children()[0];
        assert_eq!(child.text_content(), "hello");
    }

    #[test]
    fn parent_pointers_round_trip() {
        let xml = b"<root><a><b/></a></root>";
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "a", "b"]);
        let doc = load(xml, &mut repo, &tokens).unwrap();
        let root = doc.root().unwrap();
        let a = root.children()[0];
        let b = a.children()[0];
        assert_eq!(b.parent().unwrap().identity(), a.identity());
    }
}
