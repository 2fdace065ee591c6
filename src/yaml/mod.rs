//! YAML parser (C7) and document tree (C11).

pub mod parser;
pub mod tree;

pub use parser::{parse, YamlHandler};
pub use tree::{load, Document, NodeId, NodeValue, NodeView, TreeBuilder};
