//! SAX-style XML parsing: namespace repository (C4), single-threaded
//! parser (C5), and the threaded producer/consumer variant.

pub mod namespace;
pub mod sax;
pub mod threaded;
pub mod tokens;
pub mod tree;

pub use namespace::{NamespaceId, NamespaceRepository, XmlnsContext, XMLNS_UNKNOWN_ID};
pub use sax::{SaxHandler, XmlAttribute, XmlDeclaration};
pub use tokens::{TokenId, TokenMap, XML_UNKNOWN_TOKEN};
