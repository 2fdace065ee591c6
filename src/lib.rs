//! # docimport
//!
//! Format-independent parsing and content-dispatch engine for structured
//! document file formats: xls-xml, OOXML xlsx, ODS, Gnumeric, plus the
//! generic XML/JSON/YAML tokenizers that back them.
//!
//! ## Layout
//!
//! - [`strings`], [`scan`]: zero-copy string views, an interning pool, and
//!   the vectorized byte-scan primitives everything else is built on.
//! - [`xml`], [`json`], [`yaml`]: SAX-style event parsers (single-threaded
//!   and producer/consumer threaded variants for XML/JSON) plus document
//!   trees for all three.
//! - [`zip`]: central-directory zip reader used by the OOXML and ODF
//!   formats (both are zip packages internally).
//! - [`context`]: the context-stack framework per-format handlers are
//!   built on top of the SAX layer with.
//! - [`import`]: the format-neutral import interface (`ImportFactory`,
//!   `Sheet`, `Styles`, ...) every format handler drives.
//! - [`formats`]: the format handlers themselves (xls-xml, xlsx, ods,
//!   gnumeric).
//! - [`config`]: runtime-tunable parser knobs (`ParserConfig`, the
//!   `ORCUS_ODS_USE_THREADS` environment switch).
//! - [`error`]: the crate's error type and `Result` alias.
//! - [`types`]: shared cell/range/formula-grammar value types.

pub mod config;
pub mod context;
pub mod error;
pub mod formats;
pub mod import;
pub mod json;
pub mod scan;
pub mod strings;
pub mod types;
pub mod xml;
pub mod yaml;
pub mod zip;

pub use config::ParserConfig;
pub use error::{ImportError, Result};
pub use types::{CellAddress, CellRange, FormulaGrammar, ResultValue};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_imports() {
        let _ = std::marker::PhantomData::<ImportError>;
        let _ = std::marker::PhantomData::<CellAddress>;
        let _ = std::marker::PhantomData::<CellRange>;
        let _ = std::marker::PhantomData::<ParserConfig>;
    }
}
