//! Per-format handlers (C10, spec §4.10): each submodule drives the
//! [`crate::import`] interface from one concrete file format, built on
//! the context-stack framework in [`crate::context`] and the low-level
//! parsers in [`crate::xml`]/[`crate::json`]/[`crate::yaml`]/[`crate::zip`].

pub mod cell_ref;
pub mod gnumeric;
pub mod odf_styles;
pub mod ods;
pub mod xls_xml;
pub mod xlsx;
