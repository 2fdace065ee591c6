//! The import interface (C9, spec §4.9): the language-neutral, abstract
//! contract every per-format handler (C10) drives. This module has no
//! parsing logic of its own — it is pure behavioral contract, matching
//! spec §3's "Import-interface entities ... have no persistent state that
//! the core observes other than the handles the factory returns."
//!
//! Every `start_*` returns an owned builder (`Box<dyn Trait>`); every
//! builder's `commit` consumes `self: Box<Self>` so a handle can't be
//! used again after commit (spec §4.9 "post-commit, the handle pointer
//! must not be dereferenced"). A `get_*`/`start_*` returning `None` is
//! not an error — spec §4.12 requires the handler to silently skip the
//! corresponding behavior.

pub mod auto_filter;
pub mod factory;
pub mod formula;
pub mod named_expression;
pub mod pivot;
pub mod shared_strings;
pub mod sheet;
pub mod styles;
pub mod types;

pub use auto_filter::{AutoFilter, FilterNode, FilterTree};
pub use factory::{GlobalSettings, ImportFactory};
pub use formula::{ArrayFormula, Formula};
pub use named_expression::NamedExpression;
pub use pivot::{
    PivotCacheDefinition, PivotCacheField, PivotFieldGroup, PivotAxisFieldsBuilder, PivotDataFieldsBuilder,
    PivotFieldsBuilder, PivotItemsBuilder, PivotTableDefinition,
};
pub use sheet::{ConditionalFormat, ReferenceContext, ReferenceResolver, Sheet, SheetProperties, SheetView, Table};
pub use shared_strings::{SharedStringSegments, SharedStrings};
pub use styles::{
    BorderStyleBuilder, CellProtectionBuilder, CellStyleBuilder, FillStyleBuilder, FontStyleBuilder,
    NumberFormatBuilder, Styles, XfBuilder,
};
