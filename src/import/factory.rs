//! Import factory — the root of the import interface (spec §4.9
//! `import_factory`). A per-format handler is constructed with
//! `&mut dyn ImportFactory` (or an `Rc<RefCell<..>>` wrapper of one, for
//! handlers that need to hold a reference across nested child contexts)
//! and drives it exclusively through this trait; it never assembles or
//! retains the spreadsheet model itself (spec §1).

use crate::import::named_expression::NamedExpression;
use crate::import::pivot::{PivotCacheDefinition, PivotTableDefinition};
use crate::import::sheet::{ReferenceContext, ReferenceResolver, Sheet};
use crate::import::shared_strings::SharedStrings;
use crate::import::styles::Styles;

pub trait ImportFactory {
    fn global_settings(&mut self) -> Option<&mut dyn GlobalSettings> {
        None
    }
    fn shared_strings(&mut self) -> Option<&mut dyn SharedStrings> {
        None
    }
    fn styles(&mut self) -> Option<&mut dyn Styles> {
        None
    }
    fn reference_resolver(&mut self, context: ReferenceContext) -> Option<Box<dyn ReferenceResolver>> {
        let _ = context;
        None
    }
    fn append_sheet(&mut self, sheet_index: i32, name: &str) -> Option<&mut dyn Sheet> {
        let (_, _) = (sheet_index, name);
        None
    }
    fn sheet_by_name(&mut self, name: &str) -> Option<&mut dyn Sheet> {
        let _ = name;
        None
    }
    fn sheet_by_index(&mut self, index: i32) -> Option<&mut dyn Sheet> {
        let _ = index;
        None
    }
    fn named_expression(&mut self) -> Option<Box<dyn NamedExpression>> {
        None
    }
    /// One per `pivotCacheDefinition*.xml` part (spec §4.9
    /// `pivot_cache_definition`).
    fn start_pivot_cache_definition(&mut self) -> Option<Box<dyn PivotCacheDefinition>> {
        None
    }
    /// One per `pivotTable*.xml` part (spec §4.9 `pivot_table_definition`).
    fn start_pivot_table_definition(&mut self) -> Option<Box<dyn PivotTableDefinition>> {
        None
    }
    /// Called exactly once, after the format handler has finished driving
    /// every other call (spec §4.9 `finalize()`).
    fn finalize(&mut self) {}
}

/// Document-global settings: origin date base, default currency, and
/// similar workbook-wide flags that don't belong to any one sheet or
/// style record.
pub trait GlobalSettings {
    fn set_origin_date(&mut self, y: i32, m: u8, d: u8) {
        let (_, _, _) = (y, m, d);
    }
    fn set_default_currency_symbol(&mut self, symbol: &str) {
        let _ = symbol;
    }
    fn set_case_sensitive_formula_names(&mut self, value: bool) {
        let _ = value;
    }
}
