//! Sheet sub-interface (spec §4.9 `sheet`) plus its satellite interfaces:
//! sheet properties/view (frozen/split panes, selection), conditional
//! format, table. Named expressions live in
//! [`crate::import::named_expression`]; auto-filter in
//! [`crate::import::auto_filter`]; formulas in [`crate::import::formula`].

use crate::import::auto_filter::AutoFilter;
use crate::import::formula::{ArrayFormula, Formula};
use crate::import::named_expression::NamedExpression;
use crate::types::CellRange;

pub trait Sheet {
    fn set_value(&mut self, row: i32, column: i32, value: f64) {
        let (_, _, _) = (row, column, value);
    }
    fn set_bool(&mut self, row: i32, column: i32, value: bool) {
        let (_, _, _) = (row, column, value);
    }
    /// `string_id` is an id previously returned by
    /// [`crate::import::shared_strings::SharedStrings::add`]/`append`.
    fn set_string(&mut self, row: i32, column: i32, string_id: u32) {
        let (_, _, _) = (row, column, string_id);
    }
    fn set_date_time(&mut self, row: i32, column: i32, y: i32, m: u8, d: u8, hh: u8, mm: u8, ss: u8) {
        let (_, _, _, _, _, _, _, _) = (row, column, y, m, d, hh, mm, ss);
    }
    /// A value whose type the handler couldn't classify ahead of time;
    /// the consumer sniffs `text` itself (spec §4.9 `set_auto`).
    fn set_auto(&mut self, row: i32, column: i32, text: &str) {
        let (_, _, _) = (row, column, text);
    }
    fn set_format(&mut self, row: i32, column: i32, xf_id: u32) {
        let (_, _, _) = (row, column, xf_id);
    }
    fn set_format_range(&mut self, range: CellRange, xf_id: u32) {
        let (_, _) = (range, xf_id);
    }
    fn set_column_format(&mut self, column: i32, span: i32, xf_id: u32) {
        let (_, _, _) = (column, span, xf_id);
    }
    fn set_row_format(&mut self, row: i32, xf_id: u32) {
        let (_, _) = (row, xf_id);
    }
    /// Replicate the value/format of `(row, column)` down `n` additional
    /// rows (spec §4.9 `fill_down_cells`).
    fn fill_down_cells(&mut self, row: i32, column: i32, n: i32) {
        let (_, _, _) = (row, column, n);
    }
    fn get_sheet_size(&self) -> (i32, i32) {
        (0, 0)
    }

    fn sheet_properties(&mut self) -> Option<&mut dyn SheetProperties> {
        None
    }
    fn sheet_view(&mut self) -> Option<&mut dyn SheetView> {
        None
    }
    fn named_expression(&mut self) -> Option<Box<dyn NamedExpression>> {
        None
    }
    fn start_formula(&mut self) -> Option<Box<dyn Formula>> {
        None
    }
    fn start_array_formula(&mut self) -> Option<Box<dyn ArrayFormula>> {
        None
    }
    fn start_conditional_format(&mut self) -> Option<Box<dyn ConditionalFormat>> {
        None
    }
    fn start_auto_filter(&mut self, range: CellRange) -> Option<Box<dyn AutoFilter>> {
        let _ = range;
        None
    }
    fn start_table(&mut self) -> Option<Box<dyn Table>> {
        None
    }
}

pub trait SheetProperties {
    fn set_column_width(&mut self, column: i32, span: i32, width: f64) {
        let (_, _, _) = (column, span, width);
    }
    fn set_column_hidden(&mut self, column: i32, span: i32, hidden: bool) {
        let (_, _, _) = (column, span, hidden);
    }
    fn set_row_height(&mut self, row: i32, height: f64) {
        let (_, _) = (row, height);
    }
    fn set_row_hidden(&mut self, row: i32, hidden: bool) {
        let (_, _) = (row, hidden);
    }
    fn set_merge_cell_range(&mut self, range: CellRange) {
        let _ = range;
    }
}

/// Frozen/split panes and selection (spec §3 "frozen/split panes and
/// selection").
pub trait SheetView {
    fn set_split_pane(&mut self, x_position: f64, y_position: f64, top_left_row: i32, top_left_column: i32) {
        let (_, _, _, _) = (x_position, y_position, top_left_row, top_left_column);
    }
    fn set_frozen_pane(&mut self, visible_columns: i32, visible_rows: i32, top_left_row: i32, top_left_column: i32) {
        let (_, _, _, _) = (visible_columns, visible_rows, top_left_row, top_left_column);
    }
    fn set_selected_range(&mut self, range: CellRange) {
        let _ = range;
    }
    fn set_active_cell(&mut self, row: i32, column: i32) {
        let (_, _) = (row, column);
    }
    /// Marks the owning sheet as the active tab in the workbook (spec
    /// §4.10's xls-xml `<WorksheetOptions><Selected/>` marker).
    fn set_sheet_active(&mut self) {}
}

pub trait ConditionalFormat {
    fn set_range(&mut self, range: CellRange) {
        let _ = range;
    }
    fn set_type(&mut self, type_name: &str) {
        let _ = type_name;
    }
    fn set_formula(&mut self, formula: &str) {
        let _ = formula;
    }
    fn set_xf(&mut self, xf_id: u32) {
        let _ = xf_id;
    }
    fn commit(self: Box<Self>);
}

pub trait Table {
    fn set_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_range(&mut self, range: CellRange) {
        let _ = range;
    }
    fn set_column(&mut self, index: u32, name: &str) {
        let (_, _) = (index, name);
    }
    fn commit(self: Box<Self>);
}

/// Resolves cell-reference text against a per-format grammar (spec §4.9
/// `get_reference_resolver(context)`). `context` distinguishes e.g. a
/// formula-body resolver from a defined-name resolver when a format
/// needs different relative/absolute semantics for each.
pub trait ReferenceResolver {
    fn resolve_range(&self, text: &str) -> Option<CellRange> {
        let _ = text;
        None
    }
    fn resolve_address(&self, text: &str) -> Option<(i32, i32)> {
        let _ = text;
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceContext {
    Formula,
    DefinedName,
    AutoFilter,
}
