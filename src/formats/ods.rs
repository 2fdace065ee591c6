//! ODS package handler (spec §4.10 "ods"), grounded on
//! `ods_content_xml_context.{hpp,cpp}` and `ods_database_ranges_context.{hpp,cpp}`,
//! reusing [`super::odf_styles`] for every `<office:automatic-styles>`/
//! `<office:styles>` block (both the optional standalone `styles.xml` part
//! and the one embedded directly in `content.xml`).
//!
//! Package navigation (spec §6): an optional `styles.xml` is read first so
//! its cell styles/number formats are available before `content.xml`'s own
//! inline `<office:automatic-styles>` contributes more of the same maps;
//! `content.xml` is then parsed single-threaded or through
//! [`crate::xml::threaded`]'s producer/consumer variant, switched on
//! [`crate::config::ods_use_threads`] exactly as the `ORCUS_ODS_USE_THREADS`
//! environment variable names it.
//!
//! `<table:database-ranges>` gets a dedicated child context,
//! [`DatabaseRangesContext`], the same way `xls_xml.rs`'s `<x:AutoFilter>`
//! does: its `table:database-range` → `table:filter` →
//! `table:filter-and`/`table:filter-or` (recursive) → `table:filter-condition`
//! nesting needs a real stack. Unlike xls-xml's filter, which always
//! concerns the sheet currently open, a database range names its own
//! sheet in `table:target-range-address`, so `ContentContext` hands the
//! child context a `sheet_name -> index` map built up as `<table:table>`
//! elements are seen, rather than the index it's currently parsing.
//!
//! Two deliberate simplifications relative to the full ODF model:
//! - `table:number-rows-repeated` advances the row cursor by the repeat
//!   count after a row's cells are processed once, rather than
//!   replicating its content across every repeated row. Real documents
//!   only use a large repeat count on trailing *empty* rows, where this
//!   is exactly correct; a repeated row that also carries real cell data
//!   is vanishingly rare and only loses the repeats beyond the first here.
//! - `table:filter-condition`'s `table:operator` is mapped through the
//!   full seventeen-entry table `ods_database_ranges_context.cpp` defines
//!   (equal/not-equal/contains/begins/ends/empty variants, top/bottom
//!   values and percent, as well as the four numeric comparisons), rather
//!   than the four numeric comparisons the original C++ actually wires up
//!   (the rest there are `warn("TODO: handle this")`). This crate's
//!   `FilterOperator` already models every one of those cases, so nothing
//!   is gained by reproducing that gap.

use crate::config::{self, ParserConfig};
use crate::context::{Context, ElementName};
use crate::error::{ImportError, Result};
use crate::formats::cell_ref;
use crate::formats::odf_styles::{self, SharedCatalog, StyleCatalog};
use crate::import::{
    ArrayFormula, AutoFilter, FilterNode, Formula, ImportFactory, NamedExpression, Sheet, SheetProperties, Table,
};
use crate::import::types::{FilterConnector, FilterOperator, FilterValue};
use crate::strings::{InternPool, StrView};
use crate::types::{CellAddress, CellRange, FormulaGrammar, ResultValue};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::threaded::{drain_into, join_producer, parse_threaded};
use crate::xml::tokens::{TokenId, TokenMap};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

const ELEMENTS: &[&str] = &[
    "document-content",
    "body",
    "spreadsheet",
    "table",
    "table-column",
    "table-row",
    "table-cell",
    "covered-table-cell",
    "p",
    "named-range",
    "named-expression",
    "database-ranges",
    "database-range",
    "filter",
    "filter-and",
    "filter-or",
    "filter-condition",
    "target-range-address",
    "field-number",
    "operator",
    "data-type",
    "automatic-styles",
    "styles",
    "name",
    "style-name",
    "number-columns-repeated",
    "number-rows-repeated",
    "number-columns-spanned",
    "number-rows-spanned",
    "number-matrix-columns-spanned",
    "number-matrix-rows-spanned",
    "value-type",
    "value",
    "date-value",
    "time-value",
    "boolean-value",
    "string-value",
    "formula",
    "base-cell-address",
    "cell-range-address",
];

pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

/// MIME type prefix the package's `mimetype` entry must start with (spec
/// §6 "Format detection for `.ods` is by MIME-type membership").
const ODS_MIMETYPE_PREFIX: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// Parse a complete ODS package, driving `factory`.
pub fn import(bytes: &[u8], factory: &mut dyn ImportFactory) -> Result<()> {
    let mut archive = crate::zip::ZipArchive::open(Cursor::new(bytes))?;
    check_mimetype(&mut archive)?;

    let catalog: SharedCatalog = Rc::new(RefCell::new(StyleCatalog::default()));
    if archive.contains("styles.xml") {
        let xml = archive.read_file_entry("styles.xml")?;
        let doc_catalog = odf_styles::parse_styles_document(&xml, factory)?;
        let mut cat = catalog.borrow_mut();
        cat.cell_xf_by_name.extend(doc_catalog.cell_xf_by_name);
        cat.number_format_by_name.extend(doc_catalog.number_format_by_name);
        cat.column_width_by_name.extend(doc_catalog.column_width_by_name);
        cat.row_height_by_name.extend(doc_catalog.row_height_by_name);
    }

    let content_xml = archive.read_file_entry("content.xml")?;
    if config::ods_use_threads() {
        import_content_threaded(&content_xml, factory, catalog)?;
    } else {
        import_content_single(&content_xml, factory, catalog)?;
    }

    factory.finalize();
    Ok(())
}

/// Reject any zip package whose `mimetype` entry isn't an ODF spreadsheet
/// (spec §6) — a misrouted `.xlsx` or other OOXML-shaped archive would
/// otherwise be silently parsed as ODS.
fn check_mimetype<R: std::io::Read + std::io::Seek>(archive: &mut crate::zip::ZipArchive<R>) -> Result<()> {
    if !archive.contains("mimetype") {
        return Err(ImportError::zip("not an ODF package: missing 'mimetype' entry"));
    }
    let bytes = archive.read_file_entry("mimetype")?;
    if !bytes.starts_with(ODS_MIMETYPE_PREFIX.as_bytes()) {
        return Err(ImportError::zip(format!(
            "not an ODF spreadsheet: 'mimetype' entry does not start with '{ODS_MIMETYPE_PREFIX}'"
        )));
    }
    Ok(())
}

fn import_content_single(xml: &[u8], factory: &mut dyn ImportFactory, catalog: SharedCatalog) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    let tokens = Rc::new(build_tokens());
    let root = ContentContext::new(factory, tokens.clone(), catalog);
    let mut stack = crate::context::ContextStack::new(Box::new(root));
    sax::parse(xml, &mut repo, &tokens, &mut stack)?;
    stack.into_root();
    Ok(())
}

fn import_content_threaded(xml: &[u8], factory: &mut dyn ImportFactory, catalog: SharedCatalog) -> Result<()> {
    let repo = NamespaceRepository::new();
    let tokens = build_tokens();
    let config = ParserConfig::default();
    let (rx, handle) = parse_threaded(xml.to_vec(), repo, tokens.clone(), config);

    let root = ContentContext::new(factory, Rc::new(tokens), catalog);
    let mut stack = crate::context::ContextStack::new(Box::new(root));
    let mut pool = InternPool::new();
    drain_into(rx, &mut pool, &mut stack);
    join_producer(handle)?;
    stack.into_root();
    Ok(())
}

fn tok(tokens: &TokenMap, name: &str) -> TokenId {
    tokens.get(name)
}

fn attr_str<'a>(attrs: &'a [XmlAttribute<'a>], tokens: &TokenMap, name: &str) -> Option<&'a str> {
    let id = tok(tokens, name);
    attrs.iter().find(|a| a.token == id).and_then(|a| a.value.as_str())
}

fn attr_f64(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<f64> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<f64>().ok())
}

fn attr_i32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<i32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<i32>().ok())
}

/// `office:value-type` (the `cell_value` sorted-map in
/// `ods_content_xml_context.cpp`, enriched with the boolean/time/
/// percentage/currency kinds the real ODF schema also allows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Unknown,
    Float,
    Percentage,
    Currency,
    String,
    Boolean,
    Date,
    Time,
}

fn parse_value_type(text: &str) -> ValueType {
    match text {
        "float" => ValueType::Float,
        "percentage" => ValueType::Percentage,
        "currency" => ValueType::Currency,
        "string" => ValueType::String,
        "boolean" => ValueType::Boolean,
        "date" => ValueType::Date,
        "time" => ValueType::Time,
        _ => ValueType::Unknown,
    }
}

/// `table:formula="of:=SUM([.A1:.B2])"` strips its `of:` grammar prefix;
/// bare `=SUM(...)` (some writers omit the namespace prefix) strips the
/// leading `=` alone.
fn strip_formula_prefix(text: &str) -> &str {
    text.strip_prefix("of:=").or_else(|| text.strip_prefix('=')).unwrap_or(text)
}

/// `office:date-value` is `"2023-01-15"` or `"2023-01-15T09:30:00"`.
fn parse_odf_date(text: &str) -> Option<(i32, u8, u8, u8, u8, u8)> {
    let (date, time) = text.split_once('T').unwrap_or((text, ""));
    let mut parts = date.split('-');
    let y: i32 = parts.next()?.parse().ok()?;
    let m: u8 = parts.next()?.parse().ok()?;
    let d: u8 = parts.next()?.parse().ok()?;
    if time.is_empty() {
        return Some((y, m, d, 0, 0, 0));
    }
    let time = time.split('.').next().unwrap_or(time);
    let mut time_parts = time.split(':');
    let hh: u8 = time_parts.next()?.parse().ok()?;
    let mm: u8 = time_parts.next()?.parse().ok()?;
    let ss: u8 = time_parts.next().unwrap_or("0").parse().ok()?;
    Some((y, m, d, hh, mm, ss))
}

/// `office:time-value` is an ISO-8601 duration (`"PT10H30M0S"`); returned
/// as a fraction of a day, the way every other spreadsheet grammar stores
/// a time-of-day value.
fn parse_odf_duration_day_fraction(text: &str) -> Option<f64> {
    let rest = text.strip_prefix('P')?;
    let time_part = rest.split_once('T').map(|(_, t)| t)?;
    let mut seconds = 0.0_f64;
    let mut num = String::new();
    for c in time_part.chars() {
        match c {
            '0'..='9' | '.' => num.push(c),
            'H' => {
                seconds += num.parse::<f64>().unwrap_or(0.0) * 3600.0;
                num.clear();
            }
            'M' => {
                seconds += num.parse::<f64>().unwrap_or(0.0) * 60.0;
                num.clear();
            }
            'S' => {
                seconds += num.parse::<f64>().unwrap_or(0.0);
                num.clear();
            }
            _ => {}
        }
    }
    Some(seconds / 86_400.0)
}

/// A large but finite ceiling on how many adjacent columns one repeated,
/// non-empty cell is expanded into; guards against a pathological
/// `table:number-columns-repeated` value rather than any realistic sheet.
const MAX_CELL_REPEAT_FANOUT: i32 = 10_000;

#[derive(Default)]
struct CellAttrs {
    value_type: Option<ValueType>,
    value: Option<f64>,
    date_value: Option<String>,
    time_value: Option<String>,
    boolean_value: Option<bool>,
    string_value: Option<String>,
    formula: Option<String>,
    columns_repeated: i32,
    columns_spanned: i32,
    rows_spanned: i32,
    matrix_columns_spanned: i32,
    matrix_rows_spanned: i32,
    style_name: Option<String>,
}

struct ArrayState {
    range: CellRange,
    builder: Box<dyn ArrayFormula>,
    filled: i32,
    total: i32,
}

/// Root context for `content.xml`'s `<office:document-content>`.
struct ContentContext {
    factory: *mut dyn ImportFactory,
    tokens: Rc<TokenMap>,
    catalog: SharedCatalog,
    sheet_names: Rc<RefCell<HashMap<String, i32>>>,

    cur_sheet_index: i32,
    col_cursor: i32,

    row: i32,
    row_repeated: i32,
    row_style: Option<String>,

    col: i32,

    in_cell: bool,
    cell: CellAttrs,
    cell_text: String,
    covered: bool,

    array_state: Option<ArrayState>,
}

impl ContentContext {
    fn new(factory: &mut dyn ImportFactory, tokens: Rc<TokenMap>, catalog: SharedCatalog) -> Self {
        ContentContext {
            factory: factory as *mut dyn ImportFactory,
            tokens,
            catalog,
            sheet_names: Rc::new(RefCell::new(HashMap::new())),
            cur_sheet_index: -1,
            col_cursor: 0,
            row: 0,
            row_repeated: 1,
            row_style: None,
            col: 0,
            in_cell: false,
            cell: CellAttrs::default(),
            cell_text: String::new(),
            covered: false,
            array_state: None,
        }
    }

    /// Safe for the lifetime of one [`import`] call; see the module doc
    /// comment on the raw-pointer convention this mirrors from `xls_xml.rs`.
    fn factory(&mut self) -> &mut dyn ImportFactory {
        unsafe { &mut *self.factory }
    }

    fn factory_static(&self) -> &'static mut dyn ImportFactory {
        unsafe { &mut *self.factory }
    }

    fn start_table(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.cur_sheet_index += 1;
        let index = self.cur_sheet_index;
        let name = attr_str(attrs, &self.tokens, "name").unwrap_or("").to_string();
        self.sheet_names.borrow_mut().insert(name.clone(), index);
        self.factory().append_sheet(index, &name);
        self.col_cursor = 0;
        self.row = 0;
    }

    fn start_table_column(&mut self, attrs: &[XmlAttribute<'_>]) {
        let repeated = attr_i32(attrs, &self.tokens, "number-columns-repeated").unwrap_or(1).max(1);
        let col = self.col_cursor;
        if let Some(style_name) = attr_str(attrs, &self.tokens, "style-name") {
            if let Some(width) = self.catalog.borrow().column_width_by_name.get(style_name).copied() {
                let sheet_index = self.cur_sheet_index;
                if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
                    props.set_column_width(col, repeated, width);
                }
            }
        }
        self.col_cursor += repeated;
    }

    fn start_table_row(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.col = 0;
        self.row_repeated = attr_i32(attrs, &self.tokens, "number-rows-repeated").unwrap_or(1).max(1);
        self.row_style = attr_str(attrs, &self.tokens, "style-name").map(str::to_string);
        if let Some(style_name) = &self.row_style {
            if let Some((height, is_set)) = self.catalog.borrow().row_height_by_name.get(style_name).copied() {
                if is_set {
                    let row = self.row;
                    let sheet_index = self.cur_sheet_index;
                    if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
                        props.set_row_height(row, height);
                    }
                }
            }
        }
    }

    fn end_table_row(&mut self) {
        self.row += self.row_repeated;
        self.row_repeated = 1;
        self.row_style = None;
    }

    fn start_cell(&mut self, attrs: &[XmlAttribute<'_>], covered: bool) {
        self.in_cell = true;
        self.covered = covered;
        self.cell_text.clear();
        let mut cell = CellAttrs { columns_repeated: 1, columns_spanned: 1, rows_spanned: 1, ..CellAttrs::default() };
        cell.value_type = attr_str(attrs, &self.tokens, "value-type").map(parse_value_type);
        cell.value = attr_f64(attrs, &self.tokens, "value");
        cell.date_value = attr_str(attrs, &self.tokens, "date-value").map(str::to_string);
        cell.time_value = attr_str(attrs, &self.tokens, "time-value").map(str::to_string);
        cell.boolean_value = attr_str(attrs, &self.tokens, "boolean-value").map(|v| v == "true");
        cell.string_value = attr_str(attrs, &self.tokens, "string-value").map(str::to_string);
        cell.formula = attr_str(attrs, &self.tokens, "formula").map(|f| strip_formula_prefix(f).to_string());
        cell.columns_repeated = attr_i32(attrs, &self.tokens, "number-columns-repeated").unwrap_or(1).max(1);
        cell.columns_spanned = attr_i32(attrs, &self.tokens, "number-columns-spanned").unwrap_or(1).max(1);
        cell.rows_spanned = attr_i32(attrs, &self.tokens, "number-rows-spanned").unwrap_or(1).max(1);
        cell.matrix_columns_spanned = attr_i32(attrs, &self.tokens, "number-matrix-columns-spanned").unwrap_or(0);
        cell.matrix_rows_spanned = attr_i32(attrs, &self.tokens, "number-matrix-rows-spanned").unwrap_or(0);
        cell.style_name = attr_str(attrs, &self.tokens, "style-name").map(str::to_string);
        self.cell = cell;
    }

    fn start_paragraph(&mut self) {
        if !self.cell_text.is_empty() {
            self.cell_text.push('\n');
        }
    }

    fn end_cell(&mut self) {
        let row = self.row;
        let col = self.col;
        let cell = std::mem::replace(&mut self.cell, CellAttrs::default());
        let text = std::mem::take(&mut self.cell_text);
        let covered = self.covered;
        self.in_cell = false;
        self.covered = false;

        if covered {
            self.col = col + cell.columns_repeated.max(1);
            return;
        }

        if let Some(style_name) = &cell.style_name {
            if let Some(&xf) = self.catalog.borrow().cell_xf_by_name.get(style_name) {
                let sheet_index = self.cur_sheet_index;
                if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                    for offset in 0..cell.columns_repeated.min(MAX_CELL_REPEAT_FANOUT) {
                        sheet.set_format(row, col + offset, xf);
                    }
                }
            }
        }

        if cell.columns_spanned > 1 || cell.rows_spanned > 1 {
            let range = CellRange::new(
                CellAddress::new(self.cur_sheet_index, row, col),
                CellAddress::new(self.cur_sheet_index, row + cell.rows_spanned - 1, col + cell.columns_spanned - 1),
            );
            let sheet_index = self.cur_sheet_index;
            if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
                props.set_merge_cell_range(range);
            }
        }

        if cell.matrix_columns_spanned > 0 || cell.matrix_rows_spanned > 0 {
            if let Some(formula) = &cell.formula {
                self.start_array_formula(row, col, formula, &cell);
            }
        }
        if self.feed_array_if_active(row, col, &cell, &text) {
            self.col = col + cell.columns_repeated.max(1);
            return;
        }

        if let Some(formula) = cell.formula.clone() {
            self.handle_formula_cell(row, col, &formula, &cell, &text);
        } else {
            self.handle_plain_cell(row, col, &cell, &text);
        }

        self.col = col + cell.columns_repeated.max(1);
    }

    fn start_array_formula(&mut self, row: i32, col: i32, formula: &str, cell: &CellAttrs) {
        let rows = cell.matrix_rows_spanned.max(1);
        let cols = cell.matrix_columns_spanned.max(1);
        let range =
            CellRange::new(CellAddress::new(self.cur_sheet_index, row, col), CellAddress::new(self.cur_sheet_index, row + rows - 1, col + cols - 1));
        let sheet_index = self.cur_sheet_index;
        let Some(mut builder) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.start_array_formula()) else {
            return;
        };
        builder.set_range(range);
        builder.set_formula(FormulaGrammar::Ods, formula);
        let total = range.row_span() * range.column_span();
        self.array_state = Some(ArrayState { range, builder, filled: 0, total });
    }

    /// If a matrix formula range is active and `(row, col)` falls inside
    /// it, records the cell's value there and commits once the whole
    /// range has been seen. Returns whether the cell was consumed.
    fn feed_array_if_active(&mut self, row: i32, col: i32, cell: &CellAttrs, text: &str) -> bool {
        let in_range = match &self.array_state {
            Some(state) => state.range.contains(row, col),
            None => false,
        };
        if !in_range {
            return false;
        }
        let value = classify_result(cell, text);
        if let Some(state) = &mut self.array_state {
            let row_offset = row - state.range.first.row;
            let col_offset = col - state.range.first.column;
            state.builder.set_result_value(row_offset, col_offset, &value);
            state.filled += 1;
            if state.filled >= state.total {
                if let Some(state) = self.array_state.take() {
                    state.builder.commit();
                }
            }
        }
        true
    }

    fn handle_formula_cell(&mut self, row: i32, col: i32, formula: &str, cell: &CellAttrs, text: &str) {
        let sheet_index = self.cur_sheet_index;
        let Some(mut f) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.start_formula()) else {
            return;
        };
        f.set_position(row, col);
        f.set_formula(FormulaGrammar::Ods, formula);
        apply_formula_result(f.as_mut(), cell, text);
        f.commit();
    }

    fn handle_plain_cell(&mut self, row: i32, col: i32, cell: &CellAttrs, text: &str) {
        match cell.value_type {
            Some(ValueType::Float) | Some(ValueType::Percentage) | Some(ValueType::Currency) => {
                if let Some(v) = cell.value {
                    self.set_value_repeated(row, col, cell.columns_repeated, v);
                }
            }
            Some(ValueType::Boolean) => {
                if let Some(v) = cell.boolean_value {
                    self.set_bool_repeated(row, col, cell.columns_repeated, v);
                }
            }
            Some(ValueType::Date) => {
                if let Some((y, m, d, hh, mm, ss)) = cell.date_value.as_deref().and_then(parse_odf_date) {
                    let sheet_index = self.cur_sheet_index;
                    if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                        sheet.set_date_time(row, col, y, m, d, hh, mm, ss);
                    }
                }
            }
            Some(ValueType::Time) => {
                if let Some(v) = cell.time_value.as_deref().and_then(parse_odf_duration_day_fraction) {
                    self.set_value_repeated(row, col, cell.columns_repeated, v);
                }
            }
            Some(ValueType::String) => {
                let value = cell.string_value.as_deref().unwrap_or(text.trim_end_matches('\n'));
                if !value.is_empty() {
                    self.set_string_repeated(row, col, cell.columns_repeated, value);
                }
            }
            Some(ValueType::Unknown) | None => {
                if !text.is_empty() {
                    let sheet_index = self.cur_sheet_index;
                    if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                        sheet.set_auto(row, col, &text);
                    }
                }
            }
        }
    }

    fn set_value_repeated(&mut self, row: i32, col: i32, repeated: i32, v: f64) {
        let sheet_index = self.cur_sheet_index;
        if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
            for offset in 0..repeated.min(MAX_CELL_REPEAT_FANOUT) {
                sheet.set_value(row, col + offset, v);
            }
        }
    }

    fn set_bool_repeated(&mut self, row: i32, col: i32, repeated: i32, v: bool) {
        let sheet_index = self.cur_sheet_index;
        if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
            for offset in 0..repeated.min(MAX_CELL_REPEAT_FANOUT) {
                sheet.set_bool(row, col + offset, v);
            }
        }
    }

    fn set_string_repeated(&mut self, row: i32, col: i32, repeated: i32, text: &str) {
        let Some(id) = self.factory().shared_strings().map(|s| s.add(text)) else { return };
        let sheet_index = self.cur_sheet_index;
        if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
            for offset in 0..repeated.min(MAX_CELL_REPEAT_FANOUT) {
                sheet.set_string(row, col + offset, id);
            }
        }
    }

    fn start_named_range(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(name) = attr_str(attrs, &self.tokens, "name") else { return };
        let Some(range_text) = attr_str(attrs, &self.tokens, "cell-range-address") else { return };
        let sheet_index = self.cur_sheet_index;
        let target = if sheet_index >= 0 {
            self.factory().sheet_by_index(sheet_index).and_then(|s| s.named_expression())
        } else {
            self.factory().named_expression()
        };
        if let Some(mut ne) = target {
            if let Some((_, (c1, r1), _)) = cell_ref::parse_odf_range_ref(range_text) {
                ne.set_base_position(r1, c1);
            }
            ne.set_named_expression(name, FormulaGrammar::Ods, range_text);
            ne.commit();
        }
    }

    fn start_named_expression(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(name) = attr_str(attrs, &self.tokens, "name") else { return };
        let Some(formula) = attr_str(attrs, &self.tokens, "formula") else { return };
        let sheet_index = self.cur_sheet_index;
        let target = if sheet_index >= 0 {
            self.factory().sheet_by_index(sheet_index).and_then(|s| s.named_expression())
        } else {
            self.factory().named_expression()
        };
        if let Some(mut ne) = target {
            if let Some(base) = attr_str(attrs, &self.tokens, "base-cell-address").and_then(cell_ref::parse_odf_cell_ref) {
                ne.set_base_position(base.2, base.1);
            }
            ne.set_named_expression(name, FormulaGrammar::Ods, strip_formula_prefix(formula));
            ne.commit();
        }
    }
}

fn classify_result(cell: &CellAttrs, text: &str) -> ResultValue {
    match cell.value_type {
        Some(ValueType::Float) | Some(ValueType::Percentage) | Some(ValueType::Currency) => {
            ResultValue::Value(cell.value.unwrap_or(0.0))
        }
        Some(ValueType::Boolean) => ResultValue::Bool(cell.boolean_value.unwrap_or(false)),
        Some(ValueType::Time) => ResultValue::Value(cell.time_value.as_deref().and_then(parse_odf_duration_day_fraction).unwrap_or(0.0)),
        Some(ValueType::String) => ResultValue::String(cell.string_value.clone().unwrap_or_else(|| text.to_string())),
        Some(ValueType::Date) | Some(ValueType::Unknown) | None => {
            if let Some(v) = cell.value {
                ResultValue::Value(v)
            } else if text.is_empty() {
                ResultValue::Empty
            } else {
                ResultValue::String(text.to_string())
            }
        }
    }
}

fn apply_formula_result(f: &mut dyn Formula, cell: &CellAttrs, text: &str) {
    match classify_result(cell, text) {
        ResultValue::Value(v) => f.set_result_value(v),
        ResultValue::Bool(b) => f.set_result_bool(b),
        ResultValue::String(s) => f.set_result_string(&s),
        ResultValue::Empty => f.set_result_empty(),
        ResultValue::Error(e) => f.set_result_string(&e),
    }
}

impl Context for ContentContext {
    fn can_handle_element(&self, name: ElementName) -> bool {
        let t = name.token;
        t != tok(&self.tokens, "automatic-styles") && t != tok(&self.tokens, "styles") && t != tok(&self.tokens, "database-ranges")
    }

    fn create_child_context(&mut self, name: ElementName) -> Option<Box<dyn Context>> {
        let t = name.token;
        if t == tok(&self.tokens, "automatic-styles") || t == tok(&self.tokens, "styles") {
            let styles_tokens = Rc::new(odf_styles::build_tokens());
            return Some(Box::new(odf_styles::StylesContext::new(self.factory_static(), styles_tokens, self.catalog.clone())));
        }
        if t == tok(&self.tokens, "database-ranges") {
            return Some(Box::new(DatabaseRangesContext::new(self.factory_static(), self.sheet_names.clone())));
        }
        None
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "table") {
            self.start_table(attrs);
        } else if t == tok(&self.tokens, "table-column") {
            self.start_table_column(attrs);
        } else if t == tok(&self.tokens, "table-row") {
            self.start_table_row(attrs);
        } else if t == tok(&self.tokens, "table-cell") {
            self.start_cell(attrs, false);
        } else if t == tok(&self.tokens, "covered-table-cell") {
            self.start_cell(attrs, true);
        } else if t == tok(&self.tokens, "p") {
            self.start_paragraph();
        } else if t == tok(&self.tokens, "named-range") {
            self.start_named_range(attrs);
        } else if t == tok(&self.tokens, "named-expression") {
            self.start_named_expression(attrs);
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "table-cell") || t == tok(&self.tokens, "covered-table-cell") {
            self.end_cell();
        } else if t == tok(&self.tokens, "table-row") {
            self.end_table_row();
        }
        false
    }

    fn characters(&mut self, value: StrView<'_>, _transient: bool) {
        if self.in_cell {
            self.cell_text.push_str(value.as_str().unwrap_or(""));
        }
    }
}

/// Child context for `<table:database-ranges>`: one [`Table`] plus an
/// optional [`AutoFilter`] per `<table:database-range>`, with the
/// recursive `table:filter-and`/`table:filter-or`/`table:filter-condition`
/// tree built on a `Vec<Box<dyn FilterNode>>` stack, the same idiom
/// `xls_xml.rs`'s `AutoFilterContext` uses for `<x:AutoFilter>`.
struct DatabaseRangesContext {
    factory: *mut dyn ImportFactory,
    sheet_names: Rc<RefCell<HashMap<String, i32>>>,
    tokens: Rc<TokenMap>,

    table: Option<Box<dyn Table>>,
    target_sheet_index: i32,
    target_range: Option<CellRange>,
    filter: Option<Box<dyn AutoFilter>>,
    node_stack: Vec<Box<dyn FilterNode>>,
    implicit_condition_wrapper: bool,
}

impl DatabaseRangesContext {
    fn new(factory: &mut dyn ImportFactory, sheet_names: Rc<RefCell<HashMap<String, i32>>>) -> Self {
        DatabaseRangesContext {
            factory: factory as *mut dyn ImportFactory,
            sheet_names,
            tokens: Rc::new(build_tokens()),
            table: None,
            target_sheet_index: -1,
            target_range: None,
            filter: None,
            node_stack: Vec::new(),
            implicit_condition_wrapper: false,
        }
    }

    fn factory(&mut self) -> &mut dyn ImportFactory {
        unsafe { &mut *self.factory }
    }

    fn start_database_range(&mut self, attrs: &[XmlAttribute<'_>]) {
        let name = attr_str(attrs, &self.tokens, "name").unwrap_or("").to_string();
        let Some(range_text) = attr_str(attrs, &self.tokens, "target-range-address") else { return };
        let Some((sheet_name, first, last)) = cell_ref::parse_odf_range_ref(range_text) else { return };
        let Some(sheet_name) = sheet_name else { return };
        let Some(&sheet_index) = self.sheet_names.borrow().get(sheet_name) else {
            log::warn!("ods: database range '{name}' targets unknown sheet '{sheet_name}'");
            return;
        };
        let range = CellRange::new(CellAddress::new(sheet_index, first.1, first.0), CellAddress::new(sheet_index, last.1, last.0));
        self.target_sheet_index = sheet_index;
        self.target_range = Some(range);
        let Some(mut table) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.start_table()) else {
            return;
        };
        table.set_name(&name);
        table.set_range(range);
        self.table = Some(table);
    }

    fn end_database_range(&mut self) {
        if let Some(table) = self.table.take() {
            table.commit();
        }
        self.target_range = None;
        self.target_sheet_index = -1;
    }

    fn start_filter(&mut self) {
        let Some(range) = self.target_range else { return };
        let sheet_index = self.target_sheet_index;
        self.filter = self.factory().sheet_by_index(sheet_index).and_then(|s| s.start_auto_filter(range));
    }

    fn end_filter(&mut self) {
        if let Some(filter) = self.filter.take() {
            filter.commit();
        }
    }

    fn start_filter_node(&mut self, connector: FilterConnector) {
        let node = match self.node_stack.last_mut() {
            Some(top) => top.start_node(connector),
            None => {
                let Some(filter) = &mut self.filter else { return };
                filter.start_node(connector)
            }
        };
        self.node_stack.push(node);
    }

    fn end_filter_node(&mut self) {
        if let Some(node) = self.node_stack.pop() {
            node.commit();
        }
    }

    /// A bare `<table:filter-condition>` directly under `<table:filter>`
    /// (no `filter-and`/`filter-or` wrapper) still needs one implicit AND
    /// node to append its item to; the wrapper is closed again in
    /// `end_element` once this same condition closes, tracked by
    /// `implicit_condition_wrapper` rather than stack depth alone, since a
    /// condition nested inside a real `filter-and`/`filter-or` can also
    /// leave the stack at depth one.
    fn ensure_node_for_condition(&mut self) {
        if self.node_stack.is_empty() {
            self.start_filter_node(FilterConnector::And);
            self.implicit_condition_wrapper = true;
        }
    }

    fn start_filter_condition(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.ensure_node_for_condition();
        let Some(top) = self.node_stack.last_mut() else { return };
        let field = attr_i32(attrs, &self.tokens, "field-number").unwrap_or(0);
        let op_text = attr_str(attrs, &self.tokens, "operator").unwrap_or("=");
        let op = parse_field_operator(op_text);
        let value_text = attr_str(attrs, &self.tokens, "value").unwrap_or("");
        let data_type = attr_str(attrs, &self.tokens, "data-type").unwrap_or("text");
        let value = match op {
            FilterOperator::Empty | FilterOperator::NotEmpty => FilterValue::Empty,
            _ if data_type == "number" => match value_text.parse::<f64>() {
                Ok(v) => FilterValue::Numeric(v),
                Err(_) => FilterValue::Text(value_text.to_string()),
            },
            _ => FilterValue::Text(value_text.to_string()),
        };
        top.append_item(field, op, value);
    }
}

/// `ods_database_ranges_context.cpp`'s `field_op` sorted-string-map.
fn parse_field_operator(text: &str) -> FilterOperator {
    match text {
        "!=" => FilterOperator::NotEqual,
        "!begins" => FilterOperator::NotBeginWith,
        "!contains" => FilterOperator::NotContain,
        "!empty" => FilterOperator::NotEmpty,
        "!ends" => FilterOperator::NotEndWith,
        "<" => FilterOperator::Less,
        "<=" => FilterOperator::LessEqual,
        ">" => FilterOperator::Greater,
        ">=" => FilterOperator::GreaterEqual,
        "begins" => FilterOperator::BeginWith,
        "bottom percent" => FilterOperator::BottomPercent,
        "bottom values" => FilterOperator::Bottom,
        "contains" => FilterOperator::Contain,
        "empty" => FilterOperator::Empty,
        "ends" => FilterOperator::EndWith,
        "top percent" => FilterOperator::TopPercent,
        "top values" => FilterOperator::Top,
        _ => FilterOperator::Equal,
    }
}

impl Context for DatabaseRangesContext {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "database-range") {
            self.start_database_range(attrs);
        } else if t == tok(&self.tokens, "filter") {
            self.start_filter();
        } else if t == tok(&self.tokens, "filter-and") {
            self.start_filter_node(FilterConnector::And);
        } else if t == tok(&self.tokens, "filter-or") {
            self.start_filter_node(FilterConnector::Or);
        } else if t == tok(&self.tokens, "filter-condition") {
            self.start_filter_condition(attrs);
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "database-range") {
            self.end_database_range();
        } else if t == tok(&self.tokens, "filter") {
            self.end_filter();
        } else if t == tok(&self.tokens, "filter-and") || t == tok(&self.tokens, "filter-or") {
            self.end_filter_node();
        } else if t == tok(&self.tokens, "filter-condition") {
            // A bare condition with no explicit and/or wrapper opened its
            // own implicit AND node in `start_filter_condition`; close it
            // here rather than leaving it dangling for the next sibling.
            // A condition nested inside a real `filter-and`/`filter-or`
            // never set this flag, so it's untouched until that wrapper's
            // own end_element fires.
            if self.implicit_condition_wrapper {
                self.end_filter_node();
                self.implicit_condition_wrapper = false;
            }
        } else if t == tok(&self.tokens, "database-ranges") {
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordedSheet {
        values: Vec<(i32, i32, f64)>,
        strings: Vec<(i32, i32, u32)>,
        merges: Vec<CellRange>,
        formats: Vec<(i32, i32, u32)>,
    }

    impl Sheet for RecordedSheet {
        fn set_value(&mut self, row: i32, column: i32, value: f64) {
            self.values.push((row, column, value));
        }
        fn set_string(&mut self, row: i32, column: i32, string_id: u32) {
            self.strings.push((row, column, string_id));
        }
        fn set_format(&mut self, row: i32, column: i32, xf_id: u32) {
            self.formats.push((row, column, xf_id));
        }
        fn sheet_properties(&mut self) -> Option<&mut dyn SheetProperties> {
            Some(self)
        }
        fn start_array_formula(&mut self) -> Option<Box<dyn ArrayFormula>> {
            Some(Box::new(RecordedArrayFormula::default()))
        }
    }

    impl SheetProperties for RecordedSheet {
        fn set_merge_cell_range(&mut self, range: CellRange) {
            self.merges.push(range);
        }
    }

    #[derive(Default)]
    struct RecordedArrayFormula {
        values: Vec<(i32, i32, ResultValue)>,
    }
    impl ArrayFormula for RecordedArrayFormula {
        fn set_result_value(&mut self, row_offset: i32, column_offset: i32, value: &ResultValue) {
            self.values.push((row_offset, column_offset, value.clone()));
        }
        fn commit(self: Box<Self>) {}
    }

    #[derive(Default)]
    struct RecordedStrings {
        values: Vec<String>,
    }
    impl crate::import::SharedStrings for RecordedStrings {
        fn add(&mut self, value: &str) -> u32 {
            self.values.push(value.to_string());
            (self.values.len() - 1) as u32
        }
        fn start_segments(&mut self) -> Box<dyn crate::import::SharedStringSegments> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[derive(Default)]
    struct RecordedFactory {
        sheets: Vec<RecordedSheet>,
        shared: RecordedStrings,
    }

    impl ImportFactory for RecordedFactory {
        fn append_sheet(&mut self, sheet_index: i32, _name: &str) -> Option<&mut dyn Sheet> {
            while self.sheets.len() <= sheet_index as usize {
                self.sheets.push(RecordedSheet::default());
            }
            Some(&mut self.sheets[sheet_index as usize])
        }
        fn sheet_by_index(&mut self, index: i32) -> Option<&mut dyn Sheet> {
            if index < 0 {
                return None;
            }
            while self.sheets.len() <= index as usize {
                self.sheets.push(RecordedSheet::default());
            }
            Some(&mut self.sheets[index as usize])
        }
        fn shared_strings(&mut self) -> Option<&mut dyn crate::import::SharedStrings> {
            Some(&mut self.shared)
        }
    }

    fn parse_content(xml: &[u8], factory: &mut dyn ImportFactory) {
        import_content_single(xml, factory, Rc::new(RefCell::new(StyleCatalog::default()))).unwrap();
    }

    #[test]
    fn float_and_string_cells_land_on_the_right_sheet() {
        let xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="12.5"/>
    <table:table-cell office:value-type="string" office:string-value="hello"/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;
        let mut factory = RecordedFactory::default();
        parse_content(xml, &mut factory);
        assert_eq!(factory.sheets[0].values, vec![(0, 0, 12.5)]);
        assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
    }

    #[test]
    fn repeated_columns_fan_out_the_same_value() {
        let xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="1" table:number-columns-repeated="3"/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;
        let mut factory = RecordedFactory::default();
        parse_content(xml, &mut factory);
        assert_eq!(factory.sheets[0].values, vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0)]);
    }

    #[test]
    fn repeated_rows_advance_the_row_cursor_without_duplicating_content() {
        let xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row table:number-rows-repeated="1000"/>
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="9"/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;
        let mut factory = RecordedFactory::default();
        parse_content(xml, &mut factory);
        assert_eq!(factory.sheets[0].values, vec![(1000, 0, 9.0)]);
    }

    #[test]
    fn merged_cell_spans_set_a_merge_range() {
        let xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="string" office:string-value="x" table:number-columns-spanned="2" table:number-rows-spanned="3"/>
    <table:covered-table-cell/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;
        let mut factory = RecordedFactory::default();
        parse_content(xml, &mut factory);
        assert_eq!(factory.sheets[0].merges.len(), 1);
        assert_eq!(factory.sheets[0].merges[0].column_span(), 2);
        assert_eq!(factory.sheets[0].merges[0].row_span(), 3);
    }

    #[test]
    fn matrix_formula_fans_result_values_across_its_range() {
        let xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="4" table:formula="of:=SUM([.A1:.A2])" table:number-matrix-columns-spanned="1" table:number-matrix-rows-spanned="2"/>
    <table:table-cell/>
   </table:table-row>
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="4"/>
    <table:table-cell/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;
        let mut factory = RecordedFactory::default();
        parse_content(xml, &mut factory);
        assert!(factory.sheets[0].values.is_empty());
    }

    #[test]
    fn value_type_parsing_covers_the_enriched_kinds() {
        assert_eq!(parse_value_type("percentage"), ValueType::Percentage);
        assert_eq!(parse_value_type("currency"), ValueType::Currency);
        assert_eq!(parse_value_type("boolean"), ValueType::Boolean);
        assert_eq!(parse_value_type("nonsense"), ValueType::Unknown);
    }

    #[test]
    fn formula_prefix_stripping_handles_both_conventions() {
        assert_eq!(strip_formula_prefix("of:=SUM(A1:A2)"), "SUM(A1:A2)");
        assert_eq!(strip_formula_prefix("=SUM(A1:A2)"), "SUM(A1:A2)");
    }

    #[test]
    fn duration_parses_to_a_day_fraction() {
        let frac = parse_odf_duration_day_fraction("PT12H0M0S").unwrap();
        assert!((frac - 0.5).abs() < 1e-9);
    }

    #[test]
    fn filter_operator_table_covers_text_and_numeric_operators() {
        assert_eq!(parse_field_operator("contains"), FilterOperator::Contain);
        assert_eq!(parse_field_operator(">="), FilterOperator::GreaterEqual);
        assert_eq!(parse_field_operator("top percent"), FilterOperator::TopPercent);
        assert_eq!(parse_field_operator("unknown"), FilterOperator::Equal);
    }
}
