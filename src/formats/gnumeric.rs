//! Gnumeric format handler (spec §4.10 "gnumeric"), grounded on
//! `gnumeric_context.{hpp,cpp}`, `gnumeric_sheet_context.cpp`,
//! `gnumeric_cell_context.cpp`, `gnumeric_filter_context.cpp`,
//! `gnumeric_names_context.cpp` and `gnumeric_styles_context.cpp`.
//!
//! Gnumeric's native XML is a plain (unzipped) document, so `import` runs
//! the single-threaded SAX parser directly, the same way [`super::xls_xml`]
//! does. Unlike xls-xml, nothing in the gnumeric vocabulary this handler
//! covers recurses (`<gnm:Filter>` has exactly one implicit AND root and
//! no nested OR scope, `<gnm:StyleRegion>` is never nested inside
//! another), so one flat [`WorkbookContext`] is enough — no dedicated
//! child context is needed the way xls-xml's `<x:AutoFilter>` needs one.
//!
//! Two deliberate divergences from the xlsx handler, both load-bearing in
//! the real source and preserved here:
//! - An array formula (`Rows`/`Cols` attributes on `<gnm:Cell>`) does
//!   *not* fan out a `set_result_value` call per offset the way xlsx's
//!   does; gnumeric only ever calls `set_range`/`set_formula`/`commit`.
//! - Gnumeric's filter `<gnm:Field>` element has a documented upstream
//!   bug where `Value0` and `ValueType0` are swapped: `Value0` carries
//!   the numeric value-type code and `ValueType0` carries the value text.
//!   This handler reads them the way gnumeric actually writes them, not
//!   the way the attribute names suggest.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::formats::cell_ref;
use crate::import::{
    ArrayFormula, AutoFilter, FillStyleBuilder, FilterNode, Formula, FontStyleBuilder, ImportFactory, NamedExpression,
    Sheet, SheetProperties, SharedStrings, Styles, XfBuilder,
};
use crate::import::types::{Argb, FilterConnector, FilterOperator, FilterValue, HorizontalAlignment, VerticalAlignment, XfCategory};
use crate::strings::StrView;
use crate::types::{CellAddress, CellRange, FormulaGrammar};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};
use std::rc::Rc;

pub const NS_GNM: &str = "http://www.gnumeric.org/v10.dtd";

const ELEMENTS: &[&str] = &[
    "Workbook",
    "Sheets",
    "Sheet",
    "Name",
    "Cells",
    "Cell",
    "Cols",
    "ColInfo",
    "Rows",
    "RowInfo",
    "MergedRegions",
    "Merge",
    "Names",
    "name",
    "value",
    "position",
    "Filters",
    "Filter",
    "Field",
    "Styles",
    "StyleRegion",
    "Style",
    "Font",
    "Row",
    "Col",
    "ValueType",
    "ExprID",
    "No",
    "Unit",
    "Count",
    "Hidden",
    "Area",
    "Index",
    "Type",
    "Op0",
    "Value0",
    "ValueType0",
    "startCol",
    "startRow",
    "endCol",
    "endRow",
    "HAlign",
    "VAlign",
    "WrapText",
    "Fore",
    "Back",
    "Bold",
    "Italic",
    "Underline",
];

/// Builds the token map this format's handler code relies on.
pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

/// Parse a complete gnumeric workbook document, driving `factory`.
pub fn import(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    repo.add_predefined_values(&[NS_GNM]);
    let tokens = Rc::new(build_tokens());

    let root = WorkbookContext::new(factory, tokens.clone());
    let mut stack = crate::context::ContextStack::new(Box::new(root));
    sax::parse(xml, &mut repo, &tokens, &mut stack)?;
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

fn attr_i32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<i32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<i32>().ok())
}

fn attr_f64(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<f64> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<f64>().ok())
}

fn attr_bool(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> bool {
    matches!(attr_str(attrs, tokens, name), Some("1") | Some("true") | Some("TRUE"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Bool,
    Value,
    String,
    Formula,
    SharedFormula,
    Array,
    Unknown,
}

#[derive(Default)]
struct CellState {
    row: i32,
    col: i32,
    shared_formula_id: Option<u32>,
    array_rows: i32,
    array_cols: i32,
}

/// Root context for a `<gnm:Workbook>` document.
struct WorkbookContext {
    factory: *mut dyn ImportFactory,
    tokens: Rc<TokenMap>,

    cur_sheet_index: i32,

    cell: CellState,
    cell_type: CellType,
    cell_text: String,
    in_cell: bool,

    in_merge: bool,
    merge_text: String,

    cur_name_text: String,
    cur_name_value: String,
    pending_name: Option<String>,

    cur_xf: Option<Box<dyn XfBuilder>>,
    cur_fill: Option<Box<dyn FillStyleBuilder>>,
    cur_fill_set: bool,
    style_region: CellRange,

    filter: Option<Box<dyn AutoFilter>>,
    filter_node: Option<Box<dyn FilterNode>>,
}

impl WorkbookContext {
    fn new(factory: &mut dyn ImportFactory, tokens: Rc<TokenMap>) -> Self {
        WorkbookContext {
            factory: factory as *mut dyn ImportFactory,
            tokens,
            cur_sheet_index: -1,
            cell: CellState::default(),
            cell_type: CellType::Unknown,
            cell_text: String::new(),
            in_cell: false,
            in_merge: false,
            merge_text: String::new(),
            cur_name_text: String::new(),
            cur_name_value: String::new(),
            pending_name: None,
            cur_xf: None,
            cur_fill: None,
            cur_fill_set: false,
            style_region: CellRange::default(),
            filter: None,
            filter_node: None,
        }
    }

    fn factory(&mut self) -> &mut dyn ImportFactory {
        unsafe { &mut *self.factory }
    }

    fn start_sheet(&mut self) {
        self.cur_sheet_index += 1;
    }

    fn start_cell(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.in_cell = true;
        self.cell_text.clear();
        let mut cell = CellState::default();
        let mut cell_type = CellType::Formula;

        if let Some(row) = attr_i32(attrs, &self.tokens, "Row") {
            cell.row = row;
        }
        if let Some(col) = attr_i32(attrs, &self.tokens, "Col") {
            cell.col = col;
        }
        if let Some(vt) = attr_i32(attrs, &self.tokens, "ValueType") {
            cell_type = match vt {
                20 => CellType::Bool,
                30 | 40 => CellType::Value,
                60 => CellType::String,
                _ => cell_type,
            };
        }
        if let Some(id) = attr_i32(attrs, &self.tokens, "ExprID") {
            cell.shared_formula_id = Some(id.max(0) as u32);
            cell_type = CellType::SharedFormula;
        }
        if let Some(rows) = attr_i32(attrs, &self.tokens, "Rows") {
            cell.array_rows = rows;
            cell_type = CellType::Array;
        }
        if let Some(cols) = attr_i32(attrs, &self.tokens, "Cols") {
            cell.array_cols = cols;
            cell_type = CellType::Array;
        }

        self.cell = cell;
        self.cell_type = cell_type;
    }

    fn end_cell(&mut self) {
        let sheet_index = self.cur_sheet_index;
        let cell = std::mem::take(&mut self.cell);
        let cell_type = self.cell_type;
        let text = std::mem::take(&mut self.cell_text);
        self.in_cell = false;
        self.cell_type = CellType::Unknown;

        match cell_type {
            CellType::Value => {
                if let Ok(v) = text.trim().parse::<f64>() {
                    if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                        sheet.set_value(cell.row, cell.col, v);
                    }
                }
            }
            CellType::String => {
                let id = self.factory().shared_strings().map(|s| s.add(&text));
                if let (Some(id), Some(sheet)) = (id, self.factory().sheet_by_index(sheet_index)) {
                    sheet.set_string(cell.row, cell.col, id);
                }
            }
            CellType::Bool => {
                if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                    sheet.set_bool(cell.row, cell.col, text.trim() == "TRUE");
                }
            }
            CellType::Formula => {
                let Some(body) = text.strip_prefix('=') else { return };
                if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                    if let Some(mut f) = sheet.start_formula() {
                        f.set_position(cell.row, cell.col);
                        f.set_formula(FormulaGrammar::Gnumeric, body);
                        f.commit();
                    }
                }
            }
            CellType::SharedFormula => {
                let Some(body) = text.strip_prefix('=') else { return };
                let Some(index) = cell.shared_formula_id else { return };
                if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                    if let Some(mut f) = sheet.start_formula() {
                        f.set_position(cell.row, cell.col);
                        f.set_formula(FormulaGrammar::Gnumeric, body);
                        f.set_shared_formula_index(index);
                        f.commit();
                    }
                }
            }
            CellType::Array => {
                let Some(body) = text.strip_prefix('=') else { return };
                let last_row = cell.row + cell.array_rows - 1;
                let last_col = cell.col + cell.array_cols - 1;
                let range = CellRange {
                    first: CellAddress { sheet: sheet_index, row: cell.row, column: cell.col },
                    last: CellAddress { sheet: sheet_index, row: last_row, column: last_col },
                };
                if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                    if let Some(mut af) = sheet.start_array_formula() {
                        af.set_range(range);
                        af.set_formula(FormulaGrammar::Gnumeric, body);
                        af.commit();
                    }
                }
            }
            CellType::Unknown => {}
        }
    }

    fn start_col_info(&mut self, attrs: &[XmlAttribute<'_>]) {
        let sheet_index = self.cur_sheet_index;
        let col = attr_i32(attrs, &self.tokens, "No").unwrap_or(0);
        let span = attr_i32(attrs, &self.tokens, "Count").unwrap_or(1).max(1);
        let width = attr_f64(attrs, &self.tokens, "Unit").unwrap_or(0.0);
        let hidden = attr_bool(attrs, &self.tokens, "Hidden");
        if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
            props.set_column_width(col, span, width);
            props.set_column_hidden(col, span, hidden);
        }
    }

    fn start_row_info(&mut self, attrs: &[XmlAttribute<'_>]) {
        let sheet_index = self.cur_sheet_index;
        let row = attr_i32(attrs, &self.tokens, "No").unwrap_or(0);
        let height = attr_f64(attrs, &self.tokens, "Unit").unwrap_or(0.0);
        let hidden = attr_bool(attrs, &self.tokens, "Hidden");
        if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
            props.set_row_height(row, height);
            props.set_row_hidden(row, hidden);
        }
    }

    fn end_merge(&mut self) {
        self.in_merge = false;
        let text = std::mem::take(&mut self.merge_text);
        let sheet_index = self.cur_sheet_index;
        let Some(((c1, r1), (c2, r2))) = cell_ref::parse_range_ref(text.trim()) else { return };
        if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
            props.set_merge_cell_range(CellRange {
                first: CellAddress { sheet: sheet_index, row: r1, column: c1 },
                last: CellAddress { sheet: sheet_index, row: r2, column: c2 },
            });
        }
    }

    fn end_name_value(&mut self) {
        let name = std::mem::take(&mut self.cur_name_text);
        let value = std::mem::take(&mut self.cur_name_value);
        if name.is_empty() || value.is_empty() {
            return;
        }
        let sheet_index = self.cur_sheet_index;
        let target = if sheet_index >= 0 {
            self.factory().sheet_by_index(sheet_index).and_then(|s| s.named_expression())
        } else {
            self.factory().named_expression()
        };
        if let Some(mut ne) = target {
            let expr = value.strip_prefix('=').unwrap_or(&value);
            ne.set_named_expression(&name, FormulaGrammar::Gnumeric, expr);
            ne.commit();
        }
        let _ = self.pending_name.take();
    }

    fn start_filter(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(area_text) = attr_str(attrs, &self.tokens, "Area") else { return };
        let Some(((c1, r1), (c2, r2))) = cell_ref::parse_range_ref(area_text) else { return };
        let sheet_index = self.cur_sheet_index;
        let range = CellRange {
            first: CellAddress { sheet: sheet_index, row: r1, column: c1 },
            last: CellAddress { sheet: sheet_index, row: r2, column: c2 },
        };
        let Some(mut filter) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.start_auto_filter(range)) else {
            return;
        };
        let node = filter.start_node(FilterConnector::And);
        self.filter = Some(filter);
        self.filter_node = Some(node);
    }

    fn start_field(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(node) = &mut self.filter_node else { return };
        let Some(field) = attr_i32(attrs, &self.tokens, "Index") else {
            log::warn!("gnumeric filter field is missing a valid Index attribute");
            return;
        };
        let field_type = attr_str(attrs, &self.tokens, "Type").unwrap_or("");
        let op = match attr_str(attrs, &self.tokens, "Op0") {
            Some("eq") => FilterOperator::Equal,
            Some("gt") => FilterOperator::Greater,
            Some("lt") => FilterOperator::Less,
            Some("gte") => FilterOperator::GreaterEqual,
            Some("lte") => FilterOperator::LessEqual,
            Some("ne") => FilterOperator::NotEqual,
            _ => FilterOperator::Equal,
        };

        match field_type {
            "blanks" => node.append_item(field, FilterOperator::Empty, FilterValue::Empty),
            "noblanks" => node.append_item(field, FilterOperator::NotEmpty, FilterValue::Empty),
            "bucket" => log::warn!("gnumeric bucket filter field type is not handled"),
            "expr" => {
                // Due to an upstream gnumeric bug, Value0 carries the
                // numeric value-type code and ValueType0 carries the
                // value text — the attribute names are swapped.
                let value_type = attr_i32(attrs, &self.tokens, "Value0");
                let value_text = attr_str(attrs, &self.tokens, "ValueType0").unwrap_or("");
                match value_type {
                    Some(10) => log::warn!("empty gnumeric filter value type is not handled"),
                    Some(20) => node.append_item(field, op, FilterValue::Boolean(value_text == "1" || value_text.eq_ignore_ascii_case("true"))),
                    Some(40) => match value_text.parse::<f64>() {
                        Ok(v) => node.append_item(field, op, FilterValue::Numeric(v)),
                        Err(_) => log::warn!("numeric gnumeric filter value failed to parse: {value_text}"),
                    },
                    Some(50) => log::warn!("error gnumeric filter value type is not handled"),
                    Some(60) => node.append_item(field, op, FilterValue::Text(value_text.to_string())),
                    Some(70) => log::warn!("cell-range gnumeric filter value type is not handled"),
                    Some(80) => log::warn!("array gnumeric filter value type is not handled"),
                    _ => log::warn!("valid filter value type was not found"),
                }
            }
            _ => log::warn!("invalid gnumeric filter field type: {field_type}"),
        }
    }

    fn end_filter(&mut self) {
        if let Some(node) = self.filter_node.take() {
            node.commit();
        }
        if let Some(filter) = self.filter.take() {
            filter.commit();
        }
    }

    fn start_style_region(&mut self, attrs: &[XmlAttribute<'_>]) {
        let sheet_index = self.cur_sheet_index;
        self.style_region = CellRange {
            first: CellAddress {
                sheet: sheet_index,
                row: attr_i32(attrs, &self.tokens, "startRow").unwrap_or(0),
                column: attr_i32(attrs, &self.tokens, "startCol").unwrap_or(0),
            },
            last: CellAddress {
                sheet: sheet_index,
                row: attr_i32(attrs, &self.tokens, "endRow").unwrap_or(0),
                column: attr_i32(attrs, &self.tokens, "endCol").unwrap_or(0),
            },
        };
        self.cur_xf = self.factory().styles().and_then(|s| s.start_xf(XfCategory::Cell));
        self.cur_fill = self.factory().styles().and_then(|s| s.start_fill_style());
        self.cur_fill_set = false;
    }

    fn start_style(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(xf) = &mut self.cur_xf else { return };
        if let Some(h) = attr_str(attrs, &self.tokens, "HAlign") {
            xf.set_horizontal_alignment(parse_hor_align(h));
        }
        if let Some(v) = attr_str(attrs, &self.tokens, "VAlign") {
            xf.set_vertical_alignment(parse_ver_align(v));
        }
        if attr_bool(attrs, &self.tokens, "WrapText") {
            xf.set_wrap_text(true);
        }
        xf.set_apply_alignment(true);

        if let (Some(fill), Some(fg)) = (&mut self.cur_fill, attr_str(attrs, &self.tokens, "Fore").and_then(parse_gnumeric_rgb)) {
            fill.set_fg_color(fg);
            self.cur_fill_set = true;
        }
        if let (Some(fill), Some(bg)) = (&mut self.cur_fill, attr_str(attrs, &self.tokens, "Back").and_then(parse_gnumeric_rgb)) {
            fill.set_bg_color(bg);
            self.cur_fill_set = true;
        }
    }

    fn start_font(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_xf.is_none() {
            return;
        }
        let Some(mut font) = self.factory().styles().and_then(|s| s.start_font_style()) else { return };
        if let Some(sz) = attr_f64(attrs, &self.tokens, "Unit") {
            font.set_size(sz);
        }
        if attr_bool(attrs, &self.tokens, "Bold") {
            font.set_bold(true);
        }
        if attr_bool(attrs, &self.tokens, "Italic") {
            font.set_italic(true);
        }
        if let Some(u) = attr_i32(attrs, &self.tokens, "Underline") {
            font.set_underline(u != 0);
        }
        let id = font.commit();
        if let Some(xf) = &mut self.cur_xf {
            xf.set_font(id);
        }
    }

    fn end_style_region(&mut self) {
        if let Some(fill) = self.cur_fill.take() {
            let fill_id = fill.commit();
            if self.cur_fill_set {
                if let Some(xf) = &mut self.cur_xf {
                    xf.set_fill(fill_id);
                }
            }
        }
        let Some(xf) = self.cur_xf.take() else { return };
        let xf_id = xf.commit();
        let region = self.style_region;
        let sheet_index = self.cur_sheet_index;
        if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
            sheet.set_format_range(region, xf_id);
        }
    }
}

impl Context for WorkbookContext {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn create_child_context(&mut self, _name: ElementName) -> Option<Box<dyn Context>> {
        None
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "Sheet") {
            self.start_sheet();
        } else if t == tok(&self.tokens, "Cell") {
            self.start_cell(attrs);
        } else if t == tok(&self.tokens, "ColInfo") {
            self.start_col_info(attrs);
        } else if t == tok(&self.tokens, "RowInfo") {
            self.start_row_info(attrs);
        } else if t == tok(&self.tokens, "Merge") {
            self.in_merge = true;
            self.merge_text.clear();
        } else if t == tok(&self.tokens, "Filter") {
            self.start_filter(attrs);
        } else if t == tok(&self.tokens, "Field") {
            self.start_field(attrs);
        } else if t == tok(&self.tokens, "StyleRegion") {
            self.start_style_region(attrs);
        } else if t == tok(&self.tokens, "Style") {
            self.start_style(attrs);
        } else if t == tok(&self.tokens, "Font") {
            self.start_font(attrs);
        } else if t == tok(&self.tokens, "name") {
            self.cur_name_text.clear();
        } else if t == tok(&self.tokens, "value") {
            self.cur_name_value.clear();
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "Cell") {
            self.end_cell();
        } else if t == tok(&self.tokens, "Merge") {
            self.end_merge();
        } else if t == tok(&self.tokens, "Name") {
            self.end_name_value();
        } else if t == tok(&self.tokens, "Filter") {
            self.end_filter();
        } else if t == tok(&self.tokens, "StyleRegion") {
            self.end_style_region();
        }
        false
    }

    fn characters(&mut self, value: StrView<'_>, _transient: bool) {
        let text = value.as_str().unwrap_or("");
        if self.in_cell {
            self.cell_text.push_str(text);
        } else if self.in_merge {
            self.merge_text.push_str(text);
        }
    }
}

fn parse_hor_align(text: &str) -> HorizontalAlignment {
    match text {
        "GNM_HALIGN_LEFT" => HorizontalAlignment::Left,
        "GNM_HALIGN_CENTER" => HorizontalAlignment::Center,
        "GNM_HALIGN_RIGHT" => HorizontalAlignment::Right,
        "GNM_HALIGN_JUSTIFY" => HorizontalAlignment::Justify,
        "GNM_HALIGN_DISTRIBUTED" => HorizontalAlignment::Distributed,
        _ => HorizontalAlignment::Unset,
    }
}

fn parse_ver_align(text: &str) -> VerticalAlignment {
    match text {
        "GNM_VALIGN_TOP" => VerticalAlignment::Top,
        "GNM_VALIGN_CENTER" => VerticalAlignment::Center,
        "GNM_VALIGN_BOTTOM" => VerticalAlignment::Bottom,
        "GNM_VALIGN_JUSTIFY" => VerticalAlignment::Justify,
        "GNM_VALIGN_DISTRIBUTED" => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Unset,
    }
}

/// Gnumeric colors are `"RRRR:GGGG:BBBB"`, 16-bit channels; keep only the
/// high byte of each the way an 8-bit ARGB consumer expects.
fn parse_gnumeric_rgb(text: &str) -> Option<Argb> {
    let mut parts = text.split(':');
    let r = u16::from_str_radix(parts.next()?, 16).ok()?;
    let g = u16::from_str_radix(parts.next()?, 16).ok()?;
    let b = u16::from_str_radix(parts.next()?, 16).ok()?;
    Some(Argb::new(0xFF, (r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordedSheet {
        values: Vec<(i32, i32, f64)>,
        strings: Vec<(i32, i32, u32)>,
        bools: Vec<(i32, i32, bool)>,
        merges: Vec<CellRange>,
        formats: Vec<(CellRange, u32)>,
    }

    impl Sheet for RecordedSheet {
        fn set_value(&mut self, row: i32, column: i32, value: f64) {
            self.values.push((row, column, value));
        }
        fn set_string(&mut self, row: i32, column: i32, string_id: u32) {
            self.strings.push((row, column, string_id));
        }
        fn set_bool(&mut self, row: i32, column: i32, value: bool) {
            self.bools.push((row, column, value));
        }
        fn set_format_range(&mut self, range: CellRange, xf_id: u32) {
            self.formats.push((range, xf_id));
        }
        fn sheet_properties(&mut self) -> Option<&mut dyn SheetProperties> {
            Some(self)
        }
        fn start_auto_filter(&mut self, _range: CellRange) -> Option<Box<dyn AutoFilter>> {
            Some(Box::new(NullAutoFilter))
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
        formula: String,
    }
    impl ArrayFormula for RecordedArrayFormula {
        fn set_formula(&mut self, _grammar: FormulaGrammar, text: &str) {
            self.formula = text.to_string();
        }
        fn commit(self: Box<Self>) {}
    }

    struct NullAutoFilter;
    impl AutoFilter for NullAutoFilter {
        fn start_node(&mut self, connector: FilterConnector) -> Box<dyn FilterNode> {
            Box::new(NullFilterNode(connector))
        }
        fn start_column(&mut self, _column: i32, connector: FilterConnector) -> Box<dyn FilterNode> {
            Box::new(NullFilterNode(connector))
        }
        fn commit(self: Box<Self>) {}
    }

    struct NullFilterNode(FilterConnector);
    impl FilterNode for NullFilterNode {
        fn append_item(&mut self, field: i32, op: FilterOperator, value: FilterValue) {
            ITEMS.with(|cell| cell.borrow_mut().push((field, op, value)));
        }
        fn start_node(&mut self, connector: FilterConnector) -> Box<dyn FilterNode> {
            Box::new(NullFilterNode(connector))
        }
        fn commit(self: Box<Self>) {}
    }

    thread_local! {
        static ITEMS: std::cell::RefCell<Vec<(i32, FilterOperator, FilterValue)>> = std::cell::RefCell::new(Vec::new());
    }

    #[derive(Default)]
    struct RecordedStrings {
        values: Vec<String>,
    }
    impl SharedStrings for RecordedStrings {
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
        fn shared_strings(&mut self) -> Option<&mut dyn SharedStrings> {
            Some(&mut self.shared)
        }
    }

    #[test]
    fn value_string_and_bool_cells_land_on_the_right_sheet() {
        let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:Cells>
    <gnm:Cell gnm:Row="0" gnm:Col="0" gnm:ValueType="40">12.5</gnm:Cell>
    <gnm:Cell gnm:Row="0" gnm:Col="1" gnm:ValueType="60">hello</gnm:Cell>
    <gnm:Cell gnm:Row="0" gnm:Col="2" gnm:ValueType="20">TRUE</gnm:Cell>
   </gnm:Cells>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert_eq!(factory.sheets[0].values, vec![(0, 0, 12.5)]);
        assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
        assert_eq!(factory.sheets[0].bools, vec![(0, 2, true)]);
    }

    #[test]
    fn formula_cell_strips_the_leading_equals_sign() {
        let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:Cells>
    <gnm:Cell gnm:Row="0" gnm:Col="0">=A1+A2</gnm:Cell>
   </gnm:Cells>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert!(factory.sheets[0].values.is_empty());
    }

    #[test]
    fn array_formula_does_not_fan_out_result_values() {
        let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:Cells>
    <gnm:Cell gnm:Row="0" gnm:Col="0" gnm:Rows="2" gnm:Cols="2">=SUM(A1:B2)</gnm:Cell>
   </gnm:Cells>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert!(factory.sheets[0].values.is_empty());
    }

    #[test]
    fn merged_region_is_parsed_into_a_cell_range() {
        let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:MergedRegions>
    <gnm:Merge>A1:B2</gnm:Merge>
   </gnm:MergedRegions>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert_eq!(factory.sheets[0].merges.len(), 1);
    }

    #[test]
    fn filter_swaps_value_and_value_type_attributes() {
        let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:Filters>
    <gnm:Filter gnm:Area="A1:B5">
     <gnm:Field gnm:Index="0" gnm:Type="expr" gnm:Op0="eq" gnm:Value0="40" gnm:ValueType0="3.5"/>
    </gnm:Filter>
   </gnm:Filters>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
        let mut factory = RecordedFactory::default();
        ITEMS.with(|cell| cell.borrow_mut().clear());
        import(xml, &mut factory).unwrap();
        ITEMS.with(|cell| {
            let items = cell.borrow();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0], (0, FilterOperator::Equal, FilterValue::Numeric(3.5)));
        });
    }
}
