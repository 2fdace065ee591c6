//! `xl/worksheets/sheet*.xml` handler (spec §4.10 "xlsx"), grounded on
//! `xlsx_sheet_context.{hpp,cpp}`'s row/cell/formula/pane/filter handling.
//!
//! Cell dispatch follows the `t` attribute ("s" shared string, "b" bool,
//! "e" error, "str" cached formula-string result, otherwise numeric).
//! Array formulas fan out across every cell in their `ref` range as one
//! `ArrayFormula::set_result_value` call per offset (spec §8 invariant 8);
//! only the range's top-left cell carries the `<f t="array">` element, so
//! every other cell in an active range is routed to the array builder
//! instead of `Sheet::set_value`/`set_string` before falling through to
//! the plain-cell path.
//!
//! The local `s` (style) index on a cell/row/column is relative to this
//! part's own `xl/styles.xml`; callers must remap it through the
//! [`super::styles::XlsxStyleIds`] returned by `parse_styles` before it
//! reaches [`Sheet::set_format`].

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::formats::cell_ref::{parse_cell_ref, parse_range_ref};
use crate::import::auto_filter::FilterNode;
use crate::import::formula::Formula;
use crate::import::sheet::{Sheet, Table};
use crate::import::types::{FilterConnector, FilterOperator, FilterValue};
use crate::import::ImportFactory;
use crate::strings::StrView;
use crate::types::{CellAddress, CellRange, FormulaGrammar, ResultValue};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};

const ELEMENTS: &[&str] = &[
    "worksheet",
    "sheetData",
    "row",
    "c",
    "f",
    "v",
    "is",
    "t",
    "mergeCells",
    "mergeCell",
    "cols",
    "col",
    "sheetViews",
    "sheetView",
    "pane",
    "selection",
    "autoFilter",
    "filterColumn",
    "filters",
    "filter",
    "customFilters",
    "customFilter",
    "conditionalFormatting",
    "cfRule",
    "formula",
    "tableParts",
    "tablePart",
    "ref",
    "r",
    "min",
    "max",
    "width",
    "hidden",
    "customWidth",
    "ht",
    "customHeight",
    "activeCell",
    "sqref",
    "xSplit",
    "ySplit",
    "topLeftCell",
    "state",
    "s",
    "si",
    "colId",
    "val",
    "operator",
    "and",
    "type",
    "dxfId",
    "id",
];

pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

/// Parses one worksheet part. `sst` maps a `t="s"` cell's shared-string
/// index to the id committed by [`super::shared_strings::parse_shared_strings`].
/// Returns the `r:id` values of any `<tableParts><tablePart r:id=".."/>`
/// children, for the caller to resolve against the part's own rels file.
pub fn parse_sheet(
    xml: &[u8],
    factory: &mut dyn ImportFactory,
    sheet_index: i32,
    cell_xfs: &[u32],
    dxfs: &[u32],
    sst: &[u32],
) -> Result<Vec<String>> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_tokens();
    let mut ctx = SheetContext::new(factory, &tokens, sheet_index, cell_xfs, dxfs, sst);
    {
        let mut stack = crate::context::ContextStack::new(Box::new(SheetRoot { inner: &mut ctx }));
        sax::parse(xml, &mut repo, &tokens, &mut stack)?;
        stack.into_root();
    }
    Ok(ctx.table_rids)
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

fn attr_u32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<u32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<u32>().ok())
}

fn attr_bool(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> bool {
    matches!(attr_str(attrs, tokens, name), Some("1") | Some("true"))
}

fn range_from_text(text: &str, sheet: i32) -> Option<CellRange> {
    let ((fc, fr), (lc, lr)) = parse_range_ref(text)?;
    Some(CellRange::new(CellAddress::new(sheet, fr, fc), CellAddress::new(sheet, lr, lc)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellValueType {
    Number,
    Bool,
    Error,
    InlineStr,
    SharedString,
    FormulaString,
}

fn classify_cell_type(t: Option<&str>) -> CellValueType {
    match t {
        Some("s") => CellValueType::SharedString,
        Some("b") => CellValueType::Bool,
        Some("e") => CellValueType::Error,
        Some("str") => CellValueType::FormulaString,
        Some("inlineStr") => CellValueType::InlineStr,
        _ => CellValueType::Number,
    }
}

fn classify_result(cell_type: CellValueType, text: &str) -> ResultValue {
    match cell_type {
        CellValueType::Bool => ResultValue::Bool(text.trim() == "1"),
        CellValueType::Error => ResultValue::Error(text.trim().to_string()),
        CellValueType::FormulaString | CellValueType::InlineStr => ResultValue::String(text.to_string()),
        CellValueType::SharedString => ResultValue::Empty,
        CellValueType::Number => match text.trim().parse::<f64>() {
            Ok(v) => ResultValue::Value(v),
            Err(_) => ResultValue::Empty,
        },
    }
}

fn apply_formula_result(f: &mut dyn Formula, cell_type: CellValueType, text: &str) {
    match cell_type {
        CellValueType::Number => {
            if let Ok(v) = text.trim().parse::<f64>() {
                f.set_result_value(v);
            }
        }
        CellValueType::Bool => f.set_result_bool(text.trim() == "1"),
        CellValueType::Error | CellValueType::FormulaString | CellValueType::InlineStr => {
            f.set_result_string(text.trim())
        }
        CellValueType::SharedString => {}
    }
}

fn parse_filter_operator(text: &str) -> FilterOperator {
    match text {
        "notEqual" => FilterOperator::NotEqual,
        "greaterThan" => FilterOperator::Greater,
        "greaterThanOrEqual" => FilterOperator::GreaterEqual,
        "lessThan" => FilterOperator::Less,
        "lessThanOrEqual" => FilterOperator::LessEqual,
        _ => FilterOperator::Equal,
    }
}

fn classify_filter_value(text: &str) -> FilterValue {
    if text.is_empty() {
        FilterValue::Empty
    } else if let Ok(v) = text.parse::<f64>() {
        FilterValue::Numeric(v)
    } else {
        FilterValue::Text(text.to_string())
    }
}

/// Attributes captured from an in-progress `<f>` element, applied once
/// the enclosing `<c>` closes.
struct FormulaAttrs {
    kind: Option<String>,
    ref_range: Option<String>,
    si: Option<u32>,
    text: String,
}

struct ArrayState {
    range: CellRange,
    builder: Box<dyn crate::import::formula::ArrayFormula>,
    filled: i32,
    total: i32,
}

struct SheetContext<'a> {
    factory: &'a mut dyn ImportFactory,
    tokens: &'a TokenMap,
    sheet_index: i32,
    cell_xfs: &'a [u32],
    dxfs: &'a [u32],
    sst: &'a [u32],
    table_rids: Vec<String>,

    cur_row: i32,
    cur_col: i32,

    cell_row: i32,
    cell_col: i32,
    cell_type: CellValueType,
    cell_style: Option<u32>,
    value_text: String,
    in_v: bool,
    in_is_t: bool,

    in_f: bool,
    formula_attrs: Option<FormulaAttrs>,

    array_state: Option<ArrayState>,

    in_pane: bool,
    pane_x: f64,
    pane_y: f64,
    pane_top_left: Option<(i32, i32)>,
    pane_state: String,

    auto_filter_range: Option<CellRange>,
    filter: Option<Box<dyn crate::import::auto_filter::AutoFilter>>,
    filter_node_stack: Vec<Box<dyn FilterNode>>,
    cur_filter_column: i32,

    cf_sqref: Option<CellRange>,
    cf: Option<Box<dyn crate::import::sheet::ConditionalFormat>>,
    in_cf_formula: bool,
    cf_formula_text: String,
}

impl<'a> SheetContext<'a> {
    fn new(
        factory: &'a mut dyn ImportFactory,
        tokens: &'a TokenMap,
        sheet_index: i32,
        cell_xfs: &'a [u32],
        dxfs: &'a [u32],
        sst: &'a [u32],
    ) -> Self {
        SheetContext {
            factory,
            tokens,
            sheet_index,
            cell_xfs,
            dxfs,
            sst,
            table_rids: Vec::new(),
            cur_row: 0,
            cur_col: 0,
            cell_row: 0,
            cell_col: 0,
            cell_type: CellValueType::Number,
            cell_style: None,
            value_text: String::new(),
            in_v: false,
            in_is_t: false,
            in_f: false,
            formula_attrs: None,
            array_state: None,
            in_pane: false,
            pane_x: 0.0,
            pane_y: 0.0,
            pane_top_left: None,
            pane_state: String::new(),
            auto_filter_range: None,
            filter: None,
            filter_node_stack: Vec::new(),
            cur_filter_column: 0,
            cf_sqref: None,
            cf: None,
            in_cf_formula: false,
            cf_formula_text: String::new(),
        }
    }

    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "row") {
            self.cur_col = 0;
            if let Some(r) = attr_i32(attrs, self.tokens, "r") {
                self.cur_row = r - 1;
            }
            let row = self.cur_row;
            let hidden = attr_bool(attrs, self.tokens, "hidden");
            let custom_height = attr_bool(attrs, self.tokens, "customHeight");
            let height = attr_f64(attrs, self.tokens, "ht");
            if let Some(props) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.sheet_properties()) {
                if hidden {
                    props.set_row_hidden(row, true);
                }
                if custom_height {
                    if let Some(h) = height {
                        props.set_row_height(row, h);
                    }
                }
            }
        } else if t == tok(self.tokens, "col") {
            let min = attr_i32(attrs, self.tokens, "min").unwrap_or(1) - 1;
            let max = attr_i32(attrs, self.tokens, "max").unwrap_or(min + 1);
            let span = (max - min).max(1);
            let hidden = attr_bool(attrs, self.tokens, "hidden");
            let custom_width = attr_bool(attrs, self.tokens, "customWidth");
            let width = attr_f64(attrs, self.tokens, "width");
            if let Some(props) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.sheet_properties()) {
                if custom_width {
                    if let Some(w) = width {
                        props.set_column_width(min, span, w);
                    }
                }
                if hidden {
                    props.set_column_hidden(min, span, true);
                }
            }
        } else if t == tok(self.tokens, "c") {
            self.cell_type = classify_cell_type(attr_str(attrs, self.tokens, "t"));
            self.cell_style = attr_u32(attrs, self.tokens, "s");
            self.value_text.clear();
            self.in_v = false;
            self.in_is_t = false;
            self.formula_attrs = None;
            self.in_f = false;
            match attr_str(attrs, self.tokens, "r").and_then(parse_cell_ref) {
                Some((col, row)) => {
                    self.cell_col = col;
                    self.cell_row = row;
                }
                None => {
                    self.cell_col = self.cur_col;
                    self.cell_row = self.cur_row;
                }
            }
        } else if t == tok(self.tokens, "f") {
            self.in_f = true;
            self.formula_attrs = Some(FormulaAttrs {
                kind: attr_str(attrs, self.tokens, "t").map(str::to_string),
                ref_range: attr_str(attrs, self.tokens, "ref").map(str::to_string),
                si: attr_u32(attrs, self.tokens, "si"),
                text: String::new(),
            });
        } else if t == tok(self.tokens, "v") {
            self.in_v = true;
            self.value_text.clear();
        } else if t == tok(self.tokens, "is") {
            self.value_text.clear();
        } else if t == tok(self.tokens, "t") && !self.in_f {
            self.in_is_t = true;
        } else if t == tok(self.tokens, "mergeCell") {
            if let Some(range) = attr_str(attrs, self.tokens, "ref").and_then(|s| range_from_text(s, self.sheet_index)) {
                if let Some(props) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.sheet_properties()) {
                    props.set_merge_cell_range(range);
                }
            }
        } else if t == tok(self.tokens, "pane") {
            self.in_pane = true;
            self.pane_x = attr_f64(attrs, self.tokens, "xSplit").unwrap_or(0.0);
            self.pane_y = attr_f64(attrs, self.tokens, "ySplit").unwrap_or(0.0);
            self.pane_top_left = attr_str(attrs, self.tokens, "topLeftCell").and_then(parse_cell_ref);
            self.pane_state = attr_str(attrs, self.tokens, "state").unwrap_or("split").to_string();
        } else if t == tok(self.tokens, "selection") {
            let active = attr_str(attrs, self.tokens, "activeCell").and_then(parse_cell_ref);
            let sqref = attr_str(attrs, self.tokens, "sqref").and_then(|s| s.split_whitespace().next());
            let range = sqref.and_then(|s| range_from_text(s, self.sheet_index));
            if let Some(view) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.sheet_view()) {
                if let Some((col, row)) = active {
                    view.set_active_cell(row, col);
                }
                if let Some(range) = range {
                    view.set_selected_range(range);
                }
            }
        } else if t == tok(self.tokens, "autoFilter") {
            self.auto_filter_range = attr_str(attrs, self.tokens, "ref").and_then(|s| range_from_text(s, self.sheet_index));
            if let Some(range) = self.auto_filter_range {
                self.filter = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.start_auto_filter(range));
            }
        } else if t == tok(self.tokens, "filterColumn") {
            self.cur_filter_column = attr_i32(attrs, self.tokens, "colId").unwrap_or(0);
            if let Some(filter) = &mut self.filter {
                let node = filter.start_column(self.cur_filter_column, FilterConnector::And);
                self.filter_node_stack.push(node);
            }
        } else if t == tok(self.tokens, "filters") {
            if let Some(top) = self.filter_node_stack.last_mut() {
                let child = top.start_node(FilterConnector::Or);
                self.filter_node_stack.push(child);
            }
        } else if t == tok(self.tokens, "filter") {
            let value = classify_filter_value(attr_str(attrs, self.tokens, "val").unwrap_or(""));
            let column = self.cur_filter_column;
            if let Some(top) = self.filter_node_stack.last_mut() {
                top.append_item(column, FilterOperator::Equal, value);
            }
        } else if t == tok(self.tokens, "customFilters") {
            let connector = if attr_bool(attrs, self.tokens, "and") { FilterConnector::And } else { FilterConnector::Or };
            if let Some(top) = self.filter_node_stack.last_mut() {
                let child = top.start_node(connector);
                self.filter_node_stack.push(child);
            }
        } else if t == tok(self.tokens, "customFilter") {
            let op = parse_filter_operator(attr_str(attrs, self.tokens, "operator").unwrap_or("equal"));
            let value = classify_filter_value(attr_str(attrs, self.tokens, "val").unwrap_or(""));
            let column = self.cur_filter_column;
            if let Some(top) = self.filter_node_stack.last_mut() {
                top.append_item(column, op, value);
            }
        } else if t == tok(self.tokens, "conditionalFormatting") {
            self.cf_sqref = attr_str(attrs, self.tokens, "sqref").and_then(|s| range_from_text(s, self.sheet_index));
        } else if t == tok(self.tokens, "cfRule") {
            let mut cf = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.start_conditional_format());
            if let Some(cf) = &mut cf {
                if let Some(range) = self.cf_sqref {
                    cf.set_range(range);
                }
                if let Some(ty) = attr_str(attrs, self.tokens, "type") {
                    cf.set_type(ty);
                }
                if let Some(dxf_id) = attr_u32(attrs, self.tokens, "dxfId") {
                    if let Some(&xf) = self.dxfs.get(dxf_id as usize) {
                        cf.set_xf(xf);
                    }
                }
            }
            self.cf = cf;
        } else if t == tok(self.tokens, "formula") {
            self.in_cf_formula = true;
            self.cf_formula_text.clear();
        } else if t == tok(self.tokens, "tablePart") {
            if let Some(rid) = attr_str(attrs, self.tokens, "id") {
                self.table_rids.push(rid.to_string());
            }
        }
    }

    fn end(&mut self, name: ElementName) {
        let t = name.token;
        if t == tok(self.tokens, "v") {
            self.in_v = false;
        } else if t == tok(self.tokens, "t") {
            self.in_is_t = false;
        } else if t == tok(self.tokens, "f") {
            self.in_f = false;
        } else if t == tok(self.tokens, "c") {
            self.end_cell();
        } else if t == tok(self.tokens, "pane") {
            self.in_pane = false;
            let (x, y, top_left, state) =
                (self.pane_x, self.pane_y, self.pane_top_left.unwrap_or((0, 0)), self.pane_state.clone());
            if let Some(view) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.sheet_view()) {
                if state.starts_with("frozen") {
                    view.set_frozen_pane(x as i32, y as i32, top_left.1, top_left.0);
                } else {
                    view.set_split_pane(x, y, top_left.1, top_left.0);
                }
            }
        } else if t == tok(self.tokens, "filters") || t == tok(self.tokens, "customFilters") || t == tok(self.tokens, "filterColumn") {
            if let Some(node) = self.filter_node_stack.pop() {
                node.commit();
            }
        } else if t == tok(self.tokens, "autoFilter") {
            if let Some(filter) = self.filter.take() {
                filter.commit();
            }
        } else if t == tok(self.tokens, "formula") {
            self.in_cf_formula = false;
            if let Some(cf) = &mut self.cf {
                cf.set_formula(&self.cf_formula_text);
            }
        } else if t == tok(self.tokens, "cfRule") {
            if let Some(cf) = self.cf.take() {
                cf.commit();
            }
        }
    }

    fn characters(&mut self, value: StrView<'_>) {
        let text = value.as_str().unwrap_or("");
        if self.in_v || self.in_is_t {
            self.value_text.push_str(text);
        } else if self.in_f {
            if let Some(f) = &mut self.formula_attrs {
                f.text.push_str(text);
            }
        } else if self.in_cf_formula {
            self.cf_formula_text.push_str(text);
        }
    }

    fn end_cell(&mut self) {
        let row = self.cell_row;
        let col = self.cell_col;
        let cell_type = self.cell_type;
        let value_text = std::mem::take(&mut self.value_text);
        let formula = self.formula_attrs.take();
        let style_local = self.cell_style;

        if let Some(local) = style_local {
            if let Some(&xf) = self.cell_xfs.get(local as usize) {
                if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                    sheet.set_format(row, col, xf);
                }
            }
        }

        if let Some(formula) = formula {
            match formula.kind.as_deref() {
                Some("array") => {
                    self.start_array_formula(row, col, &formula);
                    self.feed_array_if_active(row, col, cell_type, &value_text);
                }
                Some("shared") => {
                    if !self.feed_array_if_active(row, col, cell_type, &value_text) {
                        self.handle_shared_formula(row, col, cell_type, &value_text, &formula);
                    }
                }
                _ => {
                    if !self.feed_array_if_active(row, col, cell_type, &value_text) {
                        self.handle_normal_formula(row, col, cell_type, &value_text, &formula);
                    }
                }
            }
            self.cur_col = col + 1;
            return;
        }

        if self.feed_array_if_active(row, col, cell_type, &value_text) {
            self.cur_col = col + 1;
            return;
        }

        self.handle_plain_value(row, col, cell_type, &value_text);
        self.cur_col = col + 1;
    }

    fn start_array_formula(&mut self, row: i32, col: i32, formula: &FormulaAttrs) {
        let Some(range_text) = &formula.ref_range else { return };
        let Some(range) = range_from_text(range_text, self.sheet_index) else { return };
        let Some(mut builder) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.start_array_formula()) else {
            return;
        };
        builder.set_range(range);
        builder.set_formula(FormulaGrammar::Xlsx, &formula.text);
        let total = range.row_span() * range.column_span();
        self.array_state = Some(ArrayState { range, builder, filled: 0, total });
        let _ = (row, col);
    }

    /// If an array formula is in progress and `(row, col)` falls within
    /// its range, records the cell's value there and commits once every
    /// offset has been filled. Returns whether the cell was consumed.
    fn feed_array_if_active(&mut self, row: i32, col: i32, cell_type: CellValueType, text: &str) -> bool {
        let in_range = match &self.array_state {
            Some(state) => state.range.contains(row, col),
            None => false,
        };
        if !in_range {
            return false;
        }
        let value = classify_result(cell_type, text);
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

    fn handle_shared_formula(&mut self, row: i32, col: i32, cell_type: CellValueType, text: &str, formula: &FormulaAttrs) {
        let Some(mut f) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.start_formula()) else {
            return;
        };
        f.set_position(row, col);
        if let Some(si) = formula.si {
            f.set_shared_formula_index(si);
        }
        if !formula.text.is_empty() {
            f.set_formula(FormulaGrammar::Xlsx, &formula.text);
        }
        apply_formula_result(f.as_mut(), cell_type, text);
        f.commit();
    }

    fn handle_normal_formula(&mut self, row: i32, col: i32, cell_type: CellValueType, text: &str, formula: &FormulaAttrs) {
        let Some(mut f) = self.factory.sheet_by_index(self.sheet_index).and_then(|s| s.start_formula()) else {
            return;
        };
        f.set_position(row, col);
        f.set_formula(FormulaGrammar::Xlsx, &formula.text);
        apply_formula_result(f.as_mut(), cell_type, text);
        f.commit();
    }

    fn handle_plain_value(&mut self, row: i32, col: i32, cell_type: CellValueType, text: &str) {
        match cell_type {
            CellValueType::SharedString => {
                if let Some(id) = text.trim().parse::<usize>().ok().and_then(|idx| self.sst.get(idx)) {
                    let id = *id;
                    if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                        sheet.set_string(row, col, id);
                    }
                }
            }
            CellValueType::InlineStr => {
                if !text.is_empty() {
                    let id = self.factory.shared_strings().map(|s| s.add(text));
                    if let Some(id) = id {
                        if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                            sheet.set_string(row, col, id);
                        }
                    }
                }
            }
            CellValueType::Bool => {
                if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                    sheet.set_bool(row, col, text.trim() == "1");
                }
            }
            CellValueType::Error => {
                if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                    sheet.set_auto(row, col, text.trim());
                }
            }
            CellValueType::FormulaString => {
                if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                    sheet.set_auto(row, col, text);
                }
            }
            CellValueType::Number => {
                if !text.trim().is_empty() {
                    if let Ok(v) = text.trim().parse::<f64>() {
                        if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                            sheet.set_value(row, col, v);
                        }
                    } else if let Some(sheet) = self.factory.sheet_by_index(self.sheet_index) {
                        sheet.set_auto(row, col, text);
                    }
                }
            }
        }
    }
}

struct SheetRoot<'a, 'b> {
    inner: &'a mut SheetContext<'b>,
}

impl<'a, 'b> Context for SheetRoot<'a, 'b> {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        self.inner.start(name, attrs);
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        self.inner.end(name);
        false
    }

    fn characters(&mut self, value: StrView<'_>, _transient: bool) {
        self.inner.characters(value);
    }
}

const TABLE_ELEMENTS: &[&str] = &["table", "tableColumns", "tableColumn", "name", "ref", "displayName"];

fn build_table_tokens() -> TokenMap {
    TokenMap::new(TABLE_ELEMENTS)
}

/// Parses a `xl/tables/table*.xml` part referenced by a worksheet's
/// `<tableParts>` list, driving the already-open sheet's [`Table`]
/// builder directly (no `ImportFactory` round-trip needed: the table is
/// always scoped to the sheet that referenced it).
pub fn parse_table(xml: &[u8], sheet: &mut dyn Sheet, sheet_index: i32) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_table_tokens();
    let Some(builder) = sheet.start_table() else { return Ok(()) };
    let mut ctx = TableContext { tokens: &tokens, table: Some(builder), column_index: 0, sheet_index };
    {
        let mut stack = crate::context::ContextStack::new(Box::new(TableRoot { inner: &mut ctx }));
        sax::parse(xml, &mut repo, &tokens, &mut stack)?;
        stack.into_root();
    }
    if let Some(table) = ctx.table.take() {
        table.commit();
    }
    Ok(())
}

struct TableContext<'a> {
    tokens: &'a TokenMap,
    table: Option<Box<dyn Table>>,
    column_index: u32,
    sheet_index: i32,
}

impl<'a> TableContext<'a> {
    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "table") {
            if let Some(table) = &mut self.table {
                if let Some(name) = attr_str(attrs, self.tokens, "displayName").or_else(|| attr_str(attrs, self.tokens, "name")) {
                    table.set_name(name);
                }
                if let Some(range) = attr_str(attrs, self.tokens, "ref").and_then(|s| range_from_text(s, self.sheet_index)) {
                    table.set_range(range);
                }
            }
        } else if t == tok(self.tokens, "tableColumn") {
            if let Some(table) = &mut self.table {
                let name = attr_str(attrs, self.tokens, "name").unwrap_or("");
                table.set_column(self.column_index, name);
                self.column_index += 1;
            }
        }
    }
}

struct TableRoot<'a, 'b> {
    inner: &'a mut TableContext<'b>,
}

impl<'a, 'b> Context for TableRoot<'a, 'b> {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        self.inner.start(name, attrs);
    }

    fn end_element(&mut self, _name: ElementName) -> bool {
        false
    }

    fn characters(&mut self, _value: StrView<'_>, _transient: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::formula::ArrayFormula;
    use crate::import::sheet::SheetProperties;

    #[derive(Default)]
    struct RecordedSheet {
        values: Vec<(i32, i32, f64)>,
        strings: Vec<(i32, i32, u32)>,
        formats: Vec<(i32, i32, u32)>,
        merges: Vec<CellRange>,
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
            Some(Box::new(RecordedArray { sheet: self as *mut RecordedSheet, results: Vec::new() }))
        }
    }

    impl SheetProperties for RecordedSheet {
        fn set_merge_cell_range(&mut self, range: CellRange) {
            self.merges.push(range);
        }
    }

    struct RecordedArray {
        sheet: *mut RecordedSheet,
        results: Vec<(i32, i32, ResultValue)>,
    }

    impl ArrayFormula for RecordedArray {
        fn set_result_value(&mut self, row_offset: i32, column_offset: i32, value: &ResultValue) {
            self.results.push((row_offset, column_offset, value.clone()));
        }
        fn commit(self: Box<Self>) {
            let sheet = unsafe { &mut *self.sheet };
            for (ro, co, value) in &self.results {
                if let ResultValue::Value(v) = value {
                    sheet.set_value(*ro, *co, *v);
                }
            }
        }
    }

    #[derive(Default)]
    struct StubFactory {
        sheet: RecordedSheet,
    }

    impl ImportFactory for StubFactory {
        fn sheet_by_index(&mut self, _index: i32) -> Option<&mut dyn Sheet> {
            Some(&mut self.sheet)
        }
    }

    #[test]
    fn plain_numeric_and_string_cells_are_dispatched() {
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>42</v></c><c r="B1" t="s"><v>0</v></c></row>
        </sheetData></worksheet>"#;
        let mut factory = StubFactory::default();
        let sst = vec![7u32];
        parse_sheet(xml, &mut factory, 0, &[], &[], &sst).unwrap();
        assert_eq!(factory.sheet.values, vec![(0, 0, 42.0)]);
        assert_eq!(factory.sheet.strings, vec![(0, 1, 7)]);
    }

    #[test]
    fn merge_cell_range_is_recorded() {
        let xml = br#"<worksheet><mergeCells><mergeCell ref="A1:B2"/></mergeCells></worksheet>"#;
        let mut factory = StubFactory::default();
        parse_sheet(xml, &mut factory, 2, &[], &[], &[]).unwrap();
        assert_eq!(
            factory.sheet.merges,
            vec![CellRange::new(CellAddress::new(2, 0, 0), CellAddress::new(2, 1, 1))]
        );
    }

    #[test]
    fn array_formula_fans_out_across_its_range() {
        let xml = br#"<worksheet><sheetData>
            <row r="1">
                <c r="A1"><f t="array" ref="A1:B1">1+1</f><v>2</v></c>
                <c r="B1"><v>4</v></c>
            </row>
        </sheetData></worksheet>"#;
        let mut factory = StubFactory::default();
        parse_sheet(xml, &mut factory, 0, &[], &[], &[]).unwrap();
        assert_eq!(factory.sheet.values, vec![(0, 0, 2.0), (0, 1, 4.0)]);
    }
}
