//! xls-xml format handler (spec §4.10 "xls-xml"), grounded on
//! `xls_xml_context.{hpp,cpp}` and `xls_xml_auto_filter_context.{hpp,cpp}`.
//!
//! xls-xml is a plain (unzipped) XML document, so [`import`] runs the
//! single-threaded SAX parser directly over the caller's bytes through a
//! [`crate::context::ContextStack`] rooted at [`WorkbookContext`].
//!
//! Run-level rich-text formatting (bold/italic/color spans within one
//! `<Data>`) is out of scope: `<Data>` is handled inline by
//! `WorkbookContext` rather than through a dedicated child context the way
//! liborcus's `xls_xml_data_context` has one, and its text content is a
//! plain concatenation of character data. `<x:AutoFilter>` keeps its own
//! child context, [`AutoFilterContext`], since its column/condition/or
//! nesting genuinely needs the stack.
//!
//! `WorkbookContext` stores its `ImportFactory` behind a raw pointer
//! rather than a borrow, mirroring the `mp_factory` raw pointer liborcus's
//! own context classes carry — the `Context` trait's `create_child_context`
//! returns `Box<dyn Context + 'static>`, so a context holding a borrow
//! narrower than `'static` could never be handed back through it. The
//! pointer is valid for exactly the duration of one [`import`] call, which
//! owns the `&mut dyn ImportFactory` it was built from for that entire
//! span.
//!
//! `<WorksheetOptions>` accumulates frozen/split pane state (`FreezePanes`,
//! `FrozenNoSplit`, `SplitHorizontal`/`SplitVertical`,
//! `TopRowBottomPane`/`LeftColumnRightPane`) over its subtree and commits it
//! once on the closing tag, mirroring `commit_split_pane` — including its
//! swapped-axis convention (the schema's "split vertical" feeds
//! `set_split_pane`'s x-position, and vice versa) and its choice to leave
//! `<FreezePanes/>` without a following `<FrozenNoSplit/>` unhandled.
//! `<Panes>`/`<Pane>`/`<Selected>` do not carry per-pane selection cursor
//! state here (`Number`/`ActiveCol`/`ActiveRow`/`RangeSelection` aren't
//! read) — only the tab-active flag that `<Selected/>` itself carries.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::import::{
    AutoFilter, FillStyleBuilder, FilterNode, Formula, FontStyleBuilder, ImportFactory, NamedExpression,
    NumberFormatBuilder, Sheet, SheetProperties, SheetView, SharedStrings, Styles, XfBuilder,
};
use crate::import::types::{Argb, FilterConnector, FilterOperator, FilterValue, HorizontalAlignment, VerticalAlignment, XfCategory};
use crate::strings::StrView;
use crate::types::{CellAddress, CellRange, FormulaGrammar};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};
use std::collections::HashMap;
use std::rc::Rc;

pub const NS_SS: &str = "urn:schemas-microsoft-com:office:spreadsheet";
pub const NS_O: &str = "urn:schemas-microsoft-com:office:office";
pub const NS_X: &str = "urn:schemas-microsoft-com:office:excel";
pub const NS_HTML: &str = "http://www.w3.org/TR/REC-html40";

const ELEMENTS: &[&str] = &[
    "Workbook",
    "Worksheet",
    "Table",
    "Row",
    "Cell",
    "Data",
    "Styles",
    "Style",
    "Font",
    "Interior",
    "Alignment",
    "Borders",
    "Border",
    "NumberFormat",
    "Protection",
    "Names",
    "NamedRange",
    "WorksheetOptions",
    "FreezePanes",
    "FrozenNoSplit",
    "SplitHorizontal",
    "SplitVertical",
    "TopRowBottomPane",
    "LeftColumnRightPane",
    "Selected",
    "Panes",
    "Pane",
    "AutoFilter",
    "AutoFilterColumn",
    "AutoFilterCondition",
    "AutoFilterOr",
    "Index",
    "StyleID",
    "ID",
    "Name",
    "RefersTo",
    "Parent",
    "FontName",
    "Bold",
    "Italic",
    "Color",
    "Size",
    "Pattern",
    "Horizontal",
    "Vertical",
    "WrapText",
    "ShrinkToFit",
    "Type",
    "MergeDown",
    "MergeAcross",
    "Formula",
    "Format",
    "Column",
    "Operator",
    "Value",
];

/// Builds the token map this format's handler code relies on. Exposed so
/// a caller driving `xls_xml`'s contexts directly (e.g. a test harness)
/// can reuse the exact same ids.
pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

/// Parse a complete xls-xml workbook document, driving `factory`.
pub fn import(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    repo.add_predefined_values(&[NS_SS, NS_O, NS_X, NS_HTML]);
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

fn attr_f64(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<f64> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<f64>().ok())
}

fn attr_i32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<i32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<i32>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Unknown,
    String,
    Number,
    DateTime,
    Boolean,
    Error,
}

#[derive(Default)]
struct CellState {
    row: i32,
    col: i32,
    merge_down: i32,
    merge_across: i32,
    formula: Option<String>,
    style_id: Option<String>,
}

/// Root context for a `<Workbook>` document. Handles everything except
/// `<x:AutoFilter>`, which gets a dedicated child context.
struct WorkbookContext {
    factory: *mut dyn ImportFactory,
    tokens: Rc<TokenMap>,

    cur_sheet_index: i32,
    cur_row: i32,
    cur_col: i32,
    cell: CellState,
    cell_type: CellType,
    cell_text: String,

    style_map: HashMap<String, u32>,
    cur_style_id: Option<String>,
    cur_style_xf: Option<Box<dyn XfBuilder>>,

    in_data: bool,
    in_style: bool,

    pane_state: PaneState,
    pane_field: Option<PaneField>,
    pane_text: String,
    split_horizontal: f64,
    split_vertical: f64,
    top_row_bottom_pane: i32,
    left_col_right_pane: i32,
}

/// `<WorksheetOptions>`'s split/freeze state (spec §3 "frozen/split panes
/// and selection"), grounded on `xls_xml_context::split_pane`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PaneState {
    #[default]
    Split,
    Frozen,
    /// `<FreezePanes/>` without a following `<FrozenNoSplit/>`; the
    /// original liborcus handler leaves this case unhandled ("not handled
    /// yet") and so do we.
    FrozenSplit,
}

/// Which `<WorksheetOptions>` text-bearing child is currently accumulating
/// character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaneField {
    SplitHorizontal,
    SplitVertical,
    TopRowBottomPane,
    LeftColumnRightPane,
}

impl WorkbookContext {
    fn new(factory: &mut dyn ImportFactory, tokens: Rc<TokenMap>) -> Self {
        WorkbookContext {
            factory: factory as *mut dyn ImportFactory,
            tokens,
            cur_sheet_index: -1,
            cur_row: 0,
            cur_col: 0,
            cell: CellState::default(),
            cell_type: CellType::Unknown,
            cell_text: String::new(),
            style_map: HashMap::new(),
            cur_style_id: None,
            cur_style_xf: None,
            in_data: false,
            in_style: false,

            pane_state: PaneState::default(),
            pane_field: None,
            pane_text: String::new(),
            split_horizontal: 0.0,
            split_vertical: 0.0,
            top_row_bottom_pane: 0,
            left_col_right_pane: 0,
        }
    }

    /// Safe for the lifetime of one `import()` call; see the module doc
    /// comment for the invariant this pointer relies on.
    fn factory(&mut self) -> &mut dyn ImportFactory {
        unsafe { &mut *self.factory }
    }

    fn start_cell(&mut self, attrs: &[XmlAttribute<'_>]) {
        if let Some(idx) = attr_i32(attrs, &self.tokens, "Index") {
            self.cur_col = idx - 1;
        }
        self.cell = CellState {
            row: self.cur_row,
            col: self.cur_col,
            merge_down: attr_i32(attrs, &self.tokens, "MergeDown").unwrap_or(0),
            merge_across: attr_i32(attrs, &self.tokens, "MergeAcross").unwrap_or(0),
            formula: attr_str(attrs, &self.tokens, "Formula").map(str::to_string),
            style_id: attr_str(attrs, &self.tokens, "StyleID").map(str::to_string),
        };
    }

    fn end_cell(&mut self) {
        let style_xf_id = self.cell.style_id.as_deref().and_then(|id| self.style_map.get(id)).copied();
        let sheet_index = self.cur_sheet_index;
        let cell = std::mem::take(&mut self.cell);
        let cell_type = self.cell_type;
        let cell_text = std::mem::take(&mut self.cell_text);

        if let Some(xf_id) = style_xf_id {
            if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                sheet.set_format(cell.row, cell.col, xf_id);
            }
        }

        let span = 1 + cell.merge_across.max(0);
        let rows = 1 + cell.merge_down.max(0);

        if let Some(formula_text) = cell.formula.clone() {
            if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                if let Some(mut f) = sheet.start_formula() {
                    f.set_position(cell.row, cell.col);
                    f.set_formula(FormulaGrammar::XlsXml, &formula_text);
                    apply_cell_result(f.as_mut(), cell_type, &cell_text);
                    f.commit();
                }
            }
        } else {
            let string_id = if matches!(cell_type, CellType::String | CellType::Unknown) && !cell_text.is_empty() {
                self.factory().shared_strings().map(|s| s.add(&cell_text))
            } else {
                None
            };
            if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                match cell_type {
                    CellType::Number => {
                        if let Ok(v) = cell_text.trim().parse::<f64>() {
                            sheet.set_value(cell.row, cell.col, v);
                        }
                    }
                    CellType::Boolean => sheet.set_bool(cell.row, cell.col, cell_text.trim() == "1"),
                    CellType::DateTime => {
                        if let Some((y, m, d, hh, mm, ss)) = parse_xls_xml_datetime(cell_text.trim()) {
                            sheet.set_date_time(cell.row, cell.col, y, m, d, hh, mm, ss);
                        }
                    }
                    CellType::Error => sheet.set_auto(cell.row, cell.col, cell_text.trim()),
                    CellType::String | CellType::Unknown => {
                        if let Some(id) = string_id {
                            sheet.set_string(cell.row, cell.col, id);
                        } else if !cell_text.is_empty() {
                            sheet.set_auto(cell.row, cell.col, &cell_text);
                        }
                    }
                }
            }
        }

        if rows > 1 {
            if let Some(sheet) = self.factory().sheet_by_index(sheet_index) {
                sheet.fill_down_cells(cell.row, cell.col, rows - 1);
            }
        }
        if span > 1 || rows > 1 {
            if let Some(props) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_properties()) {
                let last_row = cell.row + rows - 1;
                let last_col = cell.col + span - 1;
                props.set_merge_cell_range(CellRange {
                    first: CellAddress { sheet: sheet_index, row: cell.row, column: cell.col },
                    last: CellAddress { sheet: sheet_index, row: last_row, column: last_col },
                });
            }
        }

        self.cur_col = cell.col + 1;
        self.cell_type = CellType::Unknown;
    }

    fn start_style(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.cur_style_id = attr_str(attrs, &self.tokens, "ID").map(str::to_string);
        self.in_style = true;
        self.cur_style_xf = self.factory().styles().and_then(|s| s.start_xf(XfCategory::Cell));
    }

    fn end_style(&mut self) {
        self.in_style = false;
        if let (Some(xf), Some(id)) = (self.cur_style_xf.take(), self.cur_style_id.take()) {
            let xf_id = xf.commit();
            self.style_map.insert(id, xf_id);
        }
    }

    fn start_font(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_style_xf.is_none() {
            return;
        }
        let Some(mut font) = self.factory().styles().and_then(|s| s.start_font_style()) else { return };
        if let Some(n) = attr_str(attrs, &self.tokens, "FontName") {
            font.set_name(n);
        }
        if let Some(sz) = attr_f64(attrs, &self.tokens, "Size") {
            font.set_size(sz);
        }
        if attr_str(attrs, &self.tokens, "Bold") == Some("1") {
            font.set_bold(true);
        }
        if attr_str(attrs, &self.tokens, "Italic") == Some("1") {
            font.set_italic(true);
        }
        if let Some(c) = attr_str(attrs, &self.tokens, "Color").and_then(parse_hex_color) {
            font.set_color(c);
        }
        let id = font.commit();
        if let Some(xf) = &mut self.cur_style_xf {
            xf.set_font(id);
        }
    }

    fn start_alignment(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(xf) = &mut self.cur_style_xf else { return };
        if let Some(h) = attr_str(attrs, &self.tokens, "Horizontal") {
            xf.set_horizontal_alignment(parse_horizontal(h));
        }
        if let Some(v) = attr_str(attrs, &self.tokens, "Vertical") {
            xf.set_vertical_alignment(parse_vertical(v));
        }
        if attr_str(attrs, &self.tokens, "WrapText") == Some("1") {
            xf.set_wrap_text(true);
        }
        if attr_str(attrs, &self.tokens, "ShrinkToFit") == Some("1") {
            xf.set_shrink_to_fit(true);
        }
        xf.set_apply_alignment(true);
    }

    fn start_interior(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_style_xf.is_none() {
            return;
        }
        let Some(mut fill) = self.factory().styles().and_then(|s| s.start_fill_style()) else { return };
        if let Some(c) = attr_str(attrs, &self.tokens, "Color").and_then(parse_hex_color) {
            fill.set_fg_color(c);
        }
        if let Some(p) = attr_str(attrs, &self.tokens, "Pattern") {
            fill.set_pattern_type(p);
        }
        let id = fill.commit();
        if let Some(xf) = &mut self.cur_style_xf {
            xf.set_fill(id);
        }
    }

    fn start_number_format(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_style_xf.is_none() {
            return;
        }
        let Some(mut numfmt) = self.factory().styles().and_then(|s| s.start_number_format()) else { return };
        if let Some(code) = attr_str(attrs, &self.tokens, "Format") {
            numfmt.set_code(code);
        }
        let id = numfmt.commit();
        if let Some(xf) = &mut self.cur_style_xf {
            xf.set_number_format(id);
        }
    }

    fn start_named_range(&mut self, attrs: &[XmlAttribute<'_>]) {
        let (Some(name), Some(refers_to)) =
            (attr_str(attrs, &self.tokens, "Name").map(str::to_string), attr_str(attrs, &self.tokens, "RefersTo").map(str::to_string))
        else {
            return;
        };
        let sheet_index = self.cur_sheet_index;
        let target = if sheet_index >= 0 {
            self.factory().sheet_by_index(sheet_index).and_then(|s| s.named_expression())
        } else {
            self.factory().named_expression()
        };
        if let Some(mut ne) = target {
            ne.set_named_expression(&name, FormulaGrammar::XlsXml, &refers_to);
            ne.commit();
        }
    }

    fn reset_split_pane(&mut self) {
        self.pane_state = PaneState::Split;
        self.split_horizontal = 0.0;
        self.split_vertical = 0.0;
        self.top_row_bottom_pane = 0;
        self.left_col_right_pane = 0;
    }

    /// Commits the frozen/split pane state accumulated over one
    /// `<WorksheetOptions>` subtree, mirroring
    /// `xls_xml_context::commit_split_pane`'s swapped x/y convention: the
    /// schema's "split vertical" is the position `set_split_pane` takes as
    /// its x-position, and vice versa.
    fn commit_split_pane(&mut self) {
        let split = (self.split_horizontal != 0.0 || self.split_vertical != 0.0)
            && (self.top_row_bottom_pane != 0 || self.left_col_right_pane != 0);
        if !split {
            return;
        }
        let sheet_index = self.cur_sheet_index;
        let (split_h, split_v, top_row, left_col) =
            (self.split_horizontal, self.split_vertical, self.top_row_bottom_pane, self.left_col_right_pane);
        let Some(view) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_view()) else { return };
        match self.pane_state {
            PaneState::Split => view.set_split_pane(split_v, split_h, top_row, left_col),
            PaneState::Frozen => view.set_frozen_pane(split_v as i32, split_h as i32, top_row, left_col),
            PaneState::FrozenSplit => {}
        }
    }
}

impl Context for WorkbookContext {
    fn can_handle_element(&self, name: ElementName) -> bool {
        name.token != tok(&self.tokens, "AutoFilter")
    }

    fn create_child_context(&mut self, name: ElementName) -> Option<Box<dyn Context>> {
        if name.token == tok(&self.tokens, "AutoFilter") {
            let sheet_index = self.cur_sheet_index;
            let range = CellRange::default();
            let filter = self.factory().sheet_by_index(sheet_index)?.start_auto_filter(range)?;
            return Some(Box::new(AutoFilterContext::new(filter, self.tokens.clone())));
        }
        None
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "Data") {
            self.in_data = true;
            if let Some(type_str) = attr_str(attrs, &self.tokens, "Type") {
                self.cell_type = match type_str {
                    "Number" => CellType::Number,
                    "DateTime" => CellType::DateTime,
                    "Boolean" => CellType::Boolean,
                    "Error" => CellType::Error,
                    _ => CellType::String,
                };
            }
        } else if t == tok(&self.tokens, "Cell") {
            self.start_cell(attrs);
        } else if t == tok(&self.tokens, "Row") {
            if let Some(idx) = attr_i32(attrs, &self.tokens, "Index") {
                self.cur_row = idx - 1;
            }
            self.cur_col = 0;
        } else if t == tok(&self.tokens, "Worksheet") {
            self.cur_sheet_index += 1;
            let sheet_name = attr_str(attrs, &self.tokens, "Name").unwrap_or("").to_string();
            let index = self.cur_sheet_index;
            self.factory().append_sheet(index, &sheet_name);
            self.cur_row = 0;
            self.cur_col = 0;
        } else if t == tok(&self.tokens, "Style") {
            self.start_style(attrs);
        } else if self.in_style && t == tok(&self.tokens, "Font") {
            self.start_font(attrs);
        } else if self.in_style && t == tok(&self.tokens, "Alignment") {
            self.start_alignment(attrs);
        } else if self.in_style && t == tok(&self.tokens, "Interior") {
            self.start_interior(attrs);
        } else if self.in_style && t == tok(&self.tokens, "NumberFormat") {
            self.start_number_format(attrs);
        } else if t == tok(&self.tokens, "NamedRange") {
            self.start_named_range(attrs);
        } else if t == tok(&self.tokens, "WorksheetOptions") {
            self.reset_split_pane();
        } else if t == tok(&self.tokens, "FreezePanes") {
            self.pane_state = PaneState::FrozenSplit;
        } else if t == tok(&self.tokens, "FrozenNoSplit") {
            self.pane_state = PaneState::Frozen;
        } else if t == tok(&self.tokens, "SplitHorizontal") {
            self.pane_field = Some(PaneField::SplitHorizontal);
            self.pane_text.clear();
        } else if t == tok(&self.tokens, "SplitVertical") {
            self.pane_field = Some(PaneField::SplitVertical);
            self.pane_text.clear();
        } else if t == tok(&self.tokens, "TopRowBottomPane") {
            self.pane_field = Some(PaneField::TopRowBottomPane);
            self.pane_text.clear();
        } else if t == tok(&self.tokens, "LeftColumnRightPane") {
            self.pane_field = Some(PaneField::LeftColumnRightPane);
            self.pane_text.clear();
        } else if t == tok(&self.tokens, "Selected") {
            let sheet_index = self.cur_sheet_index;
            if let Some(view) = self.factory().sheet_by_index(sheet_index).and_then(|s| s.sheet_view()) {
                view.set_sheet_active();
            }
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "Data") {
            self.in_data = false;
        } else if t == tok(&self.tokens, "Cell") {
            self.end_cell();
        } else if t == tok(&self.tokens, "Style") {
            self.end_style();
        } else if t == tok(&self.tokens, "WorksheetOptions") {
            self.commit_split_pane();
        } else if t == tok(&self.tokens, "SplitHorizontal") {
            self.split_horizontal = self.pane_text.trim().parse().unwrap_or(0.0);
            self.pane_field = None;
        } else if t == tok(&self.tokens, "SplitVertical") {
            self.split_vertical = self.pane_text.trim().parse().unwrap_or(0.0);
            self.pane_field = None;
        } else if t == tok(&self.tokens, "TopRowBottomPane") {
            self.top_row_bottom_pane = self.pane_text.trim().parse().unwrap_or(0);
            self.pane_field = None;
        } else if t == tok(&self.tokens, "LeftColumnRightPane") {
            self.left_col_right_pane = self.pane_text.trim().parse().unwrap_or(0);
            self.pane_field = None;
        }
        false
    }

    fn characters(&mut self, value: StrView<'_>, _transient: bool) {
        if self.in_data {
            self.cell_text.push_str(value.as_str().unwrap_or(""));
        } else if self.pane_field.is_some() {
            self.pane_text.push_str(value.as_str().unwrap_or(""));
        }
    }
}

fn apply_cell_result(f: &mut dyn Formula, cell_type: CellType, cell_text: &str) {
    match cell_type {
        CellType::Number => {
            if let Ok(v) = cell_text.trim().parse::<f64>() {
                f.set_result_value(v);
            }
        }
        CellType::Boolean => f.set_result_bool(cell_text.trim() == "1"),
        CellType::String => f.set_result_string(cell_text.trim()),
        _ => {}
    }
}

fn parse_hex_color(text: &str) -> Option<Argb> {
    let text = text.trim_start_matches('#');
    if text.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&text[0..2], 16).ok()?;
    let g = u8::from_str_radix(&text[2..4], 16).ok()?;
    let b = u8::from_str_radix(&text[4..6], 16).ok()?;
    Some(Argb::new(0xFF, r, g, b))
}

fn parse_horizontal(text: &str) -> HorizontalAlignment {
    match text {
        "Left" => HorizontalAlignment::Left,
        "Center" => HorizontalAlignment::Center,
        "Right" => HorizontalAlignment::Right,
        "Fill" => HorizontalAlignment::Fill,
        "Justify" => HorizontalAlignment::Justify,
        "CenterAcrossSelection" => HorizontalAlignment::CenterAcrossSelection,
        "Distributed" => HorizontalAlignment::Distributed,
        _ => HorizontalAlignment::Unset,
    }
}

fn parse_vertical(text: &str) -> VerticalAlignment {
    match text {
        "Top" => VerticalAlignment::Top,
        "Center" => VerticalAlignment::Center,
        "Bottom" => VerticalAlignment::Bottom,
        "Justify" => VerticalAlignment::Justify,
        "Distributed" => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Unset,
    }
}

/// xls-xml datetime text looks like `2023-01-15T09:30:00.000`.
fn parse_xls_xml_datetime(text: &str) -> Option<(i32, u8, u8, u8, u8, u8)> {
    let (date, time) = text.split_once('T')?;
    let mut date_parts = date.split('-');
    let y: i32 = date_parts.next()?.parse().ok()?;
    let m: u8 = date_parts.next()?.parse().ok()?;
    let d: u8 = date_parts.next()?.parse().ok()?;
    let time = time.split('.').next().unwrap_or(time);
    let mut time_parts = time.split(':');
    let hh: u8 = time_parts.next()?.parse().ok()?;
    let mm: u8 = time_parts.next()?.parse().ok()?;
    let ss: u8 = time_parts.next().unwrap_or("0").parse().ok()?;
    Some((y, m, d, hh, mm, ss))
}

/// Child context for `<x:AutoFilter>`: builds the AND/OR filter tree
/// (spec §4.10 "Auto-filter tree") by pushing one [`FilterNode`] per
/// `<AutoFilterColumn>`/`<AutoFilterOr>` nesting level.
struct AutoFilterContext {
    tokens: Rc<TokenMap>,
    filter: Option<Box<dyn AutoFilter>>,
    node_stack: Vec<Box<dyn FilterNode>>,
    cur_column: i32,
}

impl AutoFilterContext {
    fn new(filter: Box<dyn AutoFilter>, tokens: Rc<TokenMap>) -> Self {
        AutoFilterContext { tokens, filter: Some(filter), node_stack: Vec::new(), cur_column: 0 }
    }

    fn push_column(&mut self, attrs: &[XmlAttribute<'_>]) {
        if let Some(idx) = attr_i32(attrs, &self.tokens, "Column") {
            self.cur_column = idx - 1;
        }
        if let Some(filter) = &mut self.filter {
            let node = filter.start_column(self.cur_column, FilterConnector::And);
            self.node_stack.push(node);
        }
    }
}

impl Context for AutoFilterContext {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "AutoFilterColumn") {
            self.push_column(attrs);
        } else if t == tok(&self.tokens, "AutoFilterOr") {
            if let Some(top) = self.node_stack.last_mut() {
                let child = top.start_node(FilterConnector::Or);
                self.node_stack.push(child);
            }
        } else if t == tok(&self.tokens, "AutoFilterCondition") {
            let op = attr_str(attrs, &self.tokens, "Operator").unwrap_or("Equals");
            let value_text = attr_str(attrs, &self.tokens, "Value").unwrap_or("");
            let op = parse_filter_operator(op);
            let value = classify_filter_value(value_text);
            let column = self.cur_column;
            if let Some(top) = self.node_stack.last_mut() {
                top.append_item(column, op, value);
            }
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "AutoFilterOr") || t == tok(&self.tokens, "AutoFilterColumn") {
            if let Some(node) = self.node_stack.pop() {
                node.commit();
            }
            false
        } else if t == tok(&self.tokens, "AutoFilter") {
            if let Some(filter) = self.filter.take() {
                filter.commit();
            }
            true
        } else {
            false
        }
    }
}

fn parse_filter_operator(text: &str) -> FilterOperator {
    match text {
        "Equals" => FilterOperator::Equal,
        "DoesNotEqual" => FilterOperator::NotEqual,
        "GreaterThan" => FilterOperator::Greater,
        "GreaterThanOrEqual" => FilterOperator::GreaterEqual,
        "LessThan" => FilterOperator::Less,
        "LessThanOrEqual" => FilterOperator::LessEqual,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordedSheet {
        values: Vec<(i32, i32, f64)>,
        strings: Vec<(i32, i32, u32)>,
        merges: Vec<CellRange>,
        view: RecordedView,
    }

    impl Sheet for RecordedSheet {
        fn set_value(&mut self, row: i32, column: i32, value: f64) {
            self.values.push((row, column, value));
        }
        fn set_string(&mut self, row: i32, column: i32, string_id: u32) {
            self.strings.push((row, column, string_id));
        }
        fn sheet_properties(&mut self) -> Option<&mut dyn SheetProperties> {
            Some(self)
        }
        fn sheet_view(&mut self) -> Option<&mut dyn SheetView> {
            Some(&mut self.view)
        }
        fn start_auto_filter(&mut self, _range: CellRange) -> Option<Box<dyn AutoFilter>> {
            Some(Box::new(NullAutoFilter))
        }
    }

    impl SheetProperties for RecordedSheet {
        fn set_merge_cell_range(&mut self, range: CellRange) {
            self.merges.push(range);
        }
    }

    #[derive(Default)]
    struct RecordedView {
        split_pane: Option<(f64, f64, i32, i32)>,
        frozen_pane: Option<(i32, i32, i32, i32)>,
        sheet_active: bool,
    }

    impl SheetView for RecordedView {
        fn set_split_pane(&mut self, x_position: f64, y_position: f64, top_left_row: i32, top_left_column: i32) {
            self.split_pane = Some((x_position, y_position, top_left_row, top_left_column));
        }
        fn set_frozen_pane(&mut self, visible_columns: i32, visible_rows: i32, top_left_row: i32, top_left_column: i32) {
            self.frozen_pane = Some((visible_columns, visible_rows, top_left_row, top_left_column));
        }
        fn set_sheet_active(&mut self) {
            self.sheet_active = true;
        }
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
        fn start_node(&mut self, connector: FilterConnector) -> Box<dyn FilterNode> {
            Box::new(NullFilterNode(connector))
        }
        fn commit(self: Box<Self>) {}
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
            self.sheets.get_mut(index as usize).map(|s| s as &mut dyn Sheet)
        }
        fn shared_strings(&mut self) -> Option<&mut dyn SharedStrings> {
            Some(&mut self.shared)
        }
    }

    #[test]
    fn numeric_and_string_cells_land_on_the_right_sheet() {
        let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <ss:Worksheet ss:Name="Sheet1">
  <ss:Table>
   <ss:Row ss:Index="1">
    <ss:Cell ss:Index="1"><ss:Data ss:Type="Number">12.5</ss:Data></ss:Cell>
    <ss:Cell><ss:Data ss:Type="String">hello</ss:Data></ss:Cell>
   </ss:Row>
  </ss:Table>
 </ss:Worksheet>
</ss:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert_eq!(factory.sheets[0].values, vec![(0, 0, 12.5)]);
        assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
        assert_eq!(factory.shared.values, vec!["hello".to_string()]);
    }

    #[test]
    fn merged_cell_range_is_recorded() {
        let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <ss:Worksheet ss:Name="Sheet1">
  <ss:Table>
   <ss:Row><ss:Cell ss:MergeAcross="1"><ss:Data ss:Type="String">merged</ss:Data></ss:Cell></ss:Row>
  </ss:Table>
 </ss:Worksheet>
</ss:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        assert_eq!(factory.sheets[0].merges.len(), 1);
    }

    #[test]
    fn frozen_panes_are_committed_to_the_sheet_view() {
        let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <ss:Worksheet ss:Name="Sheet1">
  <ss:Table>
   <ss:Row><ss:Cell><ss:Data ss:Type="String">hi</ss:Data></ss:Cell></ss:Row>
  </ss:Table>
  <x:WorksheetOptions xmlns:x="urn:schemas-microsoft-com:office:excel">
   <x:FreezePanes/>
   <x:FrozenNoSplit/>
   <x:SplitHorizontal>2</x:SplitHorizontal>
   <x:SplitVertical>1</x:SplitVertical>
   <x:TopRowBottomPane>2</x:TopRowBottomPane>
   <x:LeftColumnRightPane>1</x:LeftColumnRightPane>
   <x:Selected/>
  </x:WorksheetOptions>
 </ss:Worksheet>
</ss:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        let view = &factory.sheets[0].view;
        assert_eq!(view.frozen_pane, Some((1, 2, 2, 1)));
        assert_eq!(view.split_pane, None);
        assert!(view.sheet_active);
    }

    #[test]
    fn split_panes_without_freeze_are_committed_as_a_split() {
        let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <ss:Worksheet ss:Name="Sheet1">
  <ss:Table>
   <ss:Row><ss:Cell><ss:Data ss:Type="String">hi</ss:Data></ss:Cell></ss:Row>
  </ss:Table>
  <x:WorksheetOptions xmlns:x="urn:schemas-microsoft-com:office:excel">
   <x:SplitHorizontal>1500</x:SplitHorizontal>
   <x:SplitVertical>900</x:SplitVertical>
   <x:TopRowBottomPane>4</x:TopRowBottomPane>
   <x:LeftColumnRightPane>2</x:LeftColumnRightPane>
  </x:WorksheetOptions>
 </ss:Worksheet>
</ss:Workbook>"#;
        let mut factory = RecordedFactory::default();
        import(xml, &mut factory).unwrap();
        let view = &factory.sheets[0].view;
        assert_eq!(view.split_pane, Some((900.0, 1500.0, 4, 2)));
        assert_eq!(view.frozen_pane, None);
        assert!(!view.sheet_active);
    }

    #[test]
    fn datetime_cell_is_parsed_into_components() {
        assert_eq!(parse_xls_xml_datetime("2023-01-15T09:30:05.000"), Some((2023, 1, 15, 9, 30, 5)));
        assert_eq!(parse_xls_xml_datetime("not-a-date"), None);
    }
}
