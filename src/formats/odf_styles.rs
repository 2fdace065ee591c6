//! ODF style family handler (spec §4.10 "ods"), shared between a
//! standalone `styles.xml` part and the `<office:automatic-styles>` block
//! embedded in `content.xml`, grounded on `odf_styles_context.cpp`,
//! `odf_style_context.cpp`, `odf_styles.hpp`, `odf_helper.cpp` and, for
//! the standalone-document wrapper, `odf_document_styles_context.cpp`.
//!
//! `<style:style>` carries no child-element nesting worth a dedicated
//! `Context`: `table-column-properties`/`table-row-properties`/
//! `table-cell-properties`/`paragraph-properties`/`text-properties` are
//! each a single leaf element whose own attributes fully describe the
//! property group, so (as with `xlsx`'s `styles.rs`) one flat context
//! handles the whole family.
//!
//! [`StylesContext`] writes every committed id into a [`StyleCatalog`]
//! shared (`Rc<RefCell<_>>`) with its caller, because `content.xml`'s
//! cell/column/row dispatch (in [`super::ods`]) reads those ids back out
//! *after* `<office:automatic-styles>` closes but *before* `<office:body>`
//! opens, in the same single SAX pass — ODF requires automatic styles to
//! precede the body that references them.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::import::types::{Argb, BorderDirection, HorizontalAlignment, VerticalAlignment, XfCategory};
use crate::import::{BorderStyleBuilder, CellProtectionBuilder, FillStyleBuilder, FontStyleBuilder, ImportFactory, NumberFormatBuilder, XfBuilder};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const ELEMENTS: &[&str] = &[
    "document-styles",
    "styles",
    "automatic-styles",
    "style",
    "table-column-properties",
    "table-row-properties",
    "table-cell-properties",
    "paragraph-properties",
    "text-properties",
    "number-style",
    "currency-style",
    "percentage-style",
    "date-style",
    "time-style",
    "boolean-style",
    "text-style",
    "number",
    "day",
    "month",
    "year",
    "hours",
    "minutes",
    "seconds",
    "am-pm",
    "text",
    "currency-symbol",
    "boolean",
    "name",
    "family",
    "parent-style-name",
    "data-style-name",
    "display-name",
    "column-width",
    "row-height",
    "text-align",
    "background-color",
    "border",
    "border-top",
    "border-bottom",
    "border-left",
    "border-right",
    "wrap-option",
    "vertical-align",
    "shrink-to-fit",
    "cell-protect",
    "font-name",
    "font-size",
    "font-weight",
    "font-style",
    "color",
];

pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

fn tok(tokens: &TokenMap, name: &str) -> TokenId {
    tokens.get(name)
}

fn attr_str<'a>(attrs: &'a [XmlAttribute<'a>], tokens: &TokenMap, name: &str) -> Option<&'a str> {
    let id = tok(tokens, name);
    attrs.iter().find(|a| a.token == id).and_then(|a| a.value.as_str())
}

fn attr_f64(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<f64> {
    attr_str(attrs, tokens, name).and_then(|s| parse_length(s))
}

/// Strips a trailing CSS-style unit (`"0.889in"`, `"12pt"`, `"2.5cm"`)
/// and returns the bare number, same liberality `odf_helper`'s length
/// parsing affords callers.
fn parse_length(text: &str) -> Option<f64> {
    let end = text.find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-').unwrap_or(text.len());
    text[..end].parse::<f64>().ok()
}

/// `"#RRGGBB"` (odf_helper.cpp's `convert_fo_color`, exactly 7 chars).
pub fn parse_fo_color(text: &str) -> Option<Argb> {
    if text.len() != 7 || !text.starts_with('#') {
        return None;
    }
    let r = u8::from_str_radix(&text[1..3], 16).ok()?;
    let g = u8::from_str_radix(&text[3..5], 16).ok()?;
    let b = u8::from_str_radix(&text[5..7], 16).ok()?;
    Some(Argb::new(0xFF, r, g, b))
}

/// `odf_helper.cpp`'s `hor_align` sorted-map.
pub fn parse_hor_align(text: &str) -> HorizontalAlignment {
    match text {
        "center" => HorizontalAlignment::Center,
        "end" => HorizontalAlignment::Right,
        "justify" => HorizontalAlignment::Justify,
        "start" => HorizontalAlignment::Left,
        _ => HorizontalAlignment::Unset,
    }
}

/// `odf_helper.cpp`'s `ver_align` sorted-map.
pub fn parse_ver_align(text: &str) -> VerticalAlignment {
    match text {
        "bottom" => VerticalAlignment::Bottom,
        "justify" => VerticalAlignment::Justify,
        "middle" => VerticalAlignment::Center,
        "top" => VerticalAlignment::Top,
        _ => VerticalAlignment::Unset,
    }
}

/// `fo:border="0.018in solid #000000"`: splits on whitespace and
/// classifies each token by its leading character (`odf_helper.cpp`'s
/// `extract_border_details`). Unrecognized styles pass through as-is;
/// the border builder stores style text opaquely.
fn extract_border_details(text: &str) -> (Option<f64>, Option<&str>, Option<Argb>) {
    let mut width = None;
    let mut style = None;
    let mut color = None;
    for token in text.split_whitespace() {
        if let Some(c) = token.strip_prefix('#').and_then(|_| parse_fo_color(token)) {
            color = Some(c);
        } else if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            width = parse_length(token);
        } else {
            style = Some(token);
        }
    }
    (width, style, color)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleFamily {
    Unknown,
    TableColumn,
    TableRow,
    TableCell,
    Paragraph,
    Text,
}

fn parse_family(text: &str) -> StyleFamily {
    match text {
        "table-column" => StyleFamily::TableColumn,
        "table-row" => StyleFamily::TableRow,
        "table-cell" => StyleFamily::TableCell,
        "paragraph" => StyleFamily::Paragraph,
        "text" => StyleFamily::Text,
        _ => StyleFamily::Unknown,
    }
}

/// Everything `content.xml`'s cell/row/column dispatch needs to resolve a
/// `table:style-name` attribute, keyed by the ODF style's `style:name`.
#[derive(Debug, Default)]
pub struct StyleCatalog {
    pub cell_xf_by_name: HashMap<String, u32>,
    pub number_format_by_name: HashMap<String, u32>,
    pub column_width_by_name: HashMap<String, f64>,
    pub row_height_by_name: HashMap<String, (f64, bool)>,
}

pub type SharedCatalog = Rc<RefCell<StyleCatalog>>;

/// Parses a standalone ODF `styles.xml` part (`<office:document-styles>`
/// wrapping one `<office:styles>`), per `odf_document_styles_context.cpp`.
pub fn parse_styles_document(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<StyleCatalog> {
    let mut repo = NamespaceRepository::new();
    let tokens = Rc::new(build_tokens());
    let catalog: SharedCatalog = Rc::new(RefCell::new(StyleCatalog::default()));
    {
        let ctx = StylesContext::new(factory, tokens.clone(), catalog.clone());
        let mut stack = crate::context::ContextStack::new(Box::new(ctx));
        sax::parse(xml, &mut repo, &tokens, &mut stack)?;
        let _ = stack.into_root();
    }
    Ok(Rc::try_unwrap(catalog).expect("sole owner after parse").into_inner())
}

/// One `<office:styles>`/`<office:automatic-styles>` scope. Used both as
/// the root context for a standalone `styles.xml` and as a child context
/// [`super::ods`] pushes when it meets either element inline in
/// `content.xml`.
pub struct StylesContext<'a> {
    factory: &'a mut dyn ImportFactory,
    tokens: Rc<TokenMap>,
    catalog: SharedCatalog,
    automatic: bool,

    cur_name: Option<String>,
    cur_display_name: Option<String>,
    cur_family: StyleFamily,
    cur_parent_name: Option<String>,
    cur_data_style_name: Option<String>,
    cur_font: Option<Box<dyn FontStyleBuilder>>,
    cur_fill: Option<Box<dyn FillStyleBuilder>>,
    cur_border: Option<Box<dyn BorderStyleBuilder>>,
    pending_protection_id: Option<u32>,
    cur_hor_align: HorizontalAlignment,
    cur_ver_align: VerticalAlignment,
    cur_wrap_text: bool,
    cur_shrink_to_fit: bool,
    cur_column_width: Option<f64>,
    cur_row_height: Option<f64>,
    cur_row_height_set: bool,

    in_number_style: bool,
    cur_number_style_name: Option<String>,
    cur_number_code: String,
}

impl<'a> StylesContext<'a> {
    pub fn new(factory: &'a mut dyn ImportFactory, tokens: Rc<TokenMap>, catalog: SharedCatalog) -> Self {
        StylesContext {
            factory,
            tokens,
            catalog,
            automatic: false,
            cur_name: None,
            cur_display_name: None,
            cur_family: StyleFamily::Unknown,
            cur_parent_name: None,
            cur_data_style_name: None,
            cur_font: None,
            cur_fill: None,
            cur_border: None,
            pending_protection_id: None,
            cur_hor_align: HorizontalAlignment::Unset,
            cur_ver_align: VerticalAlignment::Unset,
            cur_wrap_text: false,
            cur_shrink_to_fit: false,
            cur_column_width: None,
            cur_row_height: None,
            cur_row_height_set: false,
            in_number_style: false,
            cur_number_style_name: None,
            cur_number_code: String::new(),
        }
    }

    fn reset_style_state(&mut self) {
        self.cur_name = None;
        self.cur_display_name = None;
        self.cur_family = StyleFamily::Unknown;
        self.cur_parent_name = None;
        self.cur_data_style_name = None;
        self.cur_font = None;
        self.cur_fill = None;
        self.cur_border = None;
        self.pending_protection_id = None;
        self.cur_hor_align = HorizontalAlignment::Unset;
        self.cur_ver_align = VerticalAlignment::Unset;
        self.cur_wrap_text = false;
        self.cur_shrink_to_fit = false;
        self.cur_column_width = None;
        self.cur_row_height = None;
        self.cur_row_height_set = false;
    }

    fn start_style(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.reset_style_state();
        self.cur_name = attr_str(attrs, &self.tokens, "name").map(str::to_string);
        self.cur_display_name = attr_str(attrs, &self.tokens, "display-name").map(str::to_string);
        self.cur_family = attr_str(attrs, &self.tokens, "family").map(parse_family).unwrap_or(StyleFamily::Unknown);
        self.cur_parent_name = attr_str(attrs, &self.tokens, "parent-style-name").map(str::to_string);
        self.cur_data_style_name = attr_str(attrs, &self.tokens, "data-style-name").map(str::to_string);
    }

    fn start_column_properties(&mut self, attrs: &[XmlAttribute<'_>]) {
        self.cur_column_width = attr_f64(attrs, &self.tokens, "column-width");
    }

    fn start_row_properties(&mut self, attrs: &[XmlAttribute<'_>]) {
        if let Some(h) = attr_f64(attrs, &self.tokens, "row-height") {
            self.cur_row_height = Some(h);
            self.cur_row_height_set = true;
        }
    }

    fn start_paragraph_properties(&mut self, attrs: &[XmlAttribute<'_>]) {
        if let Some(a) = attr_str(attrs, &self.tokens, "text-align") {
            self.cur_hor_align = parse_hor_align(a);
        }
    }

    fn start_text_properties(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_font.is_none() {
            self.cur_font = self.factory.styles().and_then(|s| s.start_font_style());
        }
        let Some(font) = &mut self.cur_font else { return };
        if let Some(name) = attr_str(attrs, &self.tokens, "font-name") {
            font.set_name(name);
        }
        if let Some(size) = attr_f64(attrs, &self.tokens, "font-size") {
            font.set_size(size);
        }
        if let Some(weight) = attr_str(attrs, &self.tokens, "font-weight") {
            font.set_bold(weight == "bold");
        }
        if let Some(style) = attr_str(attrs, &self.tokens, "font-style") {
            font.set_italic(style == "italic");
        }
        if let Some(color) = attr_str(attrs, &self.tokens, "color").and_then(parse_fo_color) {
            font.set_color(color);
        }
    }

    fn start_cell_properties(&mut self, attrs: &[XmlAttribute<'_>]) {
        if let Some(color) = attr_str(attrs, &self.tokens, "background-color").and_then(parse_fo_color) {
            if self.cur_fill.is_none() {
                self.cur_fill = self.factory.styles().and_then(|s| s.start_fill_style());
            }
            if let Some(fill) = &mut self.cur_fill {
                fill.set_pattern_type("solid");
                fill.set_fg_color(color);
            }
        }
        for (attr_name, dirs) in [
            ("border", &[BorderDirection::Top, BorderDirection::Bottom, BorderDirection::Left, BorderDirection::Right][..]),
            ("border-top", &[BorderDirection::Top][..]),
            ("border-bottom", &[BorderDirection::Bottom][..]),
            ("border-left", &[BorderDirection::Left][..]),
            ("border-right", &[BorderDirection::Right][..]),
        ] {
            if let Some(text) = attr_str(attrs, &self.tokens, attr_name) {
                let (width, style, color) = extract_border_details(text);
                if style.is_none() && width.is_none() && color.is_none() {
                    continue;
                }
                if self.cur_border.is_none() {
                    self.cur_border = self.factory.styles().and_then(|s| s.start_border_style());
                }
                if let Some(border) = &mut self.cur_border {
                    for &dir in dirs {
                        if let Some(s) = style {
                            border.set_style(dir, s);
                        }
                        if let Some(c) = color {
                            border.set_color(dir, c);
                        }
                        if let Some(w) = width {
                            border.set_width(dir, w);
                        }
                    }
                }
            }
        }
        if attr_str(attrs, &self.tokens, "wrap-option") == Some("wrap") {
            self.cur_wrap_text = true;
        }
        if let Some(v) = attr_str(attrs, &self.tokens, "vertical-align") {
            self.cur_ver_align = parse_ver_align(v);
        }
        if attr_str(attrs, &self.tokens, "shrink-to-fit") == Some("true") {
            self.cur_shrink_to_fit = true;
        }
        if let Some(protect) = attr_str(attrs, &self.tokens, "cell-protect") {
            let (locked, hidden, formula_hidden) = match protect {
                "protected" => (true, false, false),
                "hidden-and-protected" => (true, true, false),
                "formula-hidden" => (false, false, true),
                "protected formula-hidden" | "formula-hidden protected" => (true, false, true),
                "none" => (false, false, false),
                _ => return,
            };
            if let Some(mut protection) = self.factory.styles().and_then(|s| s.start_cell_protection()) {
                protection.set_locked(locked);
                protection.set_hidden(hidden);
                protection.set_formula_hidden(formula_hidden);
                let id = protection.commit();
                        let _ = id;
                // `XfBuilder::set_protection` is applied once the xf is
                // committed at `</style:style>`, so stash the id here via
                // a throwaway builder is wasteful; record it directly.
                self.pending_protection_id = Some(id);
            }
        }
    }

    fn end_style(&mut self) {
        let Some(name) = self.cur_name.take() else {
            return;
        };
        match self.cur_family {
            StyleFamily::TableColumn => {
                if let Some(width) = self.cur_column_width {
                    self.catalog.borrow_mut().column_width_by_name.insert(name, width);
                }
            }
            StyleFamily::TableRow => {
                if let Some(height) = self.cur_row_height {
                    self.catalog.borrow_mut().row_height_by_name.insert(name, (height, self.cur_row_height_set));
                }
            }
            StyleFamily::TableCell => self.commit_cell_xf(name),
            StyleFamily::Paragraph | StyleFamily::Text | StyleFamily::Unknown => {
                // No paragraph/text/graphic sink on the import interface
                // (spec §4.9 models cell-level formatting only); any
                // font record already committed above is simply unused.
            }
        }
    }

    fn commit_cell_xf(&mut self, name: String) {
        let parent_xf = self.cur_parent_name.as_deref().and_then(|p| self.catalog.borrow().cell_xf_by_name.get(p).copied());
        let number_format = self.cur_data_style_name.as_deref().and_then(|d| self.catalog.borrow().number_format_by_name.get(d).copied());

        let category = if self.automatic { XfCategory::Cell } else { XfCategory::CellStyle };
        let Some(mut xf) = self.factory.styles().and_then(|s| s.start_xf(category)) else { return };
        if let Some(font) = self.cur_font.take() {
            xf.set_font(font.commit());
        }
        if let Some(fill) = self.cur_fill.take() {
            xf.set_fill(fill.commit());
        }
        if let Some(border) = self.cur_border.take() {
            xf.set_border(border.commit());
        }
        if let Some(id) = self.pending_protection_id.take() {
            xf.set_protection(id);
        }
        if let Some(id) = number_format {
            xf.set_number_format(id);
        }
        if let Some(parent) = parent_xf {
            xf.set_style_xf(parent);
        }
        xf.set_horizontal_alignment(self.cur_hor_align);
        xf.set_vertical_alignment(self.cur_ver_align);
        xf.set_wrap_text(self.cur_wrap_text);
        xf.set_shrink_to_fit(self.cur_shrink_to_fit);
        let xf_id = xf.commit();

        if self.automatic {
            self.catalog.borrow_mut().cell_xf_by_name.insert(name, xf_id);
        } else {
            self.catalog.borrow_mut().cell_xf_by_name.insert(name.clone(), xf_id);
            if let Some(mut cell_style) = self.factory.styles().and_then(|s| s.start_cell_style()) {
                cell_style.set_name(&name);
                if let Some(display) = &self.cur_display_name {
                    cell_style.set_display_name(display);
                }
                cell_style.set_xf(xf_id);
                if let Some(parent) = &self.cur_parent_name {
                    cell_style.set_parent_name(parent);
                }
                cell_style.commit();
            }
        }
    }

    /// Best-effort number-format code: Orcus's real component grammar
    /// (`odf_number_format_context.cpp`) wasn't available to ground this
    /// against, so each component element contributes a representative
    /// placeholder token and literal `<number:text>` runs pass through
    /// verbatim — enough to round-trip a readable code string even if it
    /// doesn't reproduce every locale-specific component Orcus emits.
    fn start_number_component(&mut self, local: &str) {
        if !self.in_number_style {
            return;
        }
        let token = match local {
            "number" => "0",
            "day" => "DD",
            "month" => "MM",
            "year" => "YYYY",
            "hours" => "HH",
            "minutes" => "MM",
            "seconds" => "SS",
            "am-pm" => "AM/PM",
            "boolean" => "BOOLEAN",
            _ => return,
        };
        self.cur_number_code.push_str(token);
    }

    fn end_number_style(&mut self) {
        self.in_number_style = false;
        let Some(name) = self.cur_number_style_name.take() else { return };
        if name.is_empty() || self.cur_number_code.is_empty() {
            log::warn!("ods: number style with empty name or code, skipping");
            self.cur_number_code.clear();
            return;
        }
        let Some(mut nf) = self.factory.styles().and_then(|s| s.start_number_format()) else {
            self.cur_number_code.clear();
            return;
        };
        nf.set_code(&self.cur_number_code);
        let id = nf.commit();
        self.catalog.borrow_mut().number_format_by_name.insert(name, id);
        self.cur_number_code.clear();
    }
}

fn number_family_token(tokens: &TokenMap, t: TokenId) -> bool {
    for name in ["number-style", "currency-style", "percentage-style", "date-style", "time-style", "boolean-style", "text-style"] {
        if t == tok(tokens, name) {
            return true;
        }
    }
    false
}

impl<'a> Context for StylesContext<'a> {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }

    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(&self.tokens, "automatic-styles") {
            self.automatic = true;
        } else if t == tok(&self.tokens, "styles") {
            self.automatic = false;
        } else if t == tok(&self.tokens, "style") {
            self.start_style(attrs);
        } else if t == tok(&self.tokens, "table-column-properties") {
            self.start_column_properties(attrs);
        } else if t == tok(&self.tokens, "table-row-properties") {
            self.start_row_properties(attrs);
        } else if t == tok(&self.tokens, "paragraph-properties") {
            self.start_paragraph_properties(attrs);
        } else if t == tok(&self.tokens, "text-properties") {
            self.start_text_properties(attrs);
        } else if t == tok(&self.tokens, "table-cell-properties") {
            self.start_cell_properties(attrs);
        } else if number_family_token(&self.tokens, t) {
            self.in_number_style = true;
            self.cur_number_style_name = attr_str(attrs, &self.tokens, "name").map(str::to_string);
            self.cur_number_code.clear();
        } else if t == tok(&self.tokens, "number")
            || t == tok(&self.tokens, "day")
            || t == tok(&self.tokens, "month")
            || t == tok(&self.tokens, "year")
            || t == tok(&self.tokens, "hours")
            || t == tok(&self.tokens, "minutes")
            || t == tok(&self.tokens, "seconds")
            || t == tok(&self.tokens, "am-pm")
            || t == tok(&self.tokens, "boolean")
        {
            let local = ["number", "day", "month", "year", "hours", "minutes", "seconds", "am-pm", "boolean"]
                .into_iter()
                .find(|n| t == tok(&self.tokens, n))
                .unwrap_or("");
            self.start_number_component(local);
        }
    }

    fn end_element(&mut self, name: ElementName) -> bool {
        let t = name.token;
        if t == tok(&self.tokens, "style") {
            self.end_style();
            false
        } else if number_family_token(&self.tokens, t) {
            self.end_number_style();
            false
        } else if t == tok(&self.tokens, "automatic-styles") || t == tok(&self.tokens, "styles") {
            // Signals the framework to pop this context when it was
            // pushed as a child of `content.xml`'s own context; when
            // this context is itself the SAX root (standalone
            // `styles.xml`), `ContextStack::into_root` never pops the
            // last frame, so returning `true` here is harmless there too.
            true
        } else {
            false
        }
    }

    fn characters(&mut self, value: crate::strings::StrView<'_>, _transient: bool) {
        if self.in_number_style {
            if let Some(text) = value.as_str() {
                self.cur_number_code.push_str(text);
            }
        }
    }
}
