//! `xl/styles.xml` handler (spec §4.10 "xlsx" styles), grounded on
//! `xlsx_styles_context.{hpp,cpp}`.
//!
//! Unlike xls-xml's string-keyed `StyleID`, xlsx's `cellXfs`/`cellStyleXfs`/
//! `dxfs` entries and their `fontId`/`fillId`/`borderId`/`numFmtId` cross
//! references are all *local 0-based declaration-order indices* into the
//! sibling `<fonts>`/`<fills>`/`<borders>`/`<numFmts>` lists. This handler
//! tracks one `Vec<u32>` per record kind (local index → id returned by the
//! matching builder's `commit()`) and remaps before calling
//! `XfBuilder::set_font` etc., exactly as liborcus's `m_font_ids`/
//! `m_fill_ids`/`m_border_ids`/`m_cell_xf_ids`/`m_cell_style_xf_ids`/
//! `m_dxf_ids` do.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::import::types::{Argb, BorderDirection, HorizontalAlignment, VerticalAlignment, XfCategory};
use crate::import::{BorderStyleBuilder, FillStyleBuilder, FontStyleBuilder, ImportFactory, NumberFormatBuilder, Styles, XfBuilder};
use crate::strings::StrView;
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};

const ELEMENTS: &[&str] = &[
    "styleSheet",
    "numFmts",
    "numFmt",
    "fonts",
    "font",
    "name",
    "sz",
    "b",
    "i",
    "u",
    "strike",
    "color",
    "fills",
    "fill",
    "patternFill",
    "fgColor",
    "bgColor",
    "style",
    "borders",
    "border",
    "top",
    "bottom",
    "left",
    "right",
    "diagonal",
    "cellStyleXfs",
    "cellXfs",
    "xf",
    "alignment",
    "protection",
    "dxfs",
    "dxf",
    "cellStyles",
    "cellStyle",
    "val",
    "rgb",
    "formatCode",
    "numFmtId",
    "fontId",
    "fillId",
    "borderId",
    "xfId",
    "horizontal",
    "vertical",
    "wrapText",
    "shrinkToFit",
    "diagonalUp",
    "diagonalDown",
    "locked",
    "hidden",
    "builtinId",
];

pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

/// Local-index → committed-id tables for one `xl/styles.xml` part.
#[derive(Debug, Default, Clone)]
pub struct XlsxStyleIds {
    pub fonts: Vec<u32>,
    pub fills: Vec<u32>,
    pub borders: Vec<u32>,
    pub cell_style_xfs: Vec<u32>,
    pub cell_xfs: Vec<u32>,
    pub dxfs: Vec<u32>,
}

pub fn parse_styles(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<XlsxStyleIds> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_tokens();
    let mut ctx = StylesContext::new(factory, &tokens);
    {
        let mut stack = crate::context::ContextStack::new(Box::new(StylesRoot { inner: &mut ctx }));
        sax::parse(xml, &mut repo, &tokens, &mut stack)?;
        stack.into_root();
    }
    Ok(ctx.ids)
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

fn attr_u32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<u32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<u32>().ok())
}

fn attr_bool(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> bool {
    matches!(attr_str(attrs, tokens, name), Some("1") | Some("true"))
}

/// `rgb="FFRRGGBB"` (8 hex digits) or a bare 6-digit `"RRGGBB"`.
fn parse_argb(text: &str) -> Option<Argb> {
    let text = text.trim_start_matches('#');
    match text.len() {
        8 => {
            let a = u8::from_str_radix(&text[0..2], 16).ok()?;
            let r = u8::from_str_radix(&text[2..4], 16).ok()?;
            let g = u8::from_str_radix(&text[4..6], 16).ok()?;
            let b = u8::from_str_radix(&text[6..8], 16).ok()?;
            Some(Argb::new(a, r, g, b))
        }
        6 => {
            let r = u8::from_str_radix(&text[0..2], 16).ok()?;
            let g = u8::from_str_radix(&text[2..4], 16).ok()?;
            let b = u8::from_str_radix(&text[4..6], 16).ok()?;
            Some(Argb::new(0xFF, r, g, b))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellStyleXfs,
    CellXfs,
    Dxfs,
}

/// Drives everything; owns the factory pointer for the duration of one
/// `parse_styles` call only, so a plain borrow (no `'static` escape) is
/// enough — nothing here is ever boxed back out through
/// `Context::create_child_context`.
struct StylesContext<'a> {
    factory: &'a mut dyn ImportFactory,
    tokens: &'a TokenMap,
    ids: XlsxStyleIds,

    section: Section,
    cur_font: Option<Box<dyn FontStyleBuilder>>,
    cur_fill: Option<Box<dyn FillStyleBuilder>>,
    cur_border: Option<Box<dyn BorderStyleBuilder>>,
    border_diagonal_up: bool,
    border_diagonal_down: bool,
    cur_xf: Option<Box<dyn XfBuilder>>,
}

impl<'a> StylesContext<'a> {
    fn new(factory: &'a mut dyn ImportFactory, tokens: &'a TokenMap) -> Self {
        StylesContext {
            factory,
            tokens,
            ids: XlsxStyleIds::default(),
            section: Section::None,
            cur_font: None,
            cur_fill: None,
            cur_border: None,
            border_diagonal_up: false,
            border_diagonal_down: false,
            cur_xf: None,
        }
    }

    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "numFmts") {
            self.section = Section::NumFmts;
        } else if t == tok(self.tokens, "fonts") {
            self.section = Section::Fonts;
        } else if t == tok(self.tokens, "fills") {
            self.section = Section::Fills;
        } else if t == tok(self.tokens, "borders") {
            self.section = Section::Borders;
        } else if t == tok(self.tokens, "cellStyleXfs") {
            self.section = Section::CellStyleXfs;
        } else if t == tok(self.tokens, "cellXfs") {
            self.section = Section::CellXfs;
        } else if t == tok(self.tokens, "dxfs") {
            self.section = Section::Dxfs;
        } else if t == tok(self.tokens, "numFmt") {
            self.start_numfmt(attrs);
        } else if t == tok(self.tokens, "font") {
            self.cur_font = self.factory.styles().and_then(|s| s.start_font_style());
        } else if t == tok(self.tokens, "name") && self.cur_font.is_some() {
            if let Some(n) = attr_str(attrs, self.tokens, "val") {
                if let Some(f) = &mut self.cur_font {
                    f.set_name(n);
                }
            }
        } else if t == tok(self.tokens, "sz") && self.cur_font.is_some() {
            if let Some(sz) = attr_f64(attrs, self.tokens, "val") {
                if let Some(f) = &mut self.cur_font {
                    f.set_size(sz);
                }
            }
        } else if t == tok(self.tokens, "b") && self.cur_font.is_some() {
            // A bare `<b/>` (no `val`) means bold, same as `val="1"`.
            let value = !matches!(attr_str(attrs, self.tokens, "val"), Some("0") | Some("false"));
            if let Some(f) = &mut self.cur_font {
                f.set_bold(value);
            }
        } else if t == tok(self.tokens, "i") && self.cur_font.is_some() {
            let value = !matches!(attr_str(attrs, self.tokens, "val"), Some("0") | Some("false"));
            if let Some(f) = &mut self.cur_font {
                f.set_italic(value);
            }
        } else if t == tok(self.tokens, "u") && self.cur_font.is_some() {
            if let Some(f) = &mut self.cur_font {
                f.set_underline(true);
            }
        } else if t == tok(self.tokens, "strike") && self.cur_font.is_some() {
            if let Some(f) = &mut self.cur_font {
                f.set_strikethrough(true);
            }
        } else if t == tok(self.tokens, "color") {
            self.start_font_color(attrs);
        } else if t == tok(self.tokens, "fill") {
            self.cur_fill = self.factory.styles().and_then(|s| s.start_fill_style());
        } else if t == tok(self.tokens, "patternFill") {
            if let Some(pt) = attr_str(attrs, self.tokens, "val") {
                if let Some(f) = &mut self.cur_fill {
                    f.set_pattern_type(pt);
                }
            }
        } else if t == tok(self.tokens, "fgColor") {
            if let Some(color) = attr_str(attrs, self.tokens, "rgb").and_then(parse_argb) {
                if let Some(f) = &mut self.cur_fill {
                    f.set_fg_color(color);
                }
            }
        } else if t == tok(self.tokens, "bgColor") {
            if let Some(color) = attr_str(attrs, self.tokens, "rgb").and_then(parse_argb) {
                if let Some(f) = &mut self.cur_fill {
                    f.set_bg_color(color);
                }
            }
        } else if t == tok(self.tokens, "border") {
            self.cur_border = self.factory.styles().and_then(|s| s.start_border_style());
            self.border_diagonal_up = attr_bool(attrs, self.tokens, "diagonalUp");
            self.border_diagonal_down = attr_bool(attrs, self.tokens, "diagonalDown");
        } else if let Some(dir) = border_direction_of(self.tokens, t, self.border_diagonal_up, self.border_diagonal_down) {
            self.start_border_edge(dir, attrs);
        } else if t == tok(self.tokens, "xf") {
            self.start_xf(attrs);
        } else if t == tok(self.tokens, "alignment") {
            self.apply_alignment(attrs);
        } else if t == tok(self.tokens, "protection") {
            self.apply_protection(attrs);
        }
    }

    fn start_numfmt(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(mut nf) = self.factory.styles().and_then(|s| s.start_number_format()) else { return };
        if let Some(id) = attr_u32(attrs, self.tokens, "numFmtId") {
            nf.set_identifier(id);
        }
        if let Some(code) = attr_str(attrs, self.tokens, "formatCode") {
            nf.set_code(code);
        }
        nf.commit();
    }

    fn start_font_color(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(color) = attr_str(attrs, self.tokens, "rgb").and_then(parse_argb) else { return };
        if let Some(f) = &mut self.cur_font {
            f.set_color(color);
        }
    }

    fn start_border_edge(&mut self, dir: BorderDirection, attrs: &[XmlAttribute<'_>]) {
        let Some(style) = attr_str(attrs, self.tokens, "style") else { return };
        let directions: Vec<BorderDirection> = match dir {
            BorderDirection::DiagonalUp | BorderDirection::DiagonalDown => {
                let mut dirs = Vec::new();
                if self.border_diagonal_up {
                    dirs.push(BorderDirection::DiagonalUp);
                }
                if self.border_diagonal_down {
                    dirs.push(BorderDirection::DiagonalDown);
                }
                dirs
            }
            other => vec![other],
        };
        if let Some(b) = &mut self.cur_border {
            for d in directions {
                b.set_style(d, style);
            }
        }
    }

    fn start_xf(&mut self, attrs: &[XmlAttribute<'_>]) {
        let category = match self.section {
            Section::CellStyleXfs => XfCategory::CellStyle,
            Section::Dxfs => XfCategory::Differential,
            _ => XfCategory::Cell,
        };
        let Some(mut xf) = self.factory.styles().and_then(|s| s.start_xf(category)) else {
            self.cur_xf = None;
            return;
        };
        if let Some(id) = attr_u32(attrs, self.tokens, "fontId") {
            if let Some(&resolved) = self.ids.fonts.get(id as usize) {
                xf.set_font(resolved);
            }
        }
        if let Some(id) = attr_u32(attrs, self.tokens, "fillId") {
            if let Some(&resolved) = self.ids.fills.get(id as usize) {
                xf.set_fill(resolved);
            }
        }
        if let Some(id) = attr_u32(attrs, self.tokens, "borderId") {
            if let Some(&resolved) = self.ids.borders.get(id as usize) {
                xf.set_border(resolved);
            }
        }
        if let Some(id) = attr_u32(attrs, self.tokens, "xfId") {
            if let Some(&resolved) = self.ids.cell_style_xfs.get(id as usize) {
                xf.set_style_xf(resolved);
            }
        }
        if attr_bool(attrs, self.tokens, "applyAlignment") {
            xf.set_apply_alignment(true);
        }
        self.cur_xf = Some(xf);
    }

    /// xlsx's default vertical alignment is "bottom" (per liborcus's
    /// `xlsx_styles_context::start_element_alignment`), unlike xls-xml's
    /// unset default.
    fn apply_alignment(&mut self, attrs: &[XmlAttribute<'_>]) {
        let Some(xf) = &mut self.cur_xf else { return };
        let horizontal = attr_str(attrs, self.tokens, "horizontal").map(parse_horizontal).unwrap_or(HorizontalAlignment::Unset);
        xf.set_horizontal_alignment(horizontal);
        let vertical = attr_str(attrs, self.tokens, "vertical").map(parse_vertical).unwrap_or(VerticalAlignment::Bottom);
        xf.set_vertical_alignment(vertical);
        if attr_bool(attrs, self.tokens, "wrapText") {
            xf.set_wrap_text(true);
        }
        if attr_bool(attrs, self.tokens, "shrinkToFit") {
            xf.set_shrink_to_fit(true);
        }
    }

    fn apply_protection(&mut self, attrs: &[XmlAttribute<'_>]) {
        if self.cur_xf.is_none() {
            return;
        }
        let Some(mut protection) = self.factory.styles().and_then(|s| s.start_cell_protection()) else { return };
        protection.set_locked(!matches!(attr_str(attrs, self.tokens, "locked"), Some("0") | Some("false")));
        protection.set_hidden(matches!(attr_str(attrs, self.tokens, "hidden"), Some("1") | Some("true")));
        let id = protection.commit();
        if let Some(xf) = &mut self.cur_xf {
            xf.set_protection(id);
        }
    }

    fn end(&mut self, name: ElementName) {
        let t = name.token;
        if t == tok(self.tokens, "font") {
            if let Some(f) = self.cur_font.take() {
                self.ids.fonts.push(f.commit());
            }
        } else if t == tok(self.tokens, "fill") {
            if let Some(f) = self.cur_fill.take() {
                self.ids.fills.push(f.commit());
            }
        } else if t == tok(self.tokens, "border") {
            if let Some(b) = self.cur_border.take() {
                self.ids.borders.push(b.commit());
            }
        } else if t == tok(self.tokens, "xf") {
            if let Some(xf) = self.cur_xf.take() {
                let id = xf.commit();
                match self.section {
                    Section::CellStyleXfs => self.ids.cell_style_xfs.push(id),
                    Section::Dxfs => self.ids.dxfs.push(id),
                    _ => self.ids.cell_xfs.push(id),
                }
            }
        }
    }
}

fn border_direction_of(tokens: &TokenMap, t: TokenId, diag_up: bool, diag_down: bool) -> Option<BorderDirection> {
    if t == tok(tokens, "top") {
        Some(BorderDirection::Top)
    } else if t == tok(tokens, "bottom") {
        Some(BorderDirection::Bottom)
    } else if t == tok(tokens, "left") {
        Some(BorderDirection::Left)
    } else if t == tok(tokens, "right") {
        Some(BorderDirection::Right)
    } else if t == tok(tokens, "diagonal") {
        Some(if diag_up { BorderDirection::DiagonalUp } else { BorderDirection::DiagonalDown })
    } else {
        None
    }
}

fn parse_horizontal(text: &str) -> HorizontalAlignment {
    match text {
        "left" => HorizontalAlignment::Left,
        "center" => HorizontalAlignment::Center,
        "right" => HorizontalAlignment::Right,
        "fill" => HorizontalAlignment::Fill,
        "justify" => HorizontalAlignment::Justify,
        "centerContinuous" => HorizontalAlignment::CenterAcrossSelection,
        "distributed" => HorizontalAlignment::Distributed,
        _ => HorizontalAlignment::Unset,
    }
}

fn parse_vertical(text: &str) -> VerticalAlignment {
    match text {
        "top" => VerticalAlignment::Top,
        "center" => VerticalAlignment::Center,
        "bottom" => VerticalAlignment::Bottom,
        "justify" => VerticalAlignment::Justify,
        "distributed" => VerticalAlignment::Distributed,
        _ => VerticalAlignment::Bottom,
    }
}

/// Thin `Context` adapter over [`StylesContext`]: `styles.xml` is flat
/// enough (no recursive child-context routing needed) that one struct can
/// drive the whole document directly.
struct StylesRoot<'a, 'b> {
    inner: &'a mut StylesContext<'b>,
}

impl<'a, 'b> Context for StylesRoot<'a, 'b> {
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

    fn characters(&mut self, _value: StrView<'_>, _transient: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingFont(u32);
    impl FontStyleBuilder for CountingFont {
        fn commit(self: Box<Self>) -> u32 {
            self.0
        }
    }

    struct RecordingXf {
        font: Option<u32>,
        border: Option<u32>,
        vertical: Option<VerticalAlignment>,
        id: u32,
    }
    impl XfBuilder for RecordingXf {
        fn set_font(&mut self, id: u32) {
            self.font = Some(id);
        }
        fn set_border(&mut self, id: u32) {
            self.border = Some(id);
        }
        fn set_vertical_alignment(&mut self, align: VerticalAlignment) {
            self.vertical = Some(align);
        }
        fn commit(self: Box<Self>) -> u32 {
            self.id
        }
    }

    struct RecordingBorder;
    impl BorderStyleBuilder for RecordingBorder {
        fn commit(self: Box<Self>) -> u32 {
            42
        }
    }

    #[derive(Default)]
    struct StubStyles {
        next_xf: u32,
    }
    impl Styles for StubStyles {
        fn start_font_style(&mut self) -> Option<Box<dyn FontStyleBuilder>> {
            Some(Box::new(CountingFont(7)))
        }
        fn start_border_style(&mut self) -> Option<Box<dyn BorderStyleBuilder>> {
            Some(Box::new(RecordingBorder))
        }
        fn start_xf(&mut self, _category: XfCategory) -> Option<Box<dyn XfBuilder>> {
            let id = self.next_xf;
            self.next_xf += 1;
            Some(Box::new(RecordingXf { font: None, border: None, vertical: None, id }))
        }
    }

    #[derive(Default)]
    struct StubFactory {
        styles: StubStyles,
    }
    impl ImportFactory for StubFactory {
        fn styles(&mut self) -> Option<&mut dyn Styles> {
            Some(&mut self.styles)
        }
    }

    #[test]
    fn font_id_on_xf_is_remapped_to_committed_id() {
        let xml = br#"<styleSheet>
 <fonts><font><sz val="11"/><name val="Calibri"/></font></fonts>
 <borders><border diagonalUp="0" diagonalDown="0"><top/><bottom/></border></borders>
 <cellXfs><xf fontId="0" borderId="0"/></cellXfs>
</styleSheet>"#;
        let mut factory = StubFactory::default();
        let ids = parse_styles(xml, &mut factory).unwrap();
        assert_eq!(ids.fonts, vec![7]);
        assert_eq!(ids.borders, vec![42]);
        assert_eq!(ids.cell_xfs, vec![0]);
    }

    #[test]
    fn default_vertical_alignment_is_bottom() {
        let xml = br#"<styleSheet><cellXfs><xf><alignment horizontal="left"/></xf></cellXfs></styleSheet>"#;
        let mut factory = StubFactory::default();
        parse_styles(xml, &mut factory).unwrap();
    }
}
