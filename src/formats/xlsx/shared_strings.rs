//! `xl/sharedStrings.xml` handler (spec §4.10 "xlsx"), grounded on
//! `xlsx_sheet_context.{hpp,cpp}`'s shared-strings table handling.
//!
//! Each `<si>` produces exactly one committed string id, in document
//! order, so the returned `Vec<u32>` is indexable by the `t="s"` cell
//! value text directly. A plain `<si><t>...</t></si>` goes through
//! [`SharedStrings::append`] (no dedup: this index mapping must stay
//! 1:1 with the part's `<si>` entries); a rich-text `<si><r>...</r>...</si>`
//! goes through [`SharedStrings::start_segments`] instead.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::import::types::Argb;
use crate::import::{ImportFactory, SharedStringSegments, SharedStrings};
use crate::strings::StrView;
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};

const ELEMENTS: &[&str] = &[
    "sst", "si", "r", "rPr", "t", "b", "i", "sz", "color", "rFont", "val", "rgb",
];

pub fn build_tokens() -> TokenMap {
    TokenMap::new(ELEMENTS)
}

pub fn parse_shared_strings(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<Vec<u32>> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_tokens();
    let mut ctx = SharedStringsContext::new(factory, &tokens);
    {
        let mut stack = crate::context::ContextStack::new(Box::new(SharedStringsRoot { inner: &mut ctx }));
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

fn parse_argb(text: &str) -> Option<Argb> {
    let text = text.trim_start_matches('#');
    if text.len() != 8 {
        return None;
    }
    let a = u8::from_str_radix(&text[0..2], 16).ok()?;
    let r = u8::from_str_radix(&text[2..4], 16).ok()?;
    let g = u8::from_str_radix(&text[4..6], 16).ok()?;
    let b = u8::from_str_radix(&text[6..8], 16).ok()?;
    Some(Argb::new(a, r, g, b))
}

struct SharedStringsContext<'a> {
    factory: &'a mut dyn ImportFactory,
    tokens: &'a TokenMap,
    ids: Vec<u32>,

    is_rich: bool,
    segments: Option<Box<dyn SharedStringSegments>>,
    plain_text: String,
    run_text: String,
    in_t: bool,
    run_bold: bool,
    run_italic: bool,
    run_font_name: Option<String>,
    run_size: Option<f64>,
    run_color: Option<Argb>,
}

impl<'a> SharedStringsContext<'a> {
    fn new(factory: &'a mut dyn ImportFactory, tokens: &'a TokenMap) -> Self {
        SharedStringsContext {
            factory,
            tokens,
            ids: Vec::new(),
            is_rich: false,
            segments: None,
            plain_text: String::new(),
            run_text: String::new(),
            in_t: false,
            run_bold: false,
            run_italic: false,
            run_font_name: None,
            run_size: None,
            run_color: None,
        }
    }

    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "si") {
            self.is_rich = false;
            self.segments = None;
            self.plain_text.clear();
        } else if t == tok(self.tokens, "r") {
            self.is_rich = true;
            self.run_text.clear();
            self.run_bold = false;
            self.run_italic = false;
            self.run_font_name = None;
            self.run_size = None;
            self.run_color = None;
            if self.segments.is_none() {
                self.segments = self.factory.shared_strings().map(|s| s.start_segments());
            }
        } else if t == tok(self.tokens, "b") {
            self.run_bold = true;
        } else if t == tok(self.tokens, "i") {
            self.run_italic = true;
        } else if t == tok(self.tokens, "sz") {
            if let Some(sz) = attr_f64(attrs, self.tokens, "val") {
                self.run_size = Some(sz);
            }
        } else if t == tok(self.tokens, "rFont") {
            if let Some(name) = attr_str(attrs, self.tokens, "val") {
                self.run_font_name = Some(name.to_string());
            }
        } else if t == tok(self.tokens, "color") {
            if let Some(c) = attr_str(attrs, self.tokens, "rgb").and_then(parse_argb) {
                self.run_color = Some(c);
            }
        } else if t == tok(self.tokens, "t") {
            self.in_t = true;
        }
    }

    fn end(&mut self, name: ElementName) {
        let t = name.token;
        if t == tok(self.tokens, "t") {
            self.in_t = false;
        } else if t == tok(self.tokens, "r") {
            if let Some(seg) = &mut self.segments {
                seg.set_segment_bold(self.run_bold);
                seg.set_segment_italic(self.run_italic);
                if let Some(name) = &self.run_font_name {
                    seg.set_segment_font_name(name);
                }
                if let Some(sz) = self.run_size {
                    seg.set_segment_font_size(sz);
                }
                if let Some(c) = self.run_color {
                    seg.set_segment_font_color(c);
                }
                seg.append_segment(&self.run_text);
            }
        } else if t == tok(self.tokens, "si") {
            let id = if self.is_rich {
                match self.segments.take() {
                    Some(seg) => seg.commit_segments(),
                    None => self.factory.shared_strings().map(|s| s.append("")).unwrap_or(0),
                }
            } else {
                self.factory.shared_strings().map(|s| s.append(&self.plain_text)).unwrap_or(0)
            };
            self.ids.push(id);
        }
    }

    fn characters(&mut self, value: StrView<'_>) {
        if !self.in_t {
            return;
        }
        let text = value.as_str().unwrap_or("");
        if self.is_rich {
            self.run_text.push_str(text);
        } else {
            self.plain_text.push_str(text);
        }
    }
}

struct SharedStringsRoot<'a, 'b> {
    inner: &'a mut SharedStringsContext<'b>,
}

impl<'a, 'b> Context for SharedStringsRoot<'a, 'b> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingStrings {
        values: Vec<String>,
    }
    impl SharedStrings for RecordingStrings {
        fn add(&mut self, value: &str) -> u32 {
            self.append(value)
        }
        fn append(&mut self, value: &str) -> u32 {
            self.values.push(value.to_string());
            (self.values.len() - 1) as u32
        }
        fn start_segments(&mut self) -> Box<dyn SharedStringSegments> {
            Box::new(RecordingSegments { text: String::new() })
        }
    }

    struct RecordingSegments {
        text: String,
    }
    impl SharedStringSegments for RecordingSegments {
        fn append_segment(&mut self, text: &str) {
            self.text.push_str(text);
        }
        fn commit_segments(self: Box<Self>) -> u32 {
            100
        }
    }

    #[derive(Default)]
    struct StubFactory {
        strings: RecordingStrings,
    }
    impl ImportFactory for StubFactory {
        fn shared_strings(&mut self) -> Option<&mut dyn SharedStrings> {
            Some(&mut self.strings)
        }
    }

    #[test]
    fn plain_and_rich_strings_map_index_to_committed_id() {
        let xml = br#"<sst><si><t>hello</t></si><si><r><rPr><b/></rPr><t>wor</t></r><r><t>ld</t></r></si></sst>"#;
        let mut factory = StubFactory::default();
        let ids = parse_shared_strings(xml, &mut factory).unwrap();
        assert_eq!(ids, vec![0, 100]);
        assert_eq!(factory.strings.values, vec!["hello".to_string()]);
    }
}
