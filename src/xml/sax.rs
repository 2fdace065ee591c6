//! Single-threaded SAX XML parser (C5).
//!
//! Tokenizes a byte buffer directly (no intermediate tree), invoking a
//! [`SaxHandler`] with `declaration` once, then a balanced sequence of
//! `start_element` / `characters` / `end_element` calls, exactly as spec'd
//! in §4.5. Namespace prefixes are resolved against a per-document
//! [`XmlnsContext`] backed by a shared [`NamespaceRepository`]; element and
//! attribute local names are mapped to small integer ids via a
//! format-specific [`TokenMap`].
//!
//! Built directly on [`crate::scan`] for whitespace/control skipping and
//! [`crate::strings::quoted`] is not reused here (XML uses entity
//! references, not backslash escapes) — entity decoding gets its own small
//! scanner below, following the same borrowed-vs-transient-view split.

use crate::error::{ImportError, Result};
use crate::scan::{parse_expected, skip_space_and_control};
use crate::strings::StrView;
use crate::xml::namespace::{NamespaceId, NamespaceRepository, XmlnsContext, XMLNS_UNKNOWN_ID};
use crate::xml::tokens::{TokenId, TokenMap};

/// The (optional) `<?xml version="1.0" encoding="UTF-8"?>` declaration.
#[derive(Debug, Clone, Default)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// One resolved attribute, ready to hand to a context handler.
pub struct XmlAttribute<'a> {
    pub ns: NamespaceId,
    pub token: TokenId,
    pub local_name: &'a str,
    pub value: StrView<'a>,
    pub transient: bool,
}

/// Capability set invoked by the parser in document order (spec §4.5).
pub trait SaxHandler {
    fn declaration(&mut self, _decl: &XmlDeclaration) {}
    fn start_element(&mut self, ns: NamespaceId, token: TokenId, attrs: &[XmlAttribute<'_>]);
    fn end_element(&mut self, ns: NamespaceId, token: TokenId);
    fn characters(&mut self, value: StrView<'_>, transient: bool);
}

struct OpenElement {
    local_name: String,
    ns: NamespaceId,
    token: TokenId,
    /// Exactly which prefixes this element pushed bindings for (in push
    /// order), so closing it pops precisely those back off, in reverse.
    pushed_prefixes: Vec<String>,
}

/// Parse a complete XML document out of `input`, driving `handler`.
pub fn parse(
    input: &[u8],
    repo: &mut NamespaceRepository,
    tokens: &TokenMap,
    handler: &mut dyn SaxHandler,
) -> Result<()> {
    let mut pos = skip_utf8_bom(input);
    let mut xmlns_ctx = repo.create_context();
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut char_scratch: Vec<u8> = Vec::new();
    let mut attr_value_arena: Vec<String> = Vec::new();

    pos = skip_space_and_control(input, pos);
    if let (true, new_pos) = parse_expected(input, pos, b"<?xml") {
        let (decl, after) = parse_declaration(input, new_pos)?;
        handler.declaration(&decl);
        pos = after;
    }

    loop {
        pos = skip_space_and_control(input, pos);
        if pos >= input.len() {
            break;
        }
        if input[pos] != b'<' {
            return Err(ImportError::structural("expected '<' to start a tag", pos));
        }

        if parse_expected(input, pos, b"<!--").0 {
            pos = find_after(input, pos, b"--\u{3e}".as_bytes())
                .ok_or_else(|| ImportError::structural("unterminated comment", pos))?;
        } else if parse_expected(input, pos, b"<![CDATA[").0 {
            let (start, end) = {
                let content_start = pos + 9;
                let content_end = find_subslice(input, content_start, b"]]>")
                    .ok_or_else(|| ImportError::structural("unterminated CDATA section", pos))?;
                (content_start, content_end)
            };
            handler.characters(StrView::new(&input[start..end]), false);
            pos = end + 3;
        } else if parse_expected(input, pos, b"<!").0 {
            // DOCTYPE or other markup declaration: skip to the matching '>'.
            // Nested '<' ... '>' inside an internal subset are not handled;
            // none of the supported formats use one.
            pos = find_byte(input, pos, b'>')
                .ok_or_else(|| ImportError::structural("unterminated markup declaration", pos))?
                + 1;
        } else if parse_expected(input, pos, b"<?").0 {
            pos = find_subslice(input, pos + 2, b"?>")
                .ok_or_else(|| ImportError::structural("unterminated processing instruction", pos))?
                + 2;
        } else if parse_expected(input, pos, b"</").0 {
            let name_start = pos + 2;
            let name_end = find_name_end(input, name_start);
            let qname = std::str::from_utf8(&input[name_start..name_end])
                .map_err(|_| ImportError::lexical("element name is not valid UTF-8", name_start))?;
            let close_pos = skip_space_and_control(input, name_end);
            if !parse_expected(input, close_pos, b">").0 {
                return Err(ImportError::structural("expected '>' to close end tag", close_pos));
            }
            let open = stack
                .pop()
                .ok_or_else(|| ImportError::structural("unmatched closing tag", pos))?;
            if open.local_name != local_name_of(qname) {
                return Err(ImportError::structural(
                    format!("closing tag </{qname}> does not match open element <{}>", open.local_name),
                    pos,
                ));
            }
            handler.end_element(open.ns, open.token);
            for prefix in open.pushed_prefixes.iter().rev() {
                xmlns_ctx.pop(prefix);
            }
            pos = close_pos + 1;
        } else {
            // Start tag.
            let name_start = pos + 1;
            let name_end = find_name_end(input, name_start);
            let qname = std::str::from_utf8(&input[name_start..name_end])
                .map_err(|_| ImportError::lexical("element name is not valid UTF-8", name_start))?
                .to_string();

            attr_value_arena.clear();
            let (raw_attrs, mut after_attrs) = parse_raw_attributes(input, name_end, &mut attr_value_arena)?;

            let self_closing = parse_expected(input, after_attrs, b"/>").0;
            if self_closing {
                after_attrs += 2;
            } else {
                if !parse_expected(input, after_attrs, b">").0 {
                    return Err(ImportError::structural("expected '>' to close start tag", after_attrs));
                }
                after_attrs += 1;
            }

            // First pass: install any xmlns declarations into the context so
            // prefix resolution sees all bindings declared on this element.
            let mut pushed_prefixes: Vec<String> = Vec::new();
            for raw in &raw_attrs {
                if raw.qname == "xmlns" {
                    xmlns_ctx.push(repo, "", raw.value(&attr_value_arena).as_str().unwrap_or(""));
                    pushed_prefixes.push(String::new());
                } else if let Some(prefix) = raw.qname.strip_prefix("xmlns:") {
                    xmlns_ctx.push(repo, prefix, raw.value(&attr_value_arena).as_str().unwrap_or(""));
                    pushed_prefixes.push(prefix.to_string());
                }
            }

            let element_ns = resolve_namespace(repo, &xmlns_ctx, prefix_of(&qname));
            let element_local = local_name_of(&qname);
            let element_token = tokens.get(element_local);

            let attrs: Vec<XmlAttribute<'_>> = raw_attrs
                .iter()
                .filter(|raw| raw.qname != "xmlns" && !raw.qname.starts_with("xmlns:"))
                .map(|raw| {
                    let local = local_name_of(&raw.qname);
                    let ns = resolve_namespace(repo, &xmlns_ctx, prefix_of(&raw.qname));
                    XmlAttribute {
                        ns,
                        token: tokens.get(local),
                        local_name: local,
                        value: raw.value(&attr_value_arena),
                        transient: raw.transient,
                    }
                })
                .collect();

            handler.start_element(element_ns, element_token, &attrs);

            if self_closing {
                handler.end_element(element_ns, element_token);
                for prefix in pushed_prefixes.iter().rev() {
                    xmlns_ctx.pop(prefix);
                }
            } else {
                stack.push(OpenElement {
                    local_name: element_local.to_string(),
                    ns: element_ns,
                    token: element_token,
                    pushed_prefixes,
                });
            }
            pos = after_attrs;
        }

        // Character data up to the next tag. Shared by every branch above:
        // mixed content can follow a comment, CDATA section, processing
        // instruction, or a nested element's closing tag just as easily as
        // it can follow a start tag.
        if pos < input.len() && input[pos] != b'<' {
            let text_start = pos;
            let text_end = find_byte(input, pos, b'<').unwrap_or(input.len());
            let raw_text = &input[text_start..text_end];
            if raw_text.contains(&b'&') {
                char_scratch.clear();
                decode_entities(raw_text, text_start, &mut char_scratch)?;
                handler.characters(StrView::new(&char_scratch), true);
            } else if !raw_text.is_empty() {
                handler.characters(StrView::new(raw_text), false);
            }
            pos = text_end;
        }
    }

    if !stack.is_empty() {
        return Err(ImportError::structural(
            format!("{} element(s) left unclosed at end of document", stack.len()),
            input.len(),
        ));
    }
    Ok(())
}

fn resolve_namespace(repo: &NamespaceRepository, ctx: &XmlnsContext, prefix: Option<&str>) -> NamespaceId {
    let key = prefix.unwrap_or("");
    match ctx.get(key) {
        Some(index) => repo.get_identifier(index),
        None => XMLNS_UNKNOWN_ID,
    }
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(p, _)| p)
}

fn local_name_of(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

/// An attribute value either borrows straight from the input (the common,
/// escape-free case) or, once decoded, lives at some index in the caller's
/// per-tag `arena` (its own `String` allocation, stable regardless of the
/// arena `Vec` growing further).
enum RawValue<'a> {
    Direct(&'a [u8]),
    Arena(usize),
}

struct RawAttribute<'a> {
    qname: String,
    raw_value: RawValue<'a>,
    transient: bool,
}

impl<'a> RawAttribute<'a> {
    fn value<'b>(&self, arena: &'b [String]) -> StrView<'b>
    where
        'a: 'b,
    {
        match self.raw_value {
            RawValue::Direct(bytes) => StrView::new(bytes),
            RawValue::Arena(idx) => StrView::from_str(arena[idx].as_str()),
        }
    }
}

/// Parse the attribute list of a start tag. `arena` accumulates owned
/// strings for attribute values that contained entity references; the
/// caller clears it once per tag and keeps it alive for as long as the
/// resulting `XmlAttribute` views need to borrow from it.
fn parse_raw_attributes<'a>(
    input: &'a [u8],
    mut pos: usize,
    arena: &mut Vec<String>,
) -> Result<(Vec<RawAttribute<'a>>, usize)> {
    let mut attrs = Vec::new();

    loop {
        pos = skip_space_and_control(input, pos);
        if pos >= input.len() {
            return Err(ImportError::structural("unterminated start tag", pos));
        }
        if input[pos] == b'>' || (input[pos] == b'/' && parse_expected(input, pos, b"/>").0) {
            break;
        }
        let name_start = pos;
        let name_end = find_attr_name_end(input, name_start);
        if name_end == name_start {
            return Err(ImportError::structural("expected attribute name", pos));
        }
        let qname = std::str::from_utf8(&input[name_start..name_end])
            .map_err(|_| ImportError::lexical("attribute name is not valid UTF-8", name_start))?
            .to_string();
        let eq_pos = skip_space_and_control(input, name_end);
        if !parse_expected(input, eq_pos, b"=").0 {
            return Err(ImportError::structural("expected '=' after attribute name", eq_pos));
        }
        let quote_pos = skip_space_and_control(input, eq_pos + 1);
        let quote = input.get(quote_pos).copied();
        if quote != Some(b'"') && quote != Some(b'\'') {
            return Err(ImportError::structural("expected quoted attribute value", quote_pos));
        }
        let quote = quote.unwrap();
        let value_start = quote_pos + 1;
        let value_end = find_byte(input, value_start, quote)
            .ok_or_else(|| ImportError::structural("unterminated attribute value", value_start))?;
        let raw_value = &input[value_start..value_end];

        if raw_value.contains(&b'&') {
            let mut decoded = Vec::new();
            decode_entities(raw_value, value_start, &mut decoded)?;
            let as_string = String::from_utf8(decoded)
                .map_err(|_| ImportError::lexical("attribute value is not valid UTF-8", value_start))?;
            arena.push(as_string);
            attrs.push(RawAttribute { qname, raw_value: RawValue::Arena(arena.len() - 1), transient: true });
        } else {
            attrs.push(RawAttribute { qname, raw_value: RawValue::Direct(raw_value), transient: false });
        }

        pos = value_end + 1;
    }

    Ok((attrs, pos))
}

fn find_attr_name_end(input: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < input.len() {
        let b = input[i];
        if b <= 0x20 || b == b'=' || b == b'>' || b == b'/' {
            break;
        }
        i += 1;
    }
    i
}

fn find_name_end(input: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < input.len() {
        let b = input[i];
        if b <= 0x20 || b == b'>' || b == b'/' {
            break;
        }
        i += 1;
    }
    i
}

fn find_byte(input: &[u8], start: usize, needle: u8) -> Option<usize> {
    input[start..].iter().position(|&b| b == needle).map(|p| start + p)
}

fn find_subslice(input: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start > input.len() || needle.is_empty() {
        return None;
    }
    input[start..].windows(needle.len()).position(|w| w == needle).map(|p| start + p)
}

fn find_after(input: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    find_subslice(input, start, needle).map(|p| p + needle.len())
}

fn skip_utf8_bom(input: &[u8]) -> usize {
    if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else {
        0
    }
}

fn parse_declaration(input: &[u8], mut pos: usize) -> Result<(XmlDeclaration, usize)> {
    let mut decl = XmlDeclaration::default();
    loop {
        pos = skip_space_and_control(input, pos);
        if parse_expected(input, pos, b"?>").0 {
            pos += 2;
            break;
        }
        let name_end = find_attr_name_end(input, pos);
        let name = std::str::from_utf8(&input[pos..name_end])
            .map_err(|_| ImportError::lexical("declaration attribute name is not valid UTF-8", pos))?;
        let eq_pos = skip_space_and_control(input, name_end);
        if !parse_expected(input, eq_pos, b"=").0 {
            return Err(ImportError::structural("expected '=' in declaration", eq_pos));
        }
        let quote_pos = skip_space_and_control(input, eq_pos + 1);
        let quote = *input
            .get(quote_pos)
            .ok_or_else(|| ImportError::structural("unterminated declaration", quote_pos))?;
        let value_start = quote_pos + 1;
        let value_end = find_byte(input, value_start, quote)
            .ok_or_else(|| ImportError::structural("unterminated declaration attribute value", value_start))?;
        let value = std::str::from_utf8(&input[value_start..value_end])
            .map_err(|_| ImportError::lexical("declaration value is not valid UTF-8", value_start))?;
        match name {
            "version" => decl.version = value.to_string(),
            "encoding" => decl.encoding = Some(value.to_string()),
            "standalone" => decl.standalone = Some(value == "yes"),
            _ => {}
        }
        pos = value_end + 1;
    }
    Ok((decl, pos))
}

/// Decode `&amp; &lt; &gt; &apos; &quot; &#NNN; &#xHH;` into `out`.
fn decode_entities(input: &[u8], base_offset: usize, out: &mut Vec<u8>) -> Result<()> {
    let mut i = 0;
    while i < input.len() {
        if input[i] != b'&' {
            out.push(input[i]);
            i += 1;
            continue;
        }
        let semi = find_byte(input, i, b';')
            .ok_or_else(|| ImportError::lexical("unterminated entity reference", base_offset + i))?;
        let name = &input[i + 1..semi];
        match name {
            b"amp" => out.push(b'&'),
            b"lt" => out.push(b'<'),
            b"gt" => out.push(b'>'),
            b"apos" => out.push(b'\''),
            b"quot" => out.push(b'"'),
            _ if name.starts_with(b"#x") || name.starts_with(b"#X") => {
                let hex = std::str::from_utf8(&name[2..]).ok().and_then(|s| u32::from_str_radix(s, 16).ok());
                push_codepoint(out, hex, base_offset + i)?;
            }
            _ if name.starts_with(b"#") => {
                let dec = std::str::from_utf8(&name[1..]).ok().and_then(|s| s.parse::<u32>().ok());
                push_codepoint(out, dec, base_offset + i)?;
            }
            _ => {
                return Err(ImportError::lexical(
                    format!("unknown entity reference &{};", String::from_utf8_lossy(name)),
                    base_offset + i,
                ));
            }
        }
        i = semi + 1;
    }
    Ok(())
}

fn push_codepoint(out: &mut Vec<u8>, code: Option<u32>, offset: usize) -> Result<()> {
    let code = code.ok_or_else(|| ImportError::lexical("invalid numeric character reference", offset))?;
    let ch = char::from_u32(code)
        .ok_or_else(|| ImportError::lexical("numeric character reference out of range", offset))?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingHandler {
        events: Vec<String>,
    }

    impl SaxHandler for RecordingHandler {
        fn declaration(&mut self, decl: &XmlDeclaration) {
            self.events.push(format!("decl({})", decl.version));
        }

        fn start_element(&mut self, ns: NamespaceId, token: TokenId, attrs: &[XmlAttribute<'_>]) {
            let attr_desc: Vec<String> =
                attrs.iter().map(|a| format!("{}={}", a.local_name, a.value.as_str().unwrap_or(""))).collect();
            self.events.push(format!("start({ns:?},{token:?},[{}])", attr_desc.join(",")));
        }

        fn end_element(&mut self, ns: NamespaceId, token: TokenId) {
            self.events.push(format!("end({ns:?},{token:?})"));
        }

        fn characters(&mut self, value: StrView<'_>, transient: bool) {
            self.events.push(format!("chars({},{transient})", value.as_str().unwrap_or("")));
        }
    }

    #[test]
    fn parses_declaration_and_balanced_elements() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root><child>text</child></root>"#;
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "child"]);
        let mut handler = RecordingHandler::default();
        parse(xml, &mut repo, &tokens, &mut handler).unwrap();
        assert_eq!(handler.events[0], "decl(1.0)");
        assert!(handler.events.iter().any(|e| e.starts_with("start(")));
        assert!(handler.events.contains(&"chars(text,false)".to_string()));
    }

    #[test]
    fn resolves_namespace_prefix_via_xmlns_attribute() {
        let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet"><ss:Row/></ss:Workbook>"#;
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["Workbook", "Row"]);
        let mut handler = RecordingHandler::default();
        parse(xml, &mut repo, &tokens, &mut handler).unwrap();
        assert!(repo.uri_at(0).is_some());
        assert_eq!(repo.uri_at(0).unwrap(), "urn:schemas-microsoft-com:office:spreadsheet");
    }

    #[test]
    fn self_closing_element_emits_start_then_end() {
        let xml = b"<root><leaf/></root>";
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "leaf"]);
        let mut handler = RecordingHandler::default();
        parse(xml, &mut repo, &tokens, &mut handler).unwrap();
        let start_idx = handler.events.iter().position(|e| e.contains("leaf") || e.starts_with("start(")).unwrap();
        assert!(handler.events[start_idx..].iter().any(|e| e.starts_with("end(")));
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let xml = br#"<root attr="a &amp; b"><![CDATA[raw <tag>]]>text &lt;here&gt;</root>"#;
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root"]);
        let mut handler = RecordingHandler::default();
        parse(xml, &mut repo, &tokens, &mut handler).unwrap();
        assert!(handler.events.iter().any(|e| e.contains("attr=a & b")));
        assert!(handler.events.contains(&"chars(raw <tag>,false)".to_string()));
        assert!(handler.events.contains(&"chars(text <here>,true)".to_string()));
    }

    #[test]
    fn mismatched_closing_tag_is_structural_error() {
        let xml = b"<root><child></root></child>";
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "child"]);
        let mut handler = RecordingHandler::default();
        let err = parse(xml, &mut repo, &tokens, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }

    #[test]
    fn unclosed_element_at_eof_is_structural_error() {
        let xml = b"<root><child>text";
        let mut repo = NamespaceRepository::new();
        let tokens = TokenMap::new(&["root", "child"]);
        let mut handler = RecordingHandler::default();
        let err = parse(xml, &mut repo, &tokens, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }
}
