//! YAML parser (C7): an indent/scope-based block parser emitting the
//! same event vocabulary shape as the JSON parser, plus document
//! boundaries, map/sequence scoping, and literal/folded scalar handling
//! (spec §4.8).
//!
//! This is a deliberately narrower YAML than a general-purpose one: flow
//! collections (`{a: 1}`, `[1, 2]`), anchors/aliases, and tags are out of
//! scope (spec §4.8 describes only block-style mappings, sequences, and
//! scalars) — the core use is converting straightforward configuration
//! documents, not arbitrary YAML.

use crate::error::{ImportError, Result};
use crate::strings::StrView;

/// Capability set invoked in document order (spec §4.8, mirroring the
/// JSON parser's shape with map/sequence/document boundaries added).
pub trait YamlHandler {
    fn begin_document(&mut self) {}
    fn end_document(&mut self) {}
    fn begin_map(&mut self) {}
    fn end_map(&mut self) {}
    fn begin_map_key(&mut self) {}
    fn end_map_key(&mut self) {}
    fn begin_sequence(&mut self) {}
    fn end_sequence(&mut self) {}
    fn string(&mut self, value: StrView<'_>, transient: bool) {
        let _ = (value, transient);
    }
    fn number(&mut self, value: f64) {
        let _ = value;
    }
    fn boolean(&mut self, value: bool) {
        let _ = value;
    }
    fn null(&mut self) {}
}

enum Scope {
    Map { indent: usize, awaiting_value: bool },
    Sequence { indent: usize },
}

impl Scope {
    fn indent(&self) -> usize {
        match self {
            Scope::Map { indent, .. } => *indent,
            Scope::Sequence { indent } => *indent,
        }
    }
}

struct LiteralBlock {
    key_indent: usize,
    content_indent: Option<usize>,
    lines: Vec<String>,
}

struct MultilineScalar {
    key_indent: usize,
    lines: Vec<String>,
}

struct Parser<'a> {
    handler: &'a mut dyn YamlHandler,
    scopes: Vec<Scope>,
    literal: Option<LiteralBlock>,
    multiline: Option<MultilineScalar>,
    line_offset: usize,
}

pub fn parse(input: &str, handler: &mut dyn YamlHandler) -> Result<()> {
    let mut parser = Parser { handler, scopes: Vec::new(), literal: None, multiline: None, line_offset: 0 };
    parser.handler.begin_document();
    parser.run(input)?;
    parser.close_all_scopes()?;
    parser.handler.end_document();
    Ok(())
}

impl<'a> Parser<'a> {
    fn run(&mut self, input: &str) -> Result<()> {
        for raw_line in input.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            self.process_line(line)?;
            self.line_offset += raw_line.len() + 1;
        }
        self.flush_literal_block()?;
        self.flush_multiline_scalar()?;
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> Result<()> {
        let indent = leading_spaces(line);
        let content = &line[indent.min(line.len())..];

        if content.is_empty() {
            if let Some(block) = &mut self.literal {
                block.lines.push(String::new());
            }
            return Ok(());
        }

        if let Some(block) = &self.literal {
            if indent > block.key_indent {
                self.append_literal_line(indent, content);
                return Ok(());
            }
            self.flush_literal_block()?;
        }

        if let Some(scalar) = &self.multiline {
            if indent >= scalar.key_indent && !is_structural_line(content) {
                self.multiline.as_mut().unwrap().lines.push(strip_comment(content).trim().to_string());
                return Ok(());
            }
            self.flush_multiline_scalar()?;
        }

        if content.starts_with("---") {
            self.close_all_scopes()?;
            self.handler.end_document();
            self.handler.begin_document();
            return Ok(());
        }

        let content = strip_comment(content);
        if content.trim().is_empty() {
            return Ok(());
        }

        self.close_scopes_to(indent)?;
        self.parse_content(indent, content, true)
    }

    fn append_literal_line(&mut self, indent: usize, content: &str) {
        let block = self.literal.as_mut().unwrap();
        let base = *block.content_indent.get_or_insert(indent);
        let stripped = if indent >= base { &content[(indent - base).min(content.len())..] } else { content };
        block.lines.push(stripped.to_string());
    }

    fn flush_literal_block(&mut self) -> Result<()> {
        if let Some(block) = self.literal.take() {
            let text = block.lines.join("\n");
            self.handler.string(StrView::from_str(&text), true);
            if let Some(Scope::Map { awaiting_value, .. }) = self.scopes.last_mut() {
                *awaiting_value = false;
            }
        }
        Ok(())
    }

    fn flush_multiline_scalar(&mut self) -> Result<()> {
        if let Some(scalar) = self.multiline.take() {
            let text = scalar.lines.join(" ");
            emit_scalar(self.handler, &text);
            if let Some(Scope::Map { awaiting_value, .. }) = self.scopes.last_mut() {
                *awaiting_value = false;
            }
        }
        Ok(())
    }

    /// Pop scopes until the top's indent is `<= indent`; emit `null` for
    /// any dangling map key whose child never arrived.
    fn close_scopes_to(&mut self, indent: usize) -> Result<()> {
        while let Some(top) = self.scopes.last() {
            if top.indent() <= indent {
                break;
            }
            self.pop_scope();
        }
        if let Some(top) = self.scopes.last() {
            if top.indent() != indent && !self.scopes.is_empty() {
                // A shallower indent that doesn't land on an existing
                // scope boundary opens a new one at this line instead —
                // only a *strictly between* indent with no matching
                // scope is a genuine misalignment.
                if indent > top.indent() {
                    // handled by the caller opening a fresh scope
                } else {
                    return Err(ImportError::structural(
                        "indent decrease does not align with any open scope",
                        self.line_offset,
                    ));
                }
            }
        }
        Ok(())
    }

    fn pop_scope(&mut self) {
        match self.scopes.pop() {
            Some(Scope::Map { awaiting_value, .. }) => {
                if awaiting_value {
                    self.handler.null();
                }
                self.handler.end_map();
            }
            Some(Scope::Sequence { .. }) => self.handler.end_sequence(),
            None => {}
        }
    }

    fn close_all_scopes(&mut self) -> Result<()> {
        self.flush_literal_block()?;
        self.flush_multiline_scalar()?;
        while !self.scopes.is_empty() {
            self.pop_scope();
        }
        Ok(())
    }

    fn parse_content(&mut self, indent: usize, content: &str, allow_multiline: bool) -> Result<()> {
        if content == "-" || content.starts_with("- ") {
            self.ensure_sequence_scope(indent);
            let rest = content.strip_prefix('-').unwrap_or(content);
            let offset = leading_spaces(rest);
            let child_indent = indent + 1 + offset;
            let child_content = strip_comment(&rest[offset.min(rest.len())..]);
            if child_content.trim().is_empty() {
                self.handler.null();
            } else {
                // A dash's remainder is either a nested sequence/map entry
                // or this item's scalar value directly — never the start
                // of a folded multi-line buffer (that only applies to a
                // bare scalar occupying a whole logical line on its own).
                self.parse_content(child_indent, child_content, false)?;
            }
            return Ok(());
        }

        if let Some((key_text, key_transient, rest)) = try_parse_key(content) {
            let colon = rest.trim_start();
            if let Some(value) = colon.strip_prefix(':') {
                let value = value.trim();
                self.ensure_map_scope(indent);
                self.handler.begin_map_key();
                self.handler.string(StrView::from_str(&key_text), key_transient);
                self.handler.end_map_key();

                if value.is_empty() {
                    if let Some(Scope::Map { awaiting_value, .. }) = self.scopes.last_mut() {
                        *awaiting_value = true;
                    }
                    return Ok(());
                }
                if value == "|" {
                    self.literal = Some(LiteralBlock { key_indent: indent, content_indent: None, lines: Vec::new() });
                    return Ok(());
                }
                if value.starts_with('-') && (value.len() == 1 || value.as_bytes()[1] == b' ') {
                    return Err(ImportError::structural(
                        "inline sequence value after ':' is not allowed",
                        self.line_offset,
                    ));
                }
                emit_scalar(self.handler, value);
                if let Some(Scope::Map { awaiting_value, .. }) = self.scopes.last_mut() {
                    *awaiting_value = false;
                }
                return Ok(());
            }
            return Err(ImportError::structural("expected ':' after key", self.line_offset));
        }

        if allow_multiline {
            // Bare scalar line: begins (or continues) a folded multi-line value.
            self.multiline = Some(MultilineScalar { key_indent: indent, lines: vec![content.trim().to_string()] });
        } else {
            // A dash's remainder that is a plain scalar is that sequence
            // item's value outright.
            emit_scalar(self.handler, content.trim());
        }
        Ok(())
    }

    fn ensure_sequence_scope(&mut self, indent: usize) {
        let needs_new = !matches!(self.scopes.last(), Some(Scope::Sequence { indent: i }) if *i == indent);
        if needs_new {
            self.clear_pending_parent_key();
            self.scopes.push(Scope::Sequence { indent });
            self.handler.begin_sequence();
        }
    }

    fn ensure_map_scope(&mut self, indent: usize) {
        let needs_new = !matches!(self.scopes.last(), Some(Scope::Map { indent: i, .. }) if *i == indent);
        if needs_new {
            self.clear_pending_parent_key();
            self.scopes.push(Scope::Map { indent, awaiting_value: false });
            self.handler.begin_map();
        }
    }

    /// A newly opened child scope serves as the value for whatever key on
    /// the current top-of-stack map is still dangling (spec §4.8 step 4:
    /// "closing a scope flushes its buffered content" — the mirror case is
    /// opening one, which resolves the parent key instead of it going to
    /// `null`).
    fn clear_pending_parent_key(&mut self) {
        if let Some(Scope::Map { awaiting_value, .. }) = self.scopes.last_mut() {
            *awaiting_value = false;
        }
    }
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|&c| c == ' ').count()
}

fn is_structural_line(content: &str) -> bool {
    content.starts_with("---") || content.starts_with("- ") || content == "-" || try_parse_key(content).is_some()
}

fn strip_comment(content: &str) -> &str {
    let bytes = content.as_bytes();
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match in_quote {
            Some(q) if b == q => in_quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => in_quote = Some(b),
            None if b == b'#' && (i == 0 || bytes[i - 1] == b' ') => return &content[..i],
            None => {}
        }
        i += 1;
    }
    content
}

/// Attempt to read a `key` (quoted or bare) at the start of `content`,
/// returning `(key_text, transient, rest-after-key)`. `rest` still
/// contains the separating whitespace and the `:` itself.
fn try_parse_key(content: &str) -> Option<(String, bool, &str)> {
    let bytes = content.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    if bytes[0] == b'"' {
        let end = find_double_quote_end(content)?;
        return Some((unescape_double_quoted(&content[1..end]), true, &content[end + 1..]));
    }
    if bytes[0] == b'\'' {
        let end = find_single_quote_end(content)?;
        return Some((content[1..end].replace("''", "'"), true, &content[end + 1..]));
    }
    // Unquoted: bytes up to the first unescaped ':' that's followed by a
    // space, end-of-line, or nothing else (spec step 5).
    let colon = bytes.iter().position(|&b| b == b':')?;
    if colon + 1 < bytes.len() && bytes[colon + 1] != b' ' {
        return None;
    }
    let key = content[..colon].trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), false, &content[colon..]))
}

fn find_double_quote_end(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn find_single_quote_end(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn unescape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Classify a scalar: numeric (per spec §4.2's decimal grammar), `null`
/// family, canonical boolean forms, else string (spec §4.8 step 6).
fn emit_scalar(handler: &mut dyn YamlHandler, text: &str) {
    if text.starts_with('"') || text.starts_with('\'') {
        if let Some((value, transient, _)) = try_parse_key(text) {
            handler.string(StrView::from_str(&value), transient);
            return;
        }
    }

    match text {
        "null" | "~" | "" => handler.null(),
        "true" | "yes" | "on" => handler.boolean(true),
        "false" | "no" | "off" => handler.boolean(false),
        _ => {
            if let Ok(n) = text.parse::<f64>() {
                handler.number(n);
            } else {
                handler.string(StrView::from_str(text), false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct RecordingHandler {
        events: Vec<String>,
    }

    impl YamlHandler for RecordingHandler {
        fn begin_document(&mut self) {
            self.events.push("begin_document".into());
        }
        fn end_document(&mut self) {
            self.events.push("end_document".into());
        }
        fn begin_map(&mut self) {
            self.events.push("begin_map".into());
        }
        fn end_map(&mut self) {
            self.events.push("end_map".into());
        }
        fn begin_map_key(&mut self) {
            self.events.push("begin_map_key".into());
        }
        fn end_map_key(&mut self) {
            self.events.push("end_map_key".into());
        }
        fn begin_sequence(&mut self) {
            self.events.push("begin_sequence".into());
        }
        fn end_sequence(&mut self) {
            self.events.push("end_sequence".into());
        }
        fn string(&mut self, value: StrView<'_>, _transient: bool) {
            self.events.push(format!("string({})", value.as_str().unwrap_or("")));
        }
        fn number(&mut self, value: f64) {
            self.events.push(format!("number({value})"));
        }
        fn boolean(&mut self, value: bool) {
            self.events.push(format!("bool({value})"));
        }
        fn null(&mut self) {
            self.events.push("null".into());
        }
    }

    #[test]
    fn flat_map_emits_keys_and_scalars() {
        let yaml = "name: widget\ncount: 3\nactive: true\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"string(widget)".to_string()));
        assert!(handler.events.contains(&"number(3)".to_string()));
        assert!(handler.events.contains(&"bool(true)".to_string()));
        assert_eq!(handler.events.first().unwrap(), "begin_document");
        assert_eq!(handler.events.last().unwrap(), "end_document");
    }

    #[test]
    fn nested_map_opens_and_closes_child_scope() {
        let yaml = "outer:\n  inner: 1\nsibling: 2\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        let begin_maps = handler.events.iter().filter(|e| *e == "begin_map").count();
        let end_maps = handler.events.iter().filter(|e| *e == "end_map").count();
        assert_eq!(begin_maps, end_maps);
        assert!(begin_maps >= 2);
    }

    #[test]
    fn key_with_no_child_emits_null() {
        let yaml = "key:\nother: 1\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"null".to_string()));
    }

    #[test]
    fn sequence_under_key_emits_begin_end_sequence() {
        let yaml = "items:\n  - a\n  - b\n  - c\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"begin_sequence".to_string()));
        assert!(handler.events.contains(&"end_sequence".to_string()));
        assert_eq!(handler.events.iter().filter(|e| e.starts_with("string(")).count(), 3);
    }

    #[test]
    fn literal_block_preserves_newlines() {
        let yaml = "text: |\n  line one\n  line two\nafter: 1\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"string(line one\nline two)".to_string()));
    }

    #[test]
    fn folded_scalar_joins_with_spaces() {
        let yaml = "text:\n  line one\n  line two\nafter: 1\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"string(line one line two)".to_string()));
    }

    #[test]
    fn document_separator_starts_new_document() {
        let yaml = "a: 1\n---\nb: 2\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        let begins = handler.events.iter().filter(|e| *e == "begin_document").count();
        let ends = handler.events.iter().filter(|e| *e == "end_document").count();
        assert_eq!(begins, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn inline_sequence_after_colon_is_an_error() {
        let yaml = "key: - not allowed\n";
        let mut handler = RecordingHandler::default();
        let err = parse(yaml, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }

    #[test]
    fn quoted_keys_are_supported() {
        let yaml = "\"quoted key\": value\n";
        let mut handler = RecordingHandler::default();
        parse(yaml, &mut handler).unwrap();
        assert!(handler.events.contains(&"string(quoted key)".to_string()));
    }
}
