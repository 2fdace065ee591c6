//! JSON parser (C6): event-based callbacks over a byte buffer.
//!
//! Grounded in the same tokenizer style as [`crate::xml::sax`] — hand
//! rolled recursive descent driven by [`crate::scan`] primitives, with
//! quoted-string scanning delegated to [`crate::strings::quoted`] since
//! JSON's string escape grammar is exactly the one that module
//! implements (spec §4.7 lists the same six simple escapes plus `\uHHHH`
//! with surrogate pairs).

use crate::error::{ImportError, Result};
use crate::scan::skip;
use crate::strings::quoted::{parse_quoted_string, QuotedStringError};
use crate::strings::StrView;

const JSON_WHITESPACE: &[u8] = b" \t\r\n";

/// Capability set invoked in document order (spec §4.7).
pub trait JsonHandler {
    fn begin_parse(&mut self) {}
    fn end_parse(&mut self) {}
    fn begin_object(&mut self) {}
    fn end_object(&mut self) {}
    fn object_key(&mut self, key: StrView<'_>, transient: bool) {
        let _ = (key, transient);
    }
    fn begin_array(&mut self) {}
    fn end_array(&mut self) {}
    fn boolean(&mut self, value: bool) {
        let _ = value;
    }
    fn null(&mut self) {}
    fn string(&mut self, value: StrView<'_>, transient: bool) {
        let _ = (value, transient);
    }
    fn number(&mut self, value: f64) {
        let _ = value;
    }
}

pub fn parse(input: &[u8], handler: &mut dyn JsonHandler) -> Result<()> {
    let mut scratch = Vec::new();
    handler.begin_parse();
    let pos = skip(input, 0, JSON_WHITESPACE);
    let (_, pos) = parse_value(input, pos, handler, &mut scratch)?;
    let pos = skip(input, pos, JSON_WHITESPACE);
    if pos != input.len() {
        return Err(ImportError::structural("trailing content after top-level JSON value", pos));
    }
    handler.end_parse();
    Ok(())
}

fn parse_value(input: &[u8], pos: usize, handler: &mut dyn JsonHandler, scratch: &mut Vec<u8>) -> Result<((), usize)> {
    let pos = skip(input, pos, JSON_WHITESPACE);
    match input.get(pos) {
        Some(b'{') => parse_object(input, pos, handler, scratch),
        Some(b'[') => parse_array(input, pos, handler, scratch),
        Some(b'"') => {
            let result = parse_quoted_string(input, pos + 1, b'"', scratch)
                .map_err(|(err, offset)| to_import_error(err, offset))?;
            handler.string(result.view, result.transient);
            Ok(((), result.end_pos))
        }
        Some(b't') => parse_literal(input, pos, b"true", || true).map(|(v, p)| {
            handler.boolean(v);
            ((), p)
        }),
        Some(b'f') => parse_literal(input, pos, b"false", || false).map(|(v, p)| {
            handler.boolean(v);
            ((), p)
        }),
        Some(b'n') => {
            let (_, p) = parse_literal(input, pos, b"null", || ())?;
            handler.null();
            Ok(((), p))
        }
        Some(b'-') | Some(b'0'..=b'9') => parse_number(input, pos, handler),
        Some(_) => Err(ImportError::lexical("unexpected character starting a value", pos)),
        None => Err(ImportError::lexical("unexpected end of input while expecting a value", pos)),
    }
}

fn parse_literal<T>(input: &[u8], pos: usize, literal: &[u8], value: impl Fn() -> T) -> Result<(T, usize)> {
    if input[pos..].starts_with(literal) {
        Ok((value(), pos + literal.len()))
    } else {
        Err(ImportError::lexical(format!("invalid literal, expected '{}'", String::from_utf8_lossy(literal)), pos))
    }
}

fn parse_object(input: &[u8], pos: usize, handler: &mut dyn JsonHandler, scratch: &mut Vec<u8>) -> Result<((), usize)> {
    handler.begin_object();
    let mut pos = skip(input, pos + 1, JSON_WHITESPACE);
    if input.get(pos) == Some(&b'}') {
        handler.end_object();
        return Ok(((), pos + 1));
    }
    loop {
        pos = skip(input, pos, JSON_WHITESPACE);
        if input.get(pos) != Some(&b'"') {
            return Err(ImportError::structural("expected '\"' to start an object key", pos));
        }
        let key_result =
            parse_quoted_string(input, pos + 1, b'"', scratch).map_err(|(err, offset)| to_import_error(err, offset))?;
        handler.object_key(key_result.view, key_result.transient);
        pos = skip(input, key_result.end_pos, JSON_WHITESPACE);
        if input.get(pos) != Some(&b':') {
            return Err(ImportError::structural("expected ':' after object key", pos));
        }
        pos = skip(input, pos + 1, JSON_WHITESPACE);
        let (_, new_pos) = parse_value(input, pos, handler, scratch)?;
        pos = skip(input, new_pos, JSON_WHITESPACE);
        match input.get(pos) {
            Some(b',') => {
                pos += 1;
                continue;
            }
            Some(b'}') => {
                pos += 1;
                break;
            }
            _ => return Err(ImportError::structural("expected ',' or '}' in object", pos)),
        }
    }
    handler.end_object();
    Ok(((), pos))
}

fn parse_array(input: &[u8], pos: usize, handler: &mut dyn JsonHandler, scratch: &mut Vec<u8>) -> Result<((), usize)> {
    handler.begin_array();
    let mut pos = skip(input, pos + 1, JSON_WHITESPACE);
    if input.get(pos) == Some(&b']') {
        handler.end_array();
        return Ok(((), pos + 1));
    }
    loop {
        let (_, new_pos) = parse_value(input, pos, handler, scratch)?;
        pos = skip(input, new_pos, JSON_WHITESPACE);
        match input.get(pos) {
            Some(b',') => {
                pos = skip(input, pos + 1, JSON_WHITESPACE);
                continue;
            }
            Some(b']') => {
                pos += 1;
                break;
            }
            _ => return Err(ImportError::structural("expected ',' or ']' in array", pos)),
        }
    }
    handler.end_array();
    Ok(((), pos))
}

/// Decimal number with optional sign, fractional part, and `e[+-]?digits`
/// exponent (spec §4.7).
fn parse_number(input: &[u8], start: usize, handler: &mut dyn JsonHandler) -> Result<((), usize)> {
    let mut pos = start;
    if input.get(pos) == Some(&b'-') {
        pos += 1;
    }
    let digits_start = pos;
    while pos < input.len() && input[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start {
        return Err(ImportError::lexical("expected digit in number", pos));
    }
    if input.get(pos) == Some(&b'.') {
        pos += 1;
        let frac_start = pos;
        while pos < input.len() && input[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == frac_start {
            return Err(ImportError::lexical("expected digit after decimal point", pos));
        }
    }
    if matches!(input.get(pos), Some(b'e') | Some(b'E')) {
        pos += 1;
        if matches!(input.get(pos), Some(b'+') | Some(b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        while pos < input.len() && input[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == exp_start {
            return Err(ImportError::lexical("expected digit in exponent", pos));
        }
    }
    let text = std::str::from_utf8(&input[start..pos]).expect("validated ASCII number text");
    let value: f64 = text.parse().map_err(|_| ImportError::lexical("malformed number literal", start))?;
    handler.number(value);
    Ok(((), pos))
}

fn to_import_error(err: QuotedStringError, offset: usize) -> ImportError {
    match err {
        QuotedStringError::NoClosingQuote => ImportError::structural("unterminated string literal", offset),
        QuotedStringError::IllegalEscapeChar => ImportError::lexical("illegal escape character", offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct RecordingHandler {
        events: Vec<String>,
    }

    impl JsonHandler for RecordingHandler {
        fn begin_parse(&mut self) {
            self.events.push("begin_parse".into());
        }
        fn end_parse(&mut self) {
            self.events.push("end_parse".into());
        }
        fn begin_object(&mut self) {
            self.events.push("begin_object".into());
        }
        fn end_object(&mut self) {
            self.events.push("end_object".into());
        }
        fn object_key(&mut self, key: StrView<'_>, _transient: bool) {
            self.events.push(format!("key({})", key.as_str().unwrap_or("")));
        }
        fn begin_array(&mut self) {
            self.events.push("begin_array".into());
        }
        fn end_array(&mut self) {
            self.events.push("end_array".into());
        }
        fn boolean(&mut self, value: bool) {
            self.events.push(format!("bool({value})"));
        }
        fn null(&mut self) {
            self.events.push("null".into());
        }
        fn string(&mut self, value: StrView<'_>, _transient: bool) {
            self.events.push(format!("string({})", value.as_str().unwrap_or("")));
        }
        fn number(&mut self, value: f64) {
            self.events.push(format!("number({value})"));
        }
    }

    #[test]
    fn parses_nested_object_and_array() {
        let json = br#"{"a": [1, 2.5, -3e2, true, false, null, "hi"]}"#;
        let mut handler = RecordingHandler::default();
        parse(json, &mut handler).unwrap();
        assert_eq!(handler.events[0], "begin_parse");
        assert!(handler.events.contains(&"key(a)".to_string()));
        assert!(handler.events.contains(&"number(1)".to_string()));
        assert!(handler.events.contains(&"number(2.5)".to_string()));
        assert!(handler.events.contains(&"number(-300)".to_string()));
        assert!(handler.events.contains(&"bool(true)".to_string()));
        assert!(handler.events.contains(&"bool(false)".to_string()));
        assert!(handler.events.contains(&"null".to_string()));
        assert!(handler.events.contains(&"string(hi)".to_string()));
        assert_eq!(handler.events.last().unwrap(), "end_parse");
    }

    #[test]
    fn empty_object_and_array_round_trip() {
        let json = br#"{"obj": {}, "arr": []}"#;
        let mut handler = RecordingHandler::default();
        parse(json, &mut handler).unwrap();
        assert!(handler.events.contains(&"begin_object".to_string()));
        assert!(handler.events.contains(&"end_array".to_string()));
    }

    #[test]
    fn escaped_string_key_and_value_decode() {
        let json = br#"{"a\tb": "line\nbreak"}"#;
        let mut handler = RecordingHandler::default();
        parse(json, &mut handler).unwrap();
        assert!(handler.events.contains(&"key(a\tb)".to_string()));
        assert!(handler.events.contains(&"string(line\nbreak)".to_string()));
    }

    #[test]
    fn trailing_garbage_is_structural_error() {
        let json = b"{} garbage";
        let mut handler = RecordingHandler::default();
        let err = parse(json, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }

    #[test]
    fn malformed_number_is_lexical_error() {
        let json = b"[1.]";
        let mut handler = RecordingHandler::default();
        let err = parse(json, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Lexical { .. }));
    }

    #[test]
    fn missing_comma_in_object_is_structural_error() {
        let json = br#"{"a": 1 "b": 2}"#;
        let mut handler = RecordingHandler::default();
        let err = parse(json, &mut handler).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }
}
