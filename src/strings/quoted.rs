//! Quoted-string scanning with escape handling (C1, spec §3 "Quoted-string
//! parse state").
//!
//! Grounded in liborcus's `parse_quoted_string_state` /
//! `get_string_escape_char_type` (`include/orcus/parser_global.hpp`): a
//! string with no escapes is returned as a borrowed, non-transient view
//! straight into the input; a string containing escapes is unescaped into
//! a caller-supplied scratch buffer and returned as a transient view the
//! caller must copy out of before the buffer is reused.

use crate::strings::StrView;

/// Classification of the character following a backslash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEscapeCharType {
    /// Not a recognized escape (e.g. `\q`).
    Invalid,
    /// A simple single-character escape: `\"`, `\\`, `\/`, `\b`, `\f`,
    /// `\n`, `\r`, `\t`.
    Regular(u8),
    /// A raw control character placed directly after the backslash with
    /// no further meaning (kept verbatim, only the escape flag is noted).
    Control,
    /// `\uHHHH`.
    Unicode,
}

pub fn get_string_escape_char_type(c: u8) -> StringEscapeCharType {
    match c {
        b'"' => StringEscapeCharType::Regular(b'"'),
        b'\\' => StringEscapeCharType::Regular(b'\\'),
        b'/' => StringEscapeCharType::Regular(b'/'),
        b'b' => StringEscapeCharType::Regular(0x08),
        b'f' => StringEscapeCharType::Regular(0x0C),
        b'n' => StringEscapeCharType::Regular(b'\n'),
        b'r' => StringEscapeCharType::Regular(b'\r'),
        b't' => StringEscapeCharType::Regular(b'\t'),
        b'u' => StringEscapeCharType::Unicode,
        c if c < 0x20 => StringEscapeCharType::Control,
        _ => StringEscapeCharType::Invalid,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotedStringError {
    NoClosingQuote,
    IllegalEscapeChar,
}

/// Result of scanning one quoted string. `view` borrows either directly
/// from the input (`transient = false`) or from the scratch buffer passed
/// to [`parse_quoted_string`] (`transient = true`).
pub struct QuotedStringResult<'a> {
    pub view: StrView<'a>,
    pub transient: bool,
    pub has_control_character: bool,
    /// Byte offset in the input just past the closing quote.
    pub end_pos: usize,
}

/// Scan a quoted string starting *after* the opening quote character
/// (`input[start]` is the first content byte). `quote` is the delimiter
/// (`"` for JSON/XML attribute values, `'` also valid for XML). `scratch`
/// is reused/cleared and only touched when an escape sequence forces
/// unescaping.
/// `'a: 'b` (input always outlives the scratch borrow) lets the returned
/// view's lifetime track whichever of the two buffers actually backs it,
/// without forcing every caller's scratch buffer to live as long as the
/// input — this is what lets a single shared scratch `Vec` be reborrowed
/// call after call through a recursive-descent parser (see
/// `crate::json::parser`) instead of needing one scratch buffer per call.
pub fn parse_quoted_string<'a: 'b, 'b>(
    input: &'a [u8],
    start: usize,
    quote: u8,
    scratch: &'b mut Vec<u8>,
) -> Result<QuotedStringResult<'b>, (QuotedStringError, usize)> {
    let mut has_control_character = false;
    let mut needs_unescape = false;
    let mut i = start;

    // Fast scan: find the closing quote, noting whether an escape or
    // control character forces materializing into scratch.
    while i < input.len() {
        let b = input[i];
        if b == quote {
            break;
        }
        if b == b'\\' {
            needs_unescape = true;
            i += 1;
            if i >= input.len() {
                return Err((QuotedStringError::NoClosingQuote, i));
            }
            i += 1;
            continue;
        }
        if b < 0x20 {
            has_control_character = true;
        }
        i += 1;
    }

    if i >= input.len() {
        return Err((QuotedStringError::NoClosingQuote, i));
    }

    if !needs_unescape {
        let view = StrView::new(&input[start..i]);
        return Ok(QuotedStringResult { view, transient: false, has_control_character, end_pos: i + 1 });
    }

    scratch.clear();
    let mut j = start;
    while j < i {
        let b = input[j];
        if b != b'\\' {
            scratch.push(b);
            j += 1;
            continue;
        }
        j += 1;
        let esc = input[j];
        match get_string_escape_char_type(esc) {
            StringEscapeCharType::Regular(out) => {
                scratch.push(out);
                j += 1;
            }
            StringEscapeCharType::Control => {
                has_control_character = true;
                scratch.push(esc);
                j += 1;
            }
            StringEscapeCharType::Unicode => {
                if j + 5 > i {
                    return Err((QuotedStringError::IllegalEscapeChar, j));
                }
                let hex = std::str::from_utf8(&input[j + 1..j + 5])
                    .ok()
                    .and_then(|s| u32::from_str_radix(s, 16).ok())
                    .ok_or((QuotedStringError::IllegalEscapeChar, j))?;
                j += 5;

                let code_point = if (0xD800..=0xDBFF).contains(&hex) {
                    // High surrogate: require a following `\uDC00-\uDFFF`.
                    if j + 6 > i || input[j] != b'\\' || input[j + 1] != b'u' {
                        return Err((QuotedStringError::IllegalEscapeChar, j));
                    }
                    let low = std::str::from_utf8(&input[j + 2..j + 6])
                        .ok()
                        .and_then(|s| u32::from_str_radix(s, 16).ok())
                        .ok_or((QuotedStringError::IllegalEscapeChar, j))?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err((QuotedStringError::IllegalEscapeChar, j));
                    }
                    j += 6;
                    0x10000 + ((hex - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    hex
                };

                let ch = char::from_u32(code_point)
                    .ok_or((QuotedStringError::IllegalEscapeChar, j))?;
                let mut buf = [0u8; 4];
                scratch.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            StringEscapeCharType::Invalid => {
                return Err((QuotedStringError::IllegalEscapeChar, j));
            }
        }
    }

    let view = StrView::new(scratch.as_slice());
    Ok(QuotedStringResult { view, transient: true, has_control_character, end_pos: i + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_is_non_transient_view_into_input() {
        let input = br#"hello world" rest"#;
        let mut scratch = Vec::new();
        let result = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap();
        assert!(!result.transient);
        assert_eq!(result.view.as_str().unwrap(), "hello world");
        assert_eq!(result.end_pos, 12);
    }

    #[test]
    fn escaped_string_is_transient_and_unescaped() {
        let input = br#"a\n\tb\"c" rest"#;
        let mut scratch = Vec::new();
        let result = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap();
        assert!(result.transient);
        assert_eq!(result.view.as_str().unwrap(), "a\n\tb\"c");
    }

    #[test]
    fn unicode_escape_decodes_bmp_codepoint() {
        let input = b"\\u00e9\" rest"; // JSON-style \u00e9 -> é
        let mut scratch = Vec::new();
        let result = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap();
        assert_eq!(result.view.as_str().unwrap(), "\u{e9}");
    }

    #[test]
    fn surrogate_pair_decodes_astral_codepoint() {
        let input = b"\\ud83d\\ude00\" rest"; // surrogate pair -> grinning face emoji
        let mut scratch = Vec::new();
        let result = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap();
        assert_eq!(result.view.as_str().unwrap(), "\u{1F600}");
    }

    #[test]
    fn missing_closing_quote_is_an_error() {
        let input = br#"unterminated"#;
        let mut scratch = Vec::new();
        let err = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap_err();
        assert_eq!(err.0, QuotedStringError::NoClosingQuote);
    }

    #[test]
    fn invalid_escape_char_is_an_error() {
        let input = br#"bad\qescape" rest"#;
        let mut scratch = Vec::new();
        let err = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap_err();
        assert_eq!(err.0, QuotedStringError::IllegalEscapeChar);
    }

    #[test]
    fn control_character_sets_flag_without_erroring() {
        let input = b"ab\tcd\" rest";
        let mut scratch = Vec::new();
        let result = parse_quoted_string(input, 0, b'"', &mut scratch).unwrap();
        assert!(result.has_control_character);
    }
}
