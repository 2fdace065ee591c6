//! Error types for the import engine.

use thiserror::Error;

/// Result type alias for docimport operations.
pub type Result<T> = std::result::Result<T, ImportError>;

/// A byte offset from the start of the parsed stream, used to build
/// line/column diagnostics (spec §6 "Error outputs").
pub type ByteOffset = usize;

/// Top-level error type. Lexical and structural parse failures, and
/// archive failures, are fatal for the call that triggered them (spec
/// §4.12, §7); schema warnings and consumer-skips are *not* represented
/// here — they are logged and the parse continues (see `crate::config`).
#[derive(Error, Debug)]
pub enum ImportError {
    /// Malformed token: bad number, unterminated string, unknown keyword.
    #[error("lexical error at byte {offset}: {message}")]
    Lexical { message: String, offset: ByteOffset },

    /// Nesting/ordering violation: unbalanced tags, bad indent decrease,
    /// missing closing quote.
    #[error("structural error at byte {offset}: {message}")]
    Structural { message: String, offset: ByteOffset },

    /// Zip central directory not found, corrupt record, or DEFLATE failure.
    #[error("zip error: {0}")]
    Zip(String),

    /// Wrapped I/O error from the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub fn lexical(message: impl Into<String>, offset: ByteOffset) -> Self {
        ImportError::Lexical { message: message.into(), offset }
    }

    pub fn structural(message: impl Into<String>, offset: ByteOffset) -> Self {
        ImportError::Structural { message: message.into(), offset }
    }

    pub fn zip(message: impl Into<String>) -> Self {
        ImportError::Zip(message.into())
    }

    /// Byte offset carried by this error, if any (parse errors always have
    /// one; zip/IO errors don't carry stream position).
    pub fn offset(&self) -> Option<ByteOffset> {
        match self {
            ImportError::Lexical { offset, .. } => Some(*offset),
            ImportError::Structural { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Render a human-readable caret-style snippet of `input` around `offset`,
/// used by the outermost driver to report parse/zip errors (spec §6, §7).
pub fn format_error_snippet(input: &[u8], offset: ByteOffset) -> String {
    let offset = offset.min(input.len());
    let line_start = input[..offset].iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    let line_end = input[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(input.len(), |p| offset + p);
    let line_no = input[..line_start].iter().filter(|&&b| b == b'\n').count() + 1;
    let col_no = offset - line_start + 1;
    let line = String::from_utf8_lossy(&input[line_start..line_end]);
    let caret = " ".repeat(col_no.saturating_sub(1)) + "^";
    format!("line {line_no}, column {col_no}:\n{line}\n{caret}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_offset_on_correct_line() {
        let input = b"first\nsecond line\nthird";
        let snippet = format_error_snippet(input, 7); // 's' of "second"
        assert!(snippet.starts_with("line 2, column 2"));
        assert!(snippet.contains("second line"));
    }
}
