//! Shared value types threaded through the import interface (spec §3
//! "Cell address / range").

use std::fmt;

/// `(sheet, row, column)` with signed components — callers may pass
/// temporary offsets (e.g. "one past the last column") before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellAddress {
    pub sheet: i32,
    pub row: i32,
    pub column: i32,
}

impl CellAddress {
    pub fn new(sheet: i32, row: i32, column: i32) -> Self {
        CellAddress { sheet, row, column }
    }
}

/// An inclusive `(first, last)` cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellRange {
    pub first: CellAddress,
    pub last: CellAddress,
}

impl CellRange {
    pub fn new(first: CellAddress, last: CellAddress) -> Self {
        CellRange { first, last }
    }

    pub fn row_span(&self) -> i32 {
        self.last.row - self.first.row + 1
    }

    pub fn column_span(&self) -> i32 {
        self.last.column - self.first.column + 1
    }

    pub fn contains(&self, row: i32, column: i32) -> bool {
        row >= self.first.row
            && row <= self.last.row
            && column >= self.first.column
            && column <= self.last.column
    }
}

/// A scalar result value as reported for formulas/array-formulas (spec
/// §4.9 `formula`/`array_formula`).
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Value(f64),
    String(String),
    Bool(bool),
    Empty,
    Error(String),
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Value(v) => write!(f, "{v}"),
            ResultValue::String(s) => write!(f, "{s}"),
            ResultValue::Bool(b) => write!(f, "{b}"),
            ResultValue::Empty => write!(f, ""),
            ResultValue::Error(e) => write!(f, "#{e}"),
        }
    }
}

/// Formula grammar the text should be interpreted under — each per-format
/// handler publishes formulas tagged with its own grammar (spec §4.9
/// `formula::set_formula`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaGrammar {
    XlsXml,
    Xlsx,
    Ods,
    Gnumeric,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_span_is_inclusive() {
        let r = CellRange::new(CellAddress::new(0, 0, 0), CellAddress::new(0, 2, 1));
        assert_eq!(r.row_span(), 3);
        assert_eq!(r.column_span(), 2);
    }

    #[test]
    fn contains_checks_bounds() {
        let r = CellRange::new(CellAddress::new(0, 1, 1), CellAddress::new(0, 3, 3));
        assert!(r.contains(2, 2));
        assert!(!r.contains(0, 2));
    }
}
