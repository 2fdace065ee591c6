//! Formula / array-formula sub-interfaces (spec §4.9 `formula`,
//! `array_formula`).

use crate::types::{CellRange, FormulaGrammar, ResultValue};

pub trait Formula {
    fn set_position(&mut self, row: i32, column: i32) {
        let (_, _) = (row, column);
    }
    fn set_formula(&mut self, grammar: FormulaGrammar, text: &str) {
        let (_, _) = (grammar, text);
    }
    /// References the shared-formula master stored under `index` (spec
    /// §4.10 "Shared formulas").
    fn set_shared_formula_index(&mut self, index: u32) {
        let _ = index;
    }
    fn set_result_value(&mut self, value: f64) {
        let _ = value;
    }
    fn set_result_string(&mut self, value: &str) {
        let _ = value;
    }
    fn set_result_bool(&mut self, value: bool) {
        let _ = value;
    }
    fn set_result_empty(&mut self) {}
    fn commit(self: Box<Self>);
}

pub trait ArrayFormula {
    fn set_range(&mut self, range: CellRange) {
        let _ = range;
    }
    fn set_formula(&mut self, grammar: FormulaGrammar, text: &str) {
        let (_, _) = (grammar, text);
    }
    /// One result cell at `(row_offset, column_offset)` within the range
    /// set by `set_range` (spec §8 invariant 8: exactly N×M calls, one per
    /// offset, before the single `commit`).
    fn set_result_value(&mut self, row_offset: i32, column_offset: i32, value: &ResultValue) {
        let (_, _, _) = (row_offset, column_offset, value);
    }
    fn commit(self: Box<Self>);
}
