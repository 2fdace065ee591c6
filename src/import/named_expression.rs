//! Named expression sub-interface (spec §4.9 `named_expression`):
//! workbook-global (`import_factory::get_named_expression`) and
//! sheet-local (`sheet::get_named_expression`) share the same shape.

use crate::types::FormulaGrammar;

pub trait NamedExpression {
    fn set_base_position(&mut self, row: i32, column: i32) {
        let (_, _) = (row, column);
    }
    fn set_named_expression(&mut self, name: &str, grammar: FormulaGrammar, formula: &str) {
        let (_, _, _) = (name, grammar, formula);
    }
    fn commit(&mut self) {}
}
