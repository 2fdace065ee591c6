//! Auto-filter sub-interface (spec §4.9 `auto_filter`, `filter_node`; §8
//! invariant 7; §4.10 "Auto-filter tree").
//!
//! The tree has an implicit root node with operator AND; each column's
//! item rules nest under a node whose connector is the column's explicit
//! `and`/`or` scope, defaulting to AND when absent (spec §4.10).

use crate::import::types::{FilterConnector, FilterOperator, FilterValue};

pub trait AutoFilter {
    /// Start a boolean connector node nested directly under the filter's
    /// implicit root.
    fn start_node(&mut self, connector: FilterConnector) -> Box<dyn FilterNode>;
    /// Start the per-column item list for `column` (0-based, relative to
    /// the filter's range), scoped by `connector`.
    fn start_column(&mut self, column: i32, connector: FilterConnector) -> Box<dyn FilterNode>;
    fn commit(self: Box<Self>);
}

pub trait FilterNode {
    fn append_item(&mut self, field: i32, op: FilterOperator, value: FilterValue) {
        let (_, _, _) = (field, op, value);
    }
    fn start_node(&mut self, connector: FilterConnector) -> Box<dyn FilterNode>;
    fn commit(self: Box<Self>);
}

/// An in-memory evaluator for the tree shape described in spec §8
/// invariant 7, used by tests (and available to consumers that want a
/// ground-truth reference without reimplementing tree evaluation).
#[derive(Debug, Clone)]
pub enum FilterTree {
    Connector { connector: FilterConnector, children: Vec<FilterTree> },
    Item { field: i32, op: FilterOperator, value: FilterValue },
}

impl FilterTree {
    /// `true` iff `row_values[field]` satisfies this subtree, per spec §8
    /// invariant 7 (AND iff all children satisfied, OR iff any child is).
    pub fn is_satisfied(&self, row_values: &[FilterValue]) -> bool {
        match self {
            FilterTree::Connector { connector, children } => match connector {
                FilterConnector::And => children.iter().all(|c| c.is_satisfied(row_values)),
                FilterConnector::Or => children.iter().any(|c| c.is_satisfied(row_values)),
            },
            FilterTree::Item { field, op, value } => {
                row_values.get(*field as usize).is_some_and(|v| item_matches(*op, value, v))
            }
        }
    }
}

fn item_matches(op: FilterOperator, expected: &FilterValue, actual: &FilterValue) -> bool {
    use FilterOperator::*;
    match op {
        Empty => matches!(actual, FilterValue::Empty),
        NotEmpty => !matches!(actual, FilterValue::Empty),
        Equal => actual == expected,
        NotEqual => actual != expected,
        Greater | GreaterEqual | Less | LessEqual => match (actual, expected) {
            (FilterValue::Numeric(a), FilterValue::Numeric(b)) => match op {
                Greater => a > b,
                GreaterEqual => a >= b,
                Less => a < b,
                LessEqual => a <= b,
                _ => unreachable!(),
            },
            _ => false,
        },
        BeginWith | NotBeginWith | EndWith | NotEndWith | Contain | NotContain => {
            match (actual, expected) {
                (FilterValue::Text(a), FilterValue::Text(b)) => {
                    let hit = match op {
                        BeginWith | NotBeginWith => a.starts_with(b.as_str()),
                        EndWith | NotEndWith => a.ends_with(b.as_str()),
                        Contain | NotContain => a.contains(b.as_str()),
                        _ => unreachable!(),
                    };
                    matches!(op, BeginWith | EndWith | Contain) == hit
                }
                _ => false,
            }
        }
        // Top/bottom N (or percent) rank selections need the full column
        // population to evaluate; not decidable from a single row, so a
        // standalone evaluator treats them as always-satisfied.
        Top | Bottom | TopPercent | BottomPercent => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_node_requires_all_children() {
        let tree = FilterTree::Connector {
            connector: FilterConnector::And,
            children: vec![
                FilterTree::Item { field: 0, op: FilterOperator::Equal, value: FilterValue::Numeric(1.0) },
                FilterTree::Item { field: 1, op: FilterOperator::Equal, value: FilterValue::Numeric(2.0) },
            ],
        };
        assert!(tree.is_satisfied(&[FilterValue::Numeric(1.0), FilterValue::Numeric(2.0)]));
        assert!(!tree.is_satisfied(&[FilterValue::Numeric(1.0), FilterValue::Numeric(9.0)]));
    }

    #[test]
    fn or_node_requires_any_child() {
        let tree = FilterTree::Connector {
            connector: FilterConnector::Or,
            children: vec![
                FilterTree::Item { field: 0, op: FilterOperator::Equal, value: FilterValue::Numeric(1.0) },
                FilterTree::Item { field: 0, op: FilterOperator::Equal, value: FilterValue::Numeric(2.0) },
            ],
        };
        assert!(tree.is_satisfied(&[FilterValue::Numeric(2.0)]));
        assert!(!tree.is_satisfied(&[FilterValue::Numeric(3.0)]));
    }

    #[test]
    fn contains_text_operator() {
        let item = FilterTree::Item {
            field: 0,
            op: FilterOperator::Contain,
            value: FilterValue::Text("ell".to_string()),
        };
        assert!(item.is_satisfied(&[FilterValue::Text("hello".to_string())]));
        assert!(!item.is_satisfied(&[FilterValue::Text("world".to_string())]));
    }
}
