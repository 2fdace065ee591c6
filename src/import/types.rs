//! Shared enums for the import interface (spec §4.9) — operator/category
//! vocabularies referenced by more than one collaborator.

/// `styles::start_xf` category (spec §4.9 `start_xf(category)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XfCategory {
    Cell,
    CellStyle,
    Differential,
}

/// Horizontal/vertical alignment recorded on an `xf` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlignment {
    Unset,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcrossSelection,
    Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlignment {
    Unset,
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

/// One edge of a border style record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderDirection {
    Top,
    Bottom,
    Left,
    Right,
    DiagonalUp,
    DiagonalDown,
}

/// An ARGB color as carried through the import interface (spec §4.9
/// `set_fg_color(a,r,g,b)` etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Argb {
    pub alpha: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Argb {
    pub fn new(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Argb { alpha, red, green, blue }
    }
}

/// Auto-filter operators (spec §4.9 `filter_node::append_item`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BeginWith,
    NotBeginWith,
    EndWith,
    NotEndWith,
    Contain,
    NotContain,
    Empty,
    NotEmpty,
    Top,
    Bottom,
    TopPercent,
    BottomPercent,
}

/// AND/OR boolean scope of a filter node (spec §4.9 `start_node(op)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterConnector {
    And,
    Or,
}

/// A filter leaf's typed value (spec §4.10 "Filter value typing").
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Numeric(f64),
    Text(String),
    Boolean(bool),
    Empty,
}

/// Pivot field axis (spec §4.9 `pivot_table_definition`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotAxis {
    Row,
    Column,
    Page,
    Data,
}

/// Pivot item summary type (spec §4.10 "Pivot table definition").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotSubtotal {
    Default,
    GrandTotal,
    Sum,
    Count,
    CountNumbers,
    Average,
    Max,
    Min,
    Product,
    StdDev,
    StdDevP,
    Var,
    VarP,
    BlankLine,
    Data,
}

/// Grouping interval for a pivot cache field group's `rangePr` (spec
/// §4.10 "Pivot cache").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotGroupBy {
    Range,
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
    Quarters,
    Years,
}
