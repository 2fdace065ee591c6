//! Pivot cache and pivot table sub-interfaces (spec §4.9 `pivot_cache_definition`,
//! `pivot_table_definition`; §4.10 "Pivot cache" / "Pivot table definition").

use crate::import::types::{PivotAxis, PivotGroupBy, PivotSubtotal};
use crate::types::CellRange;

pub trait PivotCacheDefinition {
    fn set_worksheet_source_range(&mut self, range: CellRange, sheet: &str) {
        let (_, _) = (range, sheet);
    }
    fn set_worksheet_source_table(&mut self, table_name: &str) {
        let _ = table_name;
    }
    fn set_field_count(&mut self, count: u32) {
        let _ = count;
    }
    fn start_field(&mut self, name: &str) -> Box<dyn PivotCacheField> {
        let _ = name;
        Box::new(NullPivotCacheField)
    }
    fn commit(self: Box<Self>);
}

pub trait PivotCacheField {
    fn set_min_value(&mut self, value: f64) {
        let _ = value;
    }
    fn set_max_value(&mut self, value: f64) {
        let _ = value;
    }
    fn set_min_date(&mut self, iso_date: &str) {
        let _ = iso_date;
    }
    fn set_max_date(&mut self, iso_date: &str) {
        let _ = iso_date;
    }
    fn set_item_string(&mut self, value: &str) {
        let _ = value;
    }
    fn set_item_numeric(&mut self, value: f64) {
        let _ = value;
    }
    fn set_item_date_time(&mut self, iso_date_time: &str) {
        let _ = iso_date_time;
    }
    fn set_item_error(&mut self, value: &str) {
        let _ = value;
    }
    /// Finalize the item most recently set via `set_item_*`. Not called
    /// for an item marked `u="1"` (unused) — spec §4.10 "Pivot cache".
    fn commit_field_item(&mut self) {}
    fn start_field_group(&mut self, base_field: u32) -> Box<dyn PivotFieldGroup> {
        let _ = base_field;
        Box::new(NullPivotFieldGroup)
    }
    fn commit_field(self: Box<Self>);
}

pub trait PivotFieldGroup {
    fn set_range_group_by(&mut self, group_by: PivotGroupBy) {
        let _ = group_by;
    }
    fn set_auto_start(&mut self, value: bool) {
        let _ = value;
    }
    fn set_auto_end(&mut self, value: bool) {
        let _ = value;
    }
    fn set_start_numeric(&mut self, value: f64) {
        let _ = value;
    }
    fn set_end_numeric(&mut self, value: f64) {
        let _ = value;
    }
    fn set_interval(&mut self, value: f64) {
        let _ = value;
    }
    fn set_start_date(&mut self, iso_date: &str) {
        let _ = iso_date;
    }
    fn set_end_date(&mut self, iso_date: &str) {
        let _ = iso_date;
    }
    /// Links a base-item index (from the discrete `x` list) to a group
    /// item index (spec §4.10 "discretePr/x v=i pair").
    fn add_discrete_link(&mut self, base_item_index: u32) {
        let _ = base_item_index;
    }
    fn commit(self: Box<Self>);
}

pub trait PivotTableDefinition {
    fn set_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_cache_id(&mut self, id: u32) {
        let _ = id;
    }
    fn set_range(&mut self, range: CellRange) {
        let _ = range;
    }
    fn start_pivot_fields(&mut self) -> Box<dyn PivotFieldsBuilder>;
    fn start_row_fields(&mut self) -> Box<dyn PivotAxisFieldsBuilder>;
    fn start_column_fields(&mut self) -> Box<dyn PivotAxisFieldsBuilder>;
    fn start_page_fields(&mut self) -> Box<dyn PivotAxisFieldsBuilder>;
    fn start_data_fields(&mut self) -> Box<dyn PivotDataFieldsBuilder>;
    fn start_row_items(&mut self) -> Box<dyn PivotItemsBuilder>;
    fn start_col_items(&mut self) -> Box<dyn PivotItemsBuilder>;
    fn commit(self: Box<Self>);
}

pub trait PivotFieldsBuilder {
    /// One pivot field with its axis and item list (item `x` = cache-item
    /// index, possibly hidden; `t` = summary type for a data-axis field).
    fn append_field(&mut self, axis: PivotAxis, items: &[(u32, bool)], subtotal: Option<PivotSubtotal>) {
        let (_, _, _) = (axis, items, subtotal);
    }
    fn commit(self: Box<Self>);
}

pub trait PivotAxisFieldsBuilder {
    /// A pivot-field index; `-2` is the synthetic data-field placeholder
    /// used when more than one data field exists (spec §4.10).
    fn append_field_index(&mut self, index: i32) {
        let _ = index;
    }
    fn commit(self: Box<Self>);
}

pub trait PivotDataFieldsBuilder {
    fn append_data_field(&mut self, field: u32, name: Option<&str>, subtotal: PivotSubtotal, base_field_item: Option<(u32, u32)>) {
        let (_, _, _, _) = (field, name, subtotal, base_field_item);
    }
    fn commit(self: Box<Self>);
}

pub trait PivotItemsBuilder {
    fn append_item(&mut self, item_type: Option<PivotSubtotal>, field_index: Option<u32>) {
        let (_, _) = (item_type, field_index);
    }
    fn commit(self: Box<Self>);
}

struct NullPivotCacheField;
impl PivotCacheField for NullPivotCacheField {
    fn commit_field(self: Box<Self>) {}
}

struct NullPivotFieldGroup;
impl PivotFieldGroup for NullPivotFieldGroup {
    fn commit(self: Box<Self>) {}
}
