//! `xl/pivotCache/pivotCacheDefinition*.xml` and `xl/pivotTables/pivotTable*.xml`
//! handlers (spec §4.10 "Pivot cache" / "Pivot table definition"), grounded
//! on `xlsx_pivot_context.{hpp,cpp}`.
//!
//! `pivotCacheRecords*.xml` (the raw row data backing a cache) is not
//! driven through the import interface at all — only the `sharedItems`
//! summary liborcus's own `xlsx_pivot_context` exposes is — so [`import`]
//! never opens that part.

use crate::context::{Context, ElementName};
use crate::error::Result;
use crate::import::types::{PivotAxis, PivotGroupBy, PivotSubtotal};
use crate::import::{
    ImportFactory, PivotCacheDefinition, PivotCacheField, PivotFieldGroup, PivotFieldsBuilder,
    PivotAxisFieldsBuilder, PivotDataFieldsBuilder, PivotItemsBuilder, PivotTableDefinition,
};
use crate::strings::StrView;
use crate::types::{CellAddress, CellRange};
use crate::xml::namespace::NamespaceRepository;
use crate::xml::sax::{self, XmlAttribute};
use crate::xml::tokens::{TokenId, TokenMap};

const CACHE_ELEMENTS: &[&str] = &[
    "pivotCacheDefinition", "cacheSource", "worksheetSource", "cacheFields", "cacheField",
    "sharedItems", "fieldGroup", "rangePr", "discretePr", "groupItems", "s", "n", "d", "e", "x",
    "name", "ref", "sheet", "v", "u", "base", "groupBy", "autoStart", "autoEnd", "startNum",
    "endNum", "startDate", "endDate", "count",
];

pub fn build_cache_tokens() -> TokenMap {
    TokenMap::new(CACHE_ELEMENTS)
}

pub fn parse_pivot_cache_definition(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_cache_tokens();
    let Some(cache) = factory.start_pivot_cache_definition() else { return Ok(()) };
    let mut ctx = CacheContext::new(&tokens, cache);
    let mut stack = crate::context::ContextStack::new(Box::new(CacheRoot { inner: &mut ctx }));
    sax::parse(xml, &mut repo, &tokens, &mut stack)?;
    stack.into_root();
    ctx.finish();
    Ok(())
}

fn tok(tokens: &TokenMap, name: &str) -> TokenId {
    tokens.get(name)
}

fn attr_str<'a>(attrs: &'a [XmlAttribute<'a>], tokens: &TokenMap, name: &str) -> Option<&'a str> {
    let id = tok(tokens, name);
    attrs.iter().find(|a| a.token == id).and_then(|a| a.value.as_str())
}

fn attr_u32(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<u32> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<u32>().ok())
}

fn attr_f64(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> Option<f64> {
    attr_str(attrs, tokens, name).and_then(|s| s.parse::<f64>().ok())
}

fn attr_bool(attrs: &[XmlAttribute<'_>], tokens: &TokenMap, name: &str) -> bool {
    matches!(attr_str(attrs, tokens, name), Some("1") | Some("true"))
}

fn parse_group_by(text: &str) -> PivotGroupBy {
    match text {
        "seconds" => PivotGroupBy::Seconds,
        "minutes" => PivotGroupBy::Minutes,
        "hours" => PivotGroupBy::Hours,
        "days" => PivotGroupBy::Days,
        "months" => PivotGroupBy::Months,
        "quarters" => PivotGroupBy::Quarters,
        "years" => PivotGroupBy::Years,
        _ => PivotGroupBy::Range,
    }
}

struct CacheContext<'a> {
    tokens: &'a TokenMap,
    cache: Box<dyn PivotCacheDefinition>,

    cur_field: Option<Box<dyn PivotCacheField>>,
    in_shared_items: bool,
    in_group_items: bool,
    in_discrete_pr: bool,
    cur_group: Option<Box<dyn PivotFieldGroup>>,
}

impl<'a> CacheContext<'a> {
    fn new(tokens: &'a TokenMap, cache: Box<dyn PivotCacheDefinition>) -> Self {
        CacheContext {
            tokens,
            cache,
            cur_field: None,
            in_shared_items: false,
            in_group_items: false,
            in_discrete_pr: false,
            cur_group: None,
        }
    }

    fn finish(self) {
        self.cache.commit();
    }

    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "worksheetSource") {
            let sheet = attr_str(attrs, self.tokens, "sheet").unwrap_or("").to_string();
            if let Some(range_text) = attr_str(attrs, self.tokens, "ref") {
                if let Some(range) = parse_simple_range(range_text) {
                    self.cache.set_worksheet_source_range(range, &sheet);
                }
            } else if let Some(name) = attr_str(attrs, self.tokens, "name") {
                self.cache.set_worksheet_source_table(name);
            }
        } else if t == tok(self.tokens, "cacheFields") {
            if let Some(count) = attr_u32(attrs, self.tokens, "count") {
                self.cache.set_field_count(count);
            }
        } else if t == tok(self.tokens, "cacheField") {
            let name = attr_str(attrs, self.tokens, "name").unwrap_or("");
            self.cur_field = Some(self.cache.start_field(name));
        } else if t == tok(self.tokens, "sharedItems") {
            self.in_shared_items = true;
            if let Some(min) = attr_f64(attrs, self.tokens, "minValue") {
                if let Some(f) = &mut self.cur_field {
                    f.set_min_value(min);
                }
            }
            if let Some(max) = attr_f64(attrs, self.tokens, "maxValue") {
                if let Some(f) = &mut self.cur_field {
                    f.set_max_value(max);
                }
            }
        } else if t == tok(self.tokens, "groupItems") {
            self.in_group_items = true;
        } else if t == tok(self.tokens, "fieldGroup") {
            let base = attr_u32(attrs, self.tokens, "base").unwrap_or(0);
            if let Some(f) = &mut self.cur_field {
                self.cur_group = Some(f.start_field_group(base));
            }
        } else if t == tok(self.tokens, "rangePr") {
            let Some(g) = &mut self.cur_group else { return };
            g.set_range_group_by(attr_str(attrs, self.tokens, "groupBy").map(parse_group_by).unwrap_or(PivotGroupBy::Range));
            g.set_auto_start(!matches!(attr_str(attrs, self.tokens, "autoStart"), Some("0") | Some("false")));
            g.set_auto_end(!matches!(attr_str(attrs, self.tokens, "autoEnd"), Some("0") | Some("false")));
            if let Some(v) = attr_f64(attrs, self.tokens, "startNum") {
                g.set_start_numeric(v);
            }
            if let Some(v) = attr_f64(attrs, self.tokens, "endNum") {
                g.set_end_numeric(v);
            }
            if let Some(v) = attr_str(attrs, self.tokens, "startDate") {
                g.set_start_date(v);
            }
            if let Some(v) = attr_str(attrs, self.tokens, "endDate") {
                g.set_end_date(v);
            }
        } else if t == tok(self.tokens, "discretePr") {
            self.in_discrete_pr = true;
        } else if t == tok(self.tokens, "x") && self.in_discrete_pr {
            if let (Some(g), Some(i)) = (&mut self.cur_group, attr_u32(attrs, self.tokens, "v")) {
                g.add_discrete_link(i);
            }
        } else if self.in_shared_items && !self.in_group_items {
            let field = match &mut self.cur_field {
                Some(f) => f,
                None => return,
            };
            let unused = attr_bool(attrs, self.tokens, "u");
            if t == tok(self.tokens, "s") {
                if let Some(v) = attr_str(attrs, self.tokens, "v") {
                    field.set_item_string(v);
                    if !unused {
                        field.commit_field_item();
                    }
                }
            } else if t == tok(self.tokens, "n") {
                if let Some(v) = attr_f64(attrs, self.tokens, "v") {
                    field.set_item_numeric(v);
                    if !unused {
                        field.commit_field_item();
                    }
                }
            } else if t == tok(self.tokens, "d") {
                if let Some(v) = attr_str(attrs, self.tokens, "v") {
                    field.set_item_date_time(v);
                    if !unused {
                        field.commit_field_item();
                    }
                }
            } else if t == tok(self.tokens, "e") {
                if let Some(v) = attr_str(attrs, self.tokens, "v") {
                    field.set_item_error(v);
                    if !unused {
                        field.commit_field_item();
                    }
                }
            }
        }
    }

    fn end(&mut self, name: ElementName) {
        let t = name.token;
        if t == tok(self.tokens, "sharedItems") {
            self.in_shared_items = false;
        } else if t == tok(self.tokens, "groupItems") {
            self.in_group_items = false;
        } else if t == tok(self.tokens, "discretePr") {
            self.in_discrete_pr = false;
        } else if t == tok(self.tokens, "fieldGroup") {
            if let Some(g) = self.cur_group.take() {
                g.commit();
            }
        } else if t == tok(self.tokens, "cacheField") {
            if let Some(f) = self.cur_field.take() {
                f.commit_field();
            }
        }
    }
}

/// Parses `"A1:D10"`/`"A1"` without requiring a sheet index (the sheet
/// name is carried separately in `worksheetSource`'s own `sheet` attr).
fn parse_simple_range(text: &str) -> Option<CellRange> {
    let ((c0, r0), (c1, r1)) = crate::formats::cell_ref::parse_range_ref(text)?;
    Some(CellRange { first: CellAddress { sheet: 0, row: r0, column: c0 }, last: CellAddress { sheet: 0, row: r1, column: c1 } })
}

struct CacheRoot<'a, 'b> {
    inner: &'a mut CacheContext<'b>,
}

impl<'a, 'b> Context for CacheRoot<'a, 'b> {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }
    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        self.inner.start(name, attrs);
    }
    fn end_element(&mut self, name: ElementName) -> bool {
        self.inner.end(name);
        false
    }
    fn characters(&mut self, _value: StrView<'_>, _transient: bool) {}
}

const TABLE_ELEMENTS: &[&str] = &[
    "pivotTableDefinition", "location", "pivotFields", "pivotField", "items", "item",
    "rowFields", "colFields", "pageFields", "field", "dataFields", "dataField", "rowItems",
    "colItems", "i", "x", "name", "ref", "axis", "x_attr", "t", "h", "fld", "subtotal",
    "baseField", "baseItem", "cacheId",
];

pub fn build_table_tokens() -> TokenMap {
    TokenMap::new(TABLE_ELEMENTS)
}

fn parse_axis(text: &str) -> Option<PivotAxis> {
    match text {
        "axisRow" => Some(PivotAxis::Row),
        "axisCol" => Some(PivotAxis::Column),
        "axisPage" => Some(PivotAxis::Page),
        "axisValues" => Some(PivotAxis::Data),
        _ => None,
    }
}

fn parse_item_subtotal(text: &str) -> Option<PivotSubtotal> {
    Some(match text {
        "default" => PivotSubtotal::Default,
        "grand" => PivotSubtotal::GrandTotal,
        "sum" => PivotSubtotal::Sum,
        "count" => PivotSubtotal::Count,
        "countA" | "countNums" => PivotSubtotal::CountNumbers,
        "avg" | "average" => PivotSubtotal::Average,
        "max" => PivotSubtotal::Max,
        "min" => PivotSubtotal::Min,
        "product" => PivotSubtotal::Product,
        "stdDev" => PivotSubtotal::StdDev,
        "stdDevP" => PivotSubtotal::StdDevP,
        "var" => PivotSubtotal::Var,
        "varP" => PivotSubtotal::VarP,
        "blank" => PivotSubtotal::BlankLine,
        "data" => PivotSubtotal::Data,
        _ => return None,
    })
}

pub fn parse_pivot_table_definition(xml: &[u8], factory: &mut dyn ImportFactory) -> Result<()> {
    let mut repo = NamespaceRepository::new();
    let tokens = build_table_tokens();
    let Some(table) = factory.start_pivot_table_definition() else { return Ok(()) };
    let mut ctx = TableContext::new(&tokens, table);
    let mut stack = crate::context::ContextStack::new(Box::new(TableRoot { inner: &mut ctx }));
    sax::parse(xml, &mut repo, &tokens, &mut stack)?;
    stack.into_root();
    ctx.finish();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableSection {
    None,
    PivotFields,
    RowFields,
    ColFields,
    PageFields,
    DataFields,
    RowItems,
    ColItems,
}

struct TableContext<'a> {
    tokens: &'a TokenMap,
    table: Box<dyn PivotTableDefinition>,
    section: TableSection,

    pivot_fields: Option<Box<dyn PivotFieldsBuilder>>,
    axis_fields: Option<Box<dyn PivotAxisFieldsBuilder>>,
    data_fields: Option<Box<dyn PivotDataFieldsBuilder>>,
    items_builder: Option<Box<dyn PivotItemsBuilder>>,

    cur_field_axis: Option<PivotAxis>,
    cur_field_items: Vec<(u32, bool)>,
    cur_field_subtotal: Option<PivotSubtotal>,

    cur_item_type: Option<PivotSubtotal>,
    cur_item_field_index: Option<u32>,
    in_item: bool,
}

impl<'a> TableContext<'a> {
    fn new(tokens: &'a TokenMap, table: Box<dyn PivotTableDefinition>) -> Self {
        TableContext {
            tokens,
            table,
            section: TableSection::None,
            pivot_fields: None,
            axis_fields: None,
            data_fields: None,
            items_builder: None,
            cur_field_axis: None,
            cur_field_items: Vec::new(),
            cur_field_subtotal: None,
            cur_item_type: None,
            cur_item_field_index: None,
            in_item: false,
        }
    }

    fn finish(mut self) {
        self.flush_section();
        self.table.commit();
    }

    fn flush_section(&mut self) {
        if let Some(b) = self.pivot_fields.take() {
            b.commit();
        }
        if let Some(b) = self.axis_fields.take() {
            b.commit();
        }
        if let Some(b) = self.data_fields.take() {
            b.commit();
        }
        if let Some(b) = self.items_builder.take() {
            b.commit();
        }
    }

    fn start(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        let t = name.token;
        if t == tok(self.tokens, "location") {
            if let Some(range_text) = attr_str(attrs, self.tokens, "ref") {
                if let Some(range) = parse_simple_range(range_text) {
                    self.table.set_range(range);
                }
            }
        } else if t == tok(self.tokens, "pivotFields") {
            self.section = TableSection::PivotFields;
            self.pivot_fields = Some(self.table.start_pivot_fields());
        } else if t == tok(self.tokens, "pivotField") {
            self.cur_field_axis = attr_str(attrs, self.tokens, "axis").and_then(parse_axis);
            self.cur_field_items.clear();
            self.cur_field_subtotal = None;
        } else if t == tok(self.tokens, "item") && self.section == TableSection::PivotFields {
            if let Some(x) = attr_u32(attrs, self.tokens, "x") {
                let hidden = attr_bool(attrs, self.tokens, "h");
                self.cur_field_items.push((x, hidden));
            } else if let Some(marker) = attr_str(attrs, self.tokens, "t").and_then(parse_item_subtotal) {
                self.cur_field_subtotal = Some(marker);
            }
        } else if t == tok(self.tokens, "rowFields") {
            self.section = TableSection::RowFields;
            self.axis_fields = Some(self.table.start_row_fields());
        } else if t == tok(self.tokens, "colFields") {
            self.section = TableSection::ColFields;
            self.axis_fields = Some(self.table.start_column_fields());
        } else if t == tok(self.tokens, "pageFields") {
            self.section = TableSection::PageFields;
            self.axis_fields = Some(self.table.start_page_fields());
        } else if t == tok(self.tokens, "field") {
            if let Some(idx) = attr_str(attrs, self.tokens, "x").and_then(|s| s.parse::<i32>().ok()) {
                if let Some(b) = &mut self.axis_fields {
                    b.append_field_index(idx);
                }
            }
        } else if t == tok(self.tokens, "dataFields") {
            self.section = TableSection::DataFields;
            self.data_fields = Some(self.table.start_data_fields());
        } else if t == tok(self.tokens, "dataField") {
            let Some(field) = attr_u32(attrs, self.tokens, "fld") else { return };
            let name = attr_str(attrs, self.tokens, "name");
            let subtotal = attr_str(attrs, self.tokens, "subtotal").and_then(parse_item_subtotal).unwrap_or(PivotSubtotal::Sum);
            let base = match (attr_u32(attrs, self.tokens, "baseField"), attr_u32(attrs, self.tokens, "baseItem")) {
                (Some(f), Some(i)) => Some((f, i)),
                _ => None,
            };
            if let Some(b) = &mut self.data_fields {
                b.append_data_field(field, name, subtotal, base);
            }
        } else if t == tok(self.tokens, "rowItems") {
            self.section = TableSection::RowItems;
            self.items_builder = Some(self.table.start_row_items());
        } else if t == tok(self.tokens, "colItems") {
            self.section = TableSection::ColItems;
            self.items_builder = Some(self.table.start_col_items());
        } else if t == tok(self.tokens, "i") {
            self.in_item = true;
            self.cur_item_type = attr_str(attrs, self.tokens, "t").and_then(parse_item_subtotal);
            self.cur_item_field_index = None;
        } else if t == tok(self.tokens, "x") && self.in_item {
            if self.cur_item_field_index.is_none() {
                self.cur_item_field_index = attr_u32(attrs, self.tokens, "v").or(Some(0));
            }
        }
    }

    fn end(&mut self, name: ElementName) {
        let t = name.token;
        if t == tok(self.tokens, "pivotField") {
            if let Some(b) = &mut self.pivot_fields {
                let axis = self.cur_field_axis.unwrap_or(PivotAxis::Data);
                b.append_field(axis, &self.cur_field_items, self.cur_field_subtotal);
            }
        } else if t == tok(self.tokens, "i") {
            if let Some(b) = &mut self.items_builder {
                b.append_item(self.cur_item_type, self.cur_item_field_index);
            }
            self.in_item = false;
        } else if matches!(t, x if x == tok(self.tokens, "pivotFields")
            || x == tok(self.tokens, "rowFields")
            || x == tok(self.tokens, "colFields")
            || x == tok(self.tokens, "pageFields")
            || x == tok(self.tokens, "dataFields")
            || x == tok(self.tokens, "rowItems")
            || x == tok(self.tokens, "colItems"))
        {
            self.flush_section();
            self.section = TableSection::None;
        }
    }
}

struct TableRoot<'a, 'b> {
    inner: &'a mut TableContext<'b>,
}

impl<'a, 'b> Context for TableRoot<'a, 'b> {
    fn can_handle_element(&self, _name: ElementName) -> bool {
        true
    }
    fn start_element(&mut self, name: ElementName, attrs: &[XmlAttribute<'_>]) {
        self.inner.start(name, attrs);
    }
    fn end_element(&mut self, name: ElementName) -> bool {
        self.inner.end(name);
        false
    }
    fn characters(&mut self, _value: StrView<'_>, _transient: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct RecordingField {
        pending: Option<String>,
        committed: Rc<RefCell<Vec<String>>>,
    }
    impl PivotCacheField for RecordingField {
        fn set_item_string(&mut self, value: &str) {
            self.pending = Some(value.to_string());
        }
        fn commit_field_item(&mut self) {
            if let Some(v) = self.pending.take() {
                self.committed.borrow_mut().push(v);
            }
        }
        fn commit_field(self: Box<Self>) {}
    }

    struct RecordingCache {
        committed: Rc<RefCell<Vec<String>>>,
    }
    impl PivotCacheDefinition for RecordingCache {
        fn start_field(&mut self, _name: &str) -> Box<dyn PivotCacheField> {
            Box::new(RecordingField { pending: None, committed: self.committed.clone() })
        }
        fn commit(self: Box<Self>) {}
    }

    #[test]
    fn unused_shared_item_is_not_committed() {
        let xml = br#"<pivotCacheDefinition>
 <cacheFields count="1">
  <cacheField name="Region">
   <sharedItems>
    <s v="East"/><s v="West"/><s v="East" u="1"/>
   </sharedItems>
  </cacheField>
 </cacheFields>
</pivotCacheDefinition>"#;
        let tokens = build_cache_tokens();
        let committed = Rc::new(RefCell::new(Vec::new()));
        let cache: Box<dyn PivotCacheDefinition> = Box::new(RecordingCache { committed: committed.clone() });
        let mut ctx = CacheContext::new(&tokens, cache);
        {
            let mut repo = NamespaceRepository::new();
            let mut stack = crate::context::ContextStack::new(Box::new(CacheRoot { inner: &mut ctx }));
            sax::parse(xml, &mut repo, &tokens, &mut stack).unwrap();
            stack.into_root();
        }
        ctx.finish();
        assert_eq!(*committed.borrow(), vec!["East".to_string(), "West".to_string()]);
    }
}
