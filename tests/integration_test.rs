//! Integration tests for docimport: one end-to-end test per format
//! handler, driving `formats::*::import` against an in-memory document
//! (a minimal in-memory zip for the package formats) through a recorded
//! `ImportFactory` mock, mirroring the style of each handler's own
//! `#[cfg(test)]` module but exercised through the public crate API only.

use docimport::formats::{gnumeric, ods, xls_xml, xlsx};
use docimport::import::{
    ArrayFormula, Formula, ImportFactory, NamedExpression, Sheet, SheetProperties, SharedStringSegments, SharedStrings,
};
use docimport::CellRange;

#[derive(Default)]
struct RecordedSheet {
    values: Vec<(i32, i32, f64)>,
    strings: Vec<(i32, i32, u32)>,
    bools: Vec<(i32, i32, bool)>,
    merges: Vec<CellRange>,
    formulas: Vec<(i32, i32, String)>,
}

impl Sheet for RecordedSheet {
    fn set_value(&mut self, row: i32, column: i32, value: f64) {
        self.values.push((row, column, value));
    }
    fn set_bool(&mut self, row: i32, column: i32, value: bool) {
        self.bools.push((row, column, value));
    }
    fn set_string(&mut self, row: i32, column: i32, string_id: u32) {
        self.strings.push((row, column, string_id));
    }
    fn sheet_properties(&mut self) -> Option<&mut dyn SheetProperties> {
        Some(self)
    }
    fn start_formula(&mut self) -> Option<Box<dyn Formula>> {
        Some(Box::new(RecordedFormula::default()))
    }
    fn start_array_formula(&mut self) -> Option<Box<dyn ArrayFormula>> {
        Some(Box::new(RecordedArrayFormula))
    }
    fn named_expression(&mut self) -> Option<Box<dyn NamedExpression>> {
        Some(Box::new(RecordedNamedExpression))
    }
}

impl SheetProperties for RecordedSheet {
    fn set_merge_cell_range(&mut self, range: CellRange) {
        self.merges.push(range);
    }
}

#[derive(Default)]
struct RecordedFormula {
    position: (i32, i32),
    text: String,
}

impl Formula for RecordedFormula {
    fn set_position(&mut self, row: i32, column: i32) {
        self.position = (row, column);
    }
    fn set_formula(&mut self, _grammar: docimport::FormulaGrammar, text: &str) {
        self.text = text.to_string();
    }
    fn commit(self: Box<Self>) {}
}

struct RecordedArrayFormula;
impl ArrayFormula for RecordedArrayFormula {
    fn commit(self: Box<Self>) {}
}

struct RecordedNamedExpression;
impl NamedExpression for RecordedNamedExpression {}

#[derive(Default)]
struct RecordedStrings {
    values: Vec<String>,
}

impl SharedStrings for RecordedStrings {
    fn add(&mut self, value: &str) -> u32 {
        self.values.push(value.to_string());
        (self.values.len() - 1) as u32
    }
    fn start_segments(&mut self) -> Box<dyn SharedStringSegments> {
        unimplemented!("not exercised by these tests")
    }
}

#[derive(Default)]
struct RecordedFactory {
    sheets: Vec<RecordedSheet>,
    shared: RecordedStrings,
    finalized: bool,
}

impl ImportFactory for RecordedFactory {
    fn append_sheet(&mut self, sheet_index: i32, _name: &str) -> Option<&mut dyn Sheet> {
        while self.sheets.len() <= sheet_index as usize {
            self.sheets.push(RecordedSheet::default());
        }
        Some(&mut self.sheets[sheet_index as usize])
    }
    fn sheet_by_index(&mut self, index: i32) -> Option<&mut dyn Sheet> {
        if index < 0 {
            return None;
        }
        while self.sheets.len() <= index as usize {
            self.sheets.push(RecordedSheet::default());
        }
        Some(&mut self.sheets[index as usize])
    }
    fn shared_strings(&mut self) -> Option<&mut dyn SharedStrings> {
        Some(&mut self.shared)
    }
    fn finalize(&mut self) {
        self.finalized = true;
    }
}

/// Builds a minimal multi-entry, uncompressed (stored) in-memory zip, so
/// the xlsx/ods tests exercise the real `ZipArchive` central-directory
/// walk rather than reading loose XML. Compression is intentionally left
/// out here: `zip.rs`'s own tests already cover the DEFLATE path.
fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
    const CENTRAL_DIR_SIGNATURE: u32 = 0x0201_4b50;
    const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;

    let mut out = Vec::new();
    let mut central = Vec::new();
    let mut offsets = Vec::new();

    for (name, data) in entries {
        offsets.push(out.len() as u32);
        out.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);
    }

    let central_dir_offset = out.len() as u32;
    for ((name, data), &local_offset) in entries.iter().zip(&offsets) {
        central.extend_from_slice(&CENTRAL_DIR_SIGNATURE.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes()); // stored
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&local_offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    out.extend_from_slice(&central);

    let central_dir_size = out.len() as u32 - central_dir_offset;
    out.extend_from_slice(&END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&central_dir_size.to_le_bytes());
    out.extend_from_slice(&central_dir_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

#[test]
fn xls_xml_end_to_end_dispatches_cells_and_merges() {
    let xml = br#"<ss:Workbook xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <ss:Worksheet ss:Name="Sheet1">
  <ss:Table>
   <ss:Row>
    <ss:Cell><ss:Data ss:Type="Number">12.5</ss:Data></ss:Cell>
    <ss:Cell ss:MergeAcross="1"><ss:Data ss:Type="String">merged</ss:Data></ss:Cell>
   </ss:Row>
  </ss:Table>
 </ss:Worksheet>
</ss:Workbook>"#;
    let mut factory = RecordedFactory::default();
    xls_xml::import(xml, &mut factory).unwrap();
    assert_eq!(factory.sheets[0].values, vec![(0, 0, 12.5)]);
    assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
    assert_eq!(factory.shared.values, vec!["merged".to_string()]);
    assert_eq!(factory.sheets[0].merges.len(), 1);
}

#[test]
fn gnumeric_end_to_end_dispatches_value_and_string_cells() {
    let xml = br#"<gnm:Workbook xmlns:gnm="http://www.gnumeric.org/v10.dtd">
 <gnm:Sheets>
  <gnm:Sheet>
   <gnm:Cells>
    <gnm:Cell Row="0" Col="0" ValueType="40">42</gnm:Cell>
    <gnm:Cell Row="0" Col="1" ValueType="60">hi</gnm:Cell>
   </gnm:Cells>
  </gnm:Sheet>
 </gnm:Sheets>
</gnm:Workbook>"#;
    let mut factory = RecordedFactory::default();
    gnumeric::import(xml, &mut factory).unwrap();
    assert_eq!(factory.sheets[0].values, vec![(0, 0, 42.0)]);
    assert_eq!(factory.shared.values, vec!["hi".to_string()]);
}

#[test]
fn xlsx_end_to_end_resolves_package_parts_and_dispatches_cells() {
    let workbook_xml = br#"<workbook>
        <sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
    </workbook>"#;
    let rels_xml = br#"<Relationships>
        <Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
    </Relationships>"#;
    let sheet_xml = br#"<worksheet><sheetData>
        <row r="1"><c r="A1"><v>42</v></c><c r="B1" t="s"><v>0</v></c></row>
    </sheetData></worksheet>"#;
    let shared_strings_xml = br#"<sst><si><t>hello</t></si></sst>"#;

    let zip_bytes = build_zip(&[
        ("xl/workbook.xml", workbook_xml),
        ("xl/_rels/workbook.xml.rels", rels_xml),
        ("xl/worksheets/sheet1.xml", sheet_xml),
        ("xl/sharedStrings.xml", shared_strings_xml),
    ]);

    let mut factory = RecordedFactory::default();
    xlsx::import(&zip_bytes, &mut factory).unwrap();
    assert_eq!(factory.sheets[0].values, vec![(0, 0, 42.0)]);
    assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
    assert!(factory.finalized);
}

#[test]
fn ods_end_to_end_resolves_package_parts_and_dispatches_cells() {
    let content_xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="7"/>
    <table:table-cell office:value-type="string" office:string-value="hi"/>
   </table:table-row>
  </table:table>
 </office:spreadsheet></office:body>
</office:document-content>"#;

    let zip_bytes = build_zip(&[
        ("mimetype", b"application/vnd.oasis.opendocument.spreadsheet"),
        ("content.xml", content_xml),
    ]);

    let mut factory = RecordedFactory::default();
    ods::import(&zip_bytes, &mut factory).unwrap();
    assert_eq!(factory.sheets[0].values, vec![(0, 0, 7.0)]);
    assert_eq!(factory.sheets[0].strings, vec![(0, 1, 0)]);
    assert!(factory.finalized);
}

#[test]
fn ods_end_to_end_with_database_range_and_filter() {
    let content_xml = br#"<office:document-content>
 <office:body><office:spreadsheet>
  <table:table table:name="Sheet1">
   <table:table-row>
    <table:table-cell office:value-type="float" office:value="1"/>
   </table:table-row>
  </table:table>
  <table:database-ranges>
   <table:database-range table:name="Range1" table:target-range-address="Sheet1.A1:A1">
    <table:filter>
     <table:filter-condition table:field-number="0" table:operator="=" table:value="1" table:data-type="number"/>
    </table:filter>
   </table:database-range>
  </table:database-ranges>
 </office:spreadsheet></office:body>
</office:document-content>"#;

    let zip_bytes = build_zip(&[
        ("mimetype", b"application/vnd.oasis.opendocument.spreadsheet"),
        ("content.xml", content_xml),
    ]);

    let mut factory = RecordedFactory::default();
    // A database range with a filter drives `Table`/`AutoFilter` rather
    // than `Sheet`, neither of which `RecordedSheet` implements beyond
    // their default no-op bodies; this only asserts the parse completes
    // without error and the plain cell data still lands correctly.
    ods::import(&zip_bytes, &mut factory).unwrap();
    assert_eq!(factory.sheets[0].values, vec![(0, 0, 1.0)]);
}
