//! Constants shared by the OOXML package and workbook layers.

/// Maximum worksheet name length accepted by Excel.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Maximum rows per worksheet.
pub const N_NROWS_EXCEL_MAX: u32 = 1_048_576;
/// Maximum columns per worksheet.
pub const N_NCOLS_EXCEL_MAX: u32 = 16_384;
/// Characters Excel rejects in worksheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Media type of a serialized workbook.
pub const C_MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

////////////////////////////////////////////////////////////////////////////////
// #region PackageParts

pub const C_PART_CONTENT_TYPES: &str = "[Content_Types].xml";
pub const C_PART_WORKBOOK: &str = "xl/workbook.xml";
pub const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
pub const C_PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
pub const C_PART_CALC_CHAIN: &str = "xl/calcChain.xml";
pub const C_DIR_WORKSHEETS: &str = "xl/worksheets";

pub const C_NS_SPREADSHEETML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const C_NS_DOC_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const C_NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

pub const C_REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const C_REL_TYPE_CALC_CHAIN: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";
pub const C_REL_TYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const C_REL_TYPE_PRINTER_SETTINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/printerSettings";

pub const C_CONTENT_TYPE_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Relationship types a duplicated sheet may keep pointing at.
pub const TUP_REL_TYPES_SHAREABLE: [&str; 2] = [C_REL_TYPE_HYPERLINK, C_REL_TYPE_PRINTER_SETTINGS];

/// Worksheet children whose relationship targets belong to exactly one sheet.
pub const TUP_SHEET_ELEMENTS_UNSHARED: [&str; 7] = [
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "tableParts",
];

/// Workbook children that must follow `calcPr`.
pub const TUP_WORKBOOK_ELEMENTS_AFTER_CALC_PR: [&str; 9] = [
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Body of a freshly created worksheet part.
pub const C_XML_WORKSHEET_EMPTY: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<dimension ref="A1"/>"#,
    r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#,
    r#"<sheetFormatPr defaultRowHeight="15"/>"#,
    r#"<sheetData/>"#,
    r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    r#"</worksheet>"#,
);

// #endregion
////////////////////////////////////////////////////////////////////////////////
