//! `promokit_io_xlsx`:
//! Template-preserving XLSX mutation kernel.
//!
//! - `conf`     : limits, part paths and relationship types
//! - `spec`     : cell values, addresses, reports and errors
//! - `util`     : address parsing, sheet-name rules, value coercion
//! - `package`  : zip container, relationships, content types, workbook index
//! - `sheet`    : worksheet XML model
//! - `tabular`  : `DataFrame` <-> cell grid conversion
//! - `workbook` : `XlsxWorkbook`, the editing surface
pub mod conf;
pub mod package;
pub mod sheet;
pub mod spec;
pub mod tabular;
pub mod util;
pub mod workbook;

pub use conf::{C_MIME_XLSX, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
pub use spec::{EnumCellValue, SpecCellAddress, SpecXlsxReport, XlsxError};
pub use tabular::{derive_cell_grid, derive_dataframe_from_grid};
pub use util::{
    convert_text_to_cell_value, derive_free_sheet_name, parse_cell_address, parse_column_letters,
    sanitize_sheet_name, validate_sheet_name,
};
pub use workbook::XlsxWorkbook;
