//! Shared XLSX value, address, and error models.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure raised by the package and workbook layers.
#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("Workbook file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),
    #[error("Sheet already exists: {0:?}")]
    DuplicateName(String),
    #[error("Invalid cell address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Invalid sheet name {name:?}: {reason}")]
    InvalidSheetName { name: String, reason: String },
    #[error("Malformed workbook package: {0}")]
    Package(String),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tabular data error: {0}")]
    Tabular(String),
}

impl XlsxError {
    pub(crate) fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Scalar stored in (or read from) one worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Blank cell.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Formula text without the leading `=`.
    Formula(String),
}

impl EnumCellValue {
    pub fn is_none(&self) -> bool {
        matches!(self, EnumCellValue::None)
    }

    /// Render the value the way it would appear in a plain-text export.
    ///
    /// Integral numbers drop their fractional part; formulas keep a leading `=`.
    pub fn to_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(s) => s.clone(),
            EnumCellValue::Number(n) => format_number_text(*n),
            EnumCellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            EnumCellValue::Formula(f) => format!("={f}"),
        }
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        EnumCellValue::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        EnumCellValue::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        EnumCellValue::Number(value)
    }
}

/// Text form of a number as written into `<v>` or shown to an operator.
pub fn format_number_text(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellAddress

/// One-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecCellAddress {
    /// One-based row number.
    pub n_row: u32,
    /// One-based column number.
    pub n_col: u32,
}

impl SpecCellAddress {
    pub fn new(n_row: u32, n_col: u32) -> Self {
        Self { n_row, n_col }
    }

    /// Address `n` rows further down the same column.
    pub fn offset_rows(&self, n: u32) -> Self {
        Self {
            n_row: self.n_row + n,
            n_col: self.n_col,
        }
    }
}

impl fmt::Display for SpecCellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            crate::util::derive_column_letters(self.n_col),
            self.n_row
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-call mutation report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Addresses written, in write order.
    pub cells: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
