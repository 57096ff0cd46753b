//! Uploaded article lists.
//!
//! Uploads are fully buffered. CSV goes through the polars reader with every
//! column kept as text; spreadsheets go through calamine with cell positions
//! kept absolute so `F1` stays `F1`.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use polars::prelude::{AnyValue, CsvParseOptions, CsvReadOptions, DataFrame, SerReader};
use promokit_io_xlsx::{EnumCellValue, derive_dataframe_from_grid};

use crate::conf::{N_IDX_TUPLE_COL, N_IDX_TUPLE_ROW};
use crate::dates::{convert_excel_serial_to_date, format_date};
use crate::error::{CampaignResult, EnumCampaignError};
use crate::profile::EnumTupleSource;
use crate::sql::format_sql_tuple;

////////////////////////////////////////////////////////////////////////////////
// #region Upload

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumUploadFormat {
    Csv,
    Spreadsheet,
}

/// A buffered file supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecUpload {
    pub file_name: String,
    pub v_bytes: Vec<u8>,
    /// Sheet to read from a spreadsheet upload; first sheet when `None`.
    pub sheet: Option<String>,
}

impl SpecUpload {
    pub fn new(file_name: impl Into<String>, v_bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            v_bytes,
            sheet: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn from_path(path: &Path) -> CampaignResult<Self> {
        let v_bytes = std::fs::read(path).map_err(|err| EnumCampaignError::file_access(path, err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, v_bytes))
    }

    pub fn format(&self) -> CampaignResult<EnumUploadFormat> {
        let c_ext = Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match c_ext.as_str() {
            "csv" => Ok(EnumUploadFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(EnumUploadFormat::Spreadsheet),
            _ => Err(EnumCampaignError::Validation(format!(
                "Upload {:?} is neither CSV nor a spreadsheet.",
                self.file_name
            ))),
        }
    }

    fn access_error(&self, message: impl ToString) -> EnumCampaignError {
        EnumCampaignError::file_access(&self.file_name, message)
    }
}

/// Sheet names of a spreadsheet upload; empty for CSV.
pub fn list_upload_sheets(upload: &SpecUpload) -> CampaignResult<Vec<String>> {
    match upload.format()? {
        EnumUploadFormat::Csv => Ok(Vec::new()),
        EnumUploadFormat::Spreadsheet => {
            let workbook = open_workbook_auto_from_rs(Cursor::new(upload.v_bytes.clone()))
                .map_err(|err| upload.access_error(err))?;
            Ok(workbook.sheet_names())
        }
    }
}

/// Cell range of the selected sheet of a spreadsheet upload.
pub(crate) fn read_upload_range(upload: &SpecUpload) -> CampaignResult<Range<Data>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(upload.v_bytes.clone()))
        .map_err(|err| upload.access_error(err))?;
    let l_names = workbook.sheet_names();
    let c_sheet = match &upload.sheet {
        Some(name) if l_names.contains(name) => name.clone(),
        Some(name) => {
            return Err(EnumCampaignError::Validation(format!(
                "Upload {:?} has no sheet {name:?}; sheets are {l_names:?}.",
                upload.file_name
            )));
        }
        None => l_names
            .first()
            .cloned()
            .ok_or_else(|| upload.access_error("workbook has no sheets"))?,
    };
    workbook
        .worksheet_range(&c_sheet)
        .map_err(|err| upload.access_error(err))
}

/// Dense grid with absolute positions: row 0 is sheet row 1.
pub(crate) fn convert_range_to_grid(range: &Range<Data>) -> Vec<Vec<EnumCellValue>> {
    let (Some((n_row_start, n_col_start)), Some((n_row_end, n_col_end))) =
        (range.start(), range.end())
    else {
        return Vec::new();
    };
    let mut l_grid =
        vec![vec![EnumCellValue::None; n_col_end as usize + 1]; n_row_end as usize + 1];
    for (idx_row, idx_col, cell) in range.cells() {
        let n_row = n_row_start as usize + idx_row;
        let n_col = n_col_start as usize + idx_col;
        l_grid[n_row][n_col] = convert_data_to_cell_value(cell);
    }
    l_grid
}

fn convert_data_to_cell_value(cell: &Data) -> EnumCellValue {
    match cell {
        Data::Empty => EnumCellValue::None,
        Data::String(s) => EnumCellValue::String(s.clone()),
        Data::Float(f) => EnumCellValue::Number(*f),
        Data::Int(i) => EnumCellValue::Number(*i as f64),
        Data::Bool(b) => EnumCellValue::Boolean(*b),
        Data::DateTime(dt) => match convert_excel_serial_to_date(dt.as_f64()) {
            Some(date) => EnumCellValue::String(format_date(date)),
            None => EnumCellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => EnumCellValue::String(s.clone()),
        Data::Error(err) => EnumCellValue::String(err.to_string()),
    }
}

fn read_csv_grid(upload: &SpecUpload) -> CampaignResult<Vec<Vec<EnumCellValue>>> {
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(Cursor::new(upload.v_bytes.clone()))
        .finish()
        .map_err(|err| upload.access_error(err))?;

    let l_cols = df.get_columns();
    let mut l_grid = Vec::with_capacity(df.height());
    for idx_row in 0..df.height() {
        let mut l_row = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col.get(idx_row).map_err(|err| upload.access_error(err))?;
            l_row.push(match value {
                AnyValue::Null => EnumCellValue::None,
                AnyValue::String(s) => EnumCellValue::String(s.to_string()),
                AnyValue::StringOwned(s) => EnumCellValue::String(s.to_string()),
                other => EnumCellValue::String(other.to_string()),
            });
        }
        l_grid.push(l_row);
    }
    Ok(l_grid)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ArticleList

/// Year context of an upload in multi-phase mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumYearLabel {
    Ty,
    Ly,
    Lly,
}

impl EnumYearLabel {
    pub const ALL: [EnumYearLabel; 3] = [Self::Ty, Self::Ly, Self::Lly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ty => "TY",
            Self::Ly => "LY",
            Self::Lly => "LLY",
        }
    }
}

impl fmt::Display for EnumYearLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uploaded article dataset, kept exactly as uploaded (no header row
/// assumed).
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleList {
    pub label: Option<EnumYearLabel>,
    pub c_source: String,
    l_grid: Vec<Vec<EnumCellValue>>,
}

impl ArticleList {
    pub fn load(upload: &SpecUpload, label: Option<EnumYearLabel>) -> CampaignResult<Self> {
        let l_grid = match upload.format()? {
            EnumUploadFormat::Csv => read_csv_grid(upload)?,
            EnumUploadFormat::Spreadsheet => convert_range_to_grid(&read_upload_range(upload)?),
        };
        Ok(Self::from_grid(l_grid, label, upload.file_name.clone()))
    }

    pub fn from_grid(
        l_grid: Vec<Vec<EnumCellValue>>,
        label: Option<EnumYearLabel>,
        c_source: impl Into<String>,
    ) -> Self {
        Self {
            label,
            c_source: c_source.into(),
            l_grid,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.l_grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_grid.is_empty()
    }

    /// Every row exactly as uploaded, header row included.
    pub fn rows(&self) -> &[Vec<EnumCellValue>] {
        &self.l_grid
    }

    /// Every row exactly as uploaded, header row included, columns named
    /// `column_1..n`. Blank cells stay null.
    pub fn raw(&self) -> CampaignResult<DataFrame> {
        Ok(derive_dataframe_from_grid(&self.l_grid)?)
    }

    /// Pre-built tuple text stored in `F1`, if any.
    pub fn tuple_cell(&self) -> Option<String> {
        self.l_grid
            .get(N_IDX_TUPLE_ROW)
            .and_then(|row| row.get(N_IDX_TUPLE_COL))
            .filter(|value| !value.is_none())
            .map(EnumCellValue::to_text)
            .filter(|c_text| !c_text.trim().is_empty())
    }

    /// Non-blank column A values below the header row.
    pub fn article_ids(&self) -> Vec<String> {
        self.l_grid
            .iter()
            .skip(1)
            .filter_map(|row| row.first())
            .map(EnumCellValue::to_text)
            .map(|c_text| c_text.trim().to_string())
            .filter(|c_text| !c_text.is_empty())
            .collect()
    }

    pub fn derive_sql_tuple(&self, source: EnumTupleSource) -> String {
        match source {
            EnumTupleSource::Auto => self
                .tuple_cell()
                .unwrap_or_else(|| format_sql_tuple(&self.article_ids())),
            EnumTupleSource::Cell => self
                .tuple_cell()
                .unwrap_or_else(|| format_sql_tuple::<String>(&[])),
            EnumTupleSource::Column => format_sql_tuple(&self.article_ids()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn xlsx_upload() -> SpecUpload {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Notes").unwrap();
        sheet.write_string(0, 0, "ignore me").unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Articles").unwrap();
        sheet.write_string(0, 0, "Article").unwrap();
        sheet.write_string(0, 5, "('100','200')").unwrap();
        sheet.write_number(1, 0, 100.0).unwrap();
        sheet.write_number(2, 0, 200.0).unwrap();
        SpecUpload::new("articles.xlsx", workbook.save_to_buffer().unwrap())
    }

    #[test]
    fn test_csv_upload_keeps_text_and_tuple_cell() {
        let c_csv = "Article,Desc,,,,\"('00123','00456')\"\n00123,Soap\n00456,Shampoo\n";
        let upload = SpecUpload::new("list.CSV", c_csv.as_bytes().to_vec());
        let articles = ArticleList::load(&upload, Some(EnumYearLabel::Ty)).unwrap();

        assert_eq!(articles.n_rows(), 3);
        assert_eq!(articles.tuple_cell().as_deref(), Some("('00123','00456')"));
        assert_eq!(articles.article_ids(), vec!["00123", "00456"]);
        assert_eq!(
            articles.derive_sql_tuple(EnumTupleSource::Column),
            "('00123','00456')"
        );
        let df = articles.raw().unwrap();
        assert_eq!(df.shape(), (3, 6));
        assert_eq!(df.column("column_2").unwrap().null_count(), 1);
    }

    #[test]
    fn test_xlsx_upload_with_selected_sheet() {
        let upload = xlsx_upload();
        assert_eq!(list_upload_sheets(&upload).unwrap(), vec!["Notes", "Articles"]);

        let first = ArticleList::load(&upload, None).unwrap();
        assert_eq!(first.n_rows(), 1);
        assert_eq!(first.tuple_cell(), None);

        let articles = ArticleList::load(&upload.clone().with_sheet("Articles"), None).unwrap();
        assert_eq!(articles.article_ids(), vec!["100", "200"]);
        assert_eq!(
            articles.derive_sql_tuple(EnumTupleSource::Auto),
            "('100','200')"
        );

        let missing = upload.with_sheet("Nope");
        assert!(matches!(
            ArticleList::load(&missing, None),
            Err(EnumCampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_tuple_sources_without_cell() {
        let l_grid = vec![
            vec![EnumCellValue::String("Article".to_string())],
            vec![EnumCellValue::String("A-1".to_string())],
            vec![EnumCellValue::None],
            vec![EnumCellValue::String("A-2".to_string())],
        ];
        let articles = ArticleList::from_grid(l_grid, None, "grid");
        assert_eq!(articles.derive_sql_tuple(EnumTupleSource::Auto), "('A-1','A-2')");
        assert_eq!(articles.derive_sql_tuple(EnumTupleSource::Cell), "()");
    }

    #[test]
    fn test_unsupported_upload_type() {
        let upload = SpecUpload::new("list.txt", b"A\n".to_vec());
        assert!(matches!(
            ArticleList::load(&upload, None),
            Err(EnumCampaignError::Validation(_))
        ));
    }
}
