//! Seed values extracted from a pre-filled request form.

use calamine::{Data, Range};
use chrono::NaiveDate;
use promokit_io_xlsx::{EnumCellValue, XlsxWorkbook, parse_cell_address};
use tracing::debug;

use crate::article::{EnumUploadFormat, SpecUpload, convert_range_to_grid, read_upload_range};
use crate::conf::{
    C_CELL_FORM_LY_QUALIFY_END, C_CELL_FORM_LY_QUALIFY_START, C_CELL_FORM_LY_REDEEM_END,
    C_CELL_FORM_LY_REDEEM_START, C_CELL_FORM_QUALIFY_AMOUNT, C_CELL_FORM_REDEEM_AMOUNT,
    C_CELL_FORM_TY_QUALIFY_END, C_CELL_FORM_TY_QUALIFY_START, C_CELL_FORM_TY_REDEEM_END,
    C_CELL_FORM_TY_REDEEM_START,
};
use crate::dates::{
    SpecCampaignDates, SpecDateInput, SpecDateWindow, convert_excel_serial_to_date, parse_date_text,
};
use crate::error::{CampaignResult, EnumCampaignError};

/// Initial field values. `None` means the form default applies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpecSeedValues {
    pub ty_qualify_start: Option<NaiveDate>,
    pub ty_qualify_end: Option<NaiveDate>,
    pub ty_redeem_start: Option<NaiveDate>,
    pub ty_redeem_end: Option<NaiveDate>,
    pub ly_qualify_start: Option<NaiveDate>,
    pub ly_qualify_end: Option<NaiveDate>,
    pub ly_redeem_start: Option<NaiveDate>,
    pub ly_redeem_end: Option<NaiveDate>,
    pub qualify_amount: Option<f64>,
    pub redeem_amount: Option<f64>,
}

impl SpecSeedValues {
    /// Seeds layered over `defaults`. A seeded TY window shifts the derived
    /// LY default with it; seeded LY windows are taken as given.
    pub fn apply_to(&self, defaults: &SpecCampaignDates) -> SpecCampaignDates {
        let pick = |start: Option<NaiveDate>, end: Option<NaiveDate>, fallback: SpecDateWindow| {
            SpecDateWindow::new(start.unwrap_or(fallback.start), end.unwrap_or(fallback.end))
        };
        let ty_qualify = pick(self.ty_qualify_start, self.ty_qualify_end, defaults.ty_qualify);
        let ty_redeem = pick(self.ty_redeem_start, self.ty_redeem_end, defaults.ty_redeem);
        let derived = SpecDateInput::from_ty(ty_qualify, ty_redeem).resolve();
        SpecCampaignDates {
            ty_qualify,
            ty_redeem,
            ly_qualify: pick(self.ly_qualify_start, self.ly_qualify_end, derived.ly_qualify),
            ly_redeem: pick(self.ly_redeem_start, self.ly_redeem_end, derived.ly_redeem),
        }
    }
}

/// Parsed request form.
#[derive(Debug, Clone)]
pub struct SpecRequestForm {
    pub seeds: SpecSeedValues,
    /// Every row of the form's active sheet, for the raw copy.
    pub l_rows: Vec<Vec<EnumCellValue>>,
}

/// Read the active sheet of a spreadsheet request form.
///
/// Formats without a workbook view (`.xls`, `.ods`) fall back to the first
/// sheet.
pub fn extract_request_form(upload: &SpecUpload) -> CampaignResult<SpecRequestForm> {
    if upload.format()? != EnumUploadFormat::Spreadsheet {
        return Err(EnumCampaignError::Validation(format!(
            "Request form {:?} must be a spreadsheet.",
            upload.file_name
        )));
    }
    let range = read_upload_range(&SpecUpload {
        sheet: derive_active_sheet(upload),
        ..upload.clone()
    })?;

    let seeds = SpecSeedValues {
        ty_qualify_start: read_date(&range, C_CELL_FORM_TY_QUALIFY_START)?,
        ty_qualify_end: read_date(&range, C_CELL_FORM_TY_QUALIFY_END)?,
        ty_redeem_start: read_date(&range, C_CELL_FORM_TY_REDEEM_START)?,
        ty_redeem_end: read_date(&range, C_CELL_FORM_TY_REDEEM_END)?,
        ly_qualify_start: read_date(&range, C_CELL_FORM_LY_QUALIFY_START)?,
        ly_qualify_end: read_date(&range, C_CELL_FORM_LY_QUALIFY_END)?,
        ly_redeem_start: read_date(&range, C_CELL_FORM_LY_REDEEM_START)?,
        ly_redeem_end: read_date(&range, C_CELL_FORM_LY_REDEEM_END)?,
        qualify_amount: read_amount(&range, C_CELL_FORM_QUALIFY_AMOUNT)?,
        redeem_amount: read_amount(&range, C_CELL_FORM_REDEEM_AMOUNT)?,
    };
    let l_rows = convert_range_to_grid(&range);
    debug!(file = %upload.file_name, ?seeds, "request form extracted");

    Ok(SpecRequestForm { seeds, l_rows })
}

fn derive_active_sheet(upload: &SpecUpload) -> Option<String> {
    match XlsxWorkbook::from_bytes(&upload.v_bytes).and_then(|workbook| workbook.active_sheet()) {
        Ok(sheet) => sheet,
        Err(err) => {
            debug!(file = %upload.file_name, error = %err, "no workbook view; reading the first sheet");
            None
        }
    }
}

fn read_cell<'a>(range: &'a Range<Data>, c_address: &str) -> CampaignResult<Option<&'a Data>> {
    let address = parse_cell_address(c_address)?;
    Ok(range.get_value((address.n_row - 1, address.n_col - 1)))
}

/// Date-like cells (serial date-times, ISO text, `m/d/Y` text) become dates.
fn read_date(range: &Range<Data>, c_address: &str) -> CampaignResult<Option<NaiveDate>> {
    Ok(match read_cell(range, c_address)? {
        Some(Data::DateTime(dt)) => convert_excel_serial_to_date(dt.as_f64()),
        Some(Data::DateTimeIso(s)) | Some(Data::String(s)) => parse_date_text(s),
        _ => None,
    })
}

fn read_amount(range: &Range<Data>, c_address: &str) -> CampaignResult<Option<f64>> {
    Ok(match read_cell(range, c_address)? {
        Some(Data::Float(f)) => Some(*f),
        Some(Data::Int(i)) => Some(*i as f64),
        Some(Data::String(s)) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    })
}
