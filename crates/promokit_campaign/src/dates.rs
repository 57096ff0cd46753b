//! Date windows and the TY/LY/LLY derivation rules.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::conf::{
    C_FORMAT_DATE, N_DAYS_DEFAULT_QUALIFY_END, N_DAYS_DEFAULT_REDEEM_END,
    N_DAYS_DEFAULT_REDEEM_START, N_DAYS_LLY_OFFSET, N_DAYS_LY_OFFSET,
};
use crate::error::{CampaignResult, EnumCampaignError};
use crate::handler::EnumSubPhase;

/// Formats accepted for operator-typed dates, tried in order.
const TUP_FORMATS_DATE_TEXT: [&str; 4] = ["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y", "%Y/%m/%d"];
const TUP_FORMATS_DATETIME_TEXT: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

////////////////////////////////////////////////////////////////////////////////
// #region DateText

pub fn format_date(date: NaiveDate) -> String {
    date.format(C_FORMAT_DATE).to_string()
}

/// Parse `m/d/Y` or ISO text; a trailing time part is accepted and dropped.
pub fn parse_date_text(c_text: &str) -> Option<NaiveDate> {
    let c_text = c_text.trim();
    TUP_FORMATS_DATE_TEXT
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(c_text, fmt).ok())
        .or_else(|| {
            TUP_FORMATS_DATETIME_TEXT
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(c_text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// [`parse_date_text`] that names the offending field on failure.
pub fn require_date_text(field: &str, c_text: &str) -> CampaignResult<NaiveDate> {
    parse_date_text(c_text).ok_or_else(|| {
        EnumCampaignError::Validation(format!(
            "{field}: {c_text:?} is not a date (expected MM/DD/YYYY or YYYY-MM-DD)."
        ))
    })
}

/// Spreadsheet serial day number (1900 system) to a date.
pub fn convert_excel_serial_to_date(n_serial: f64) -> Option<NaiveDate> {
    if !n_serial.is_finite() || n_serial < 1.0 {
        return None;
    }
    let date_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    date_epoch.checked_add_signed(Duration::days(n_serial.floor() as i64))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Windows

/// Inclusive start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecDateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SpecDateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn shift_days(&self, n_days: i64) -> Self {
        Self {
            start: self.start + Duration::days(n_days),
            end: self.end + Duration::days(n_days),
        }
    }

    /// `start - end` in the cell date format.
    pub fn to_range_text(&self) -> String {
        format!("{} - {}", format_date(self.start), format_date(self.end))
    }
}

/// The four windows written to an analysis tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecCampaignDates {
    pub ty_qualify: SpecDateWindow,
    pub ty_redeem: SpecDateWindow,
    pub ly_qualify: SpecDateWindow,
    pub ly_redeem: SpecDateWindow,
}

impl SpecCampaignDates {
    /// Form defaults anchored on `today`, LY derived from TY.
    pub fn default_from(today: NaiveDate) -> Self {
        let ty_qualify = SpecDateWindow::new(today, today + Duration::days(N_DAYS_DEFAULT_QUALIFY_END));
        let ty_redeem = SpecDateWindow::new(
            today + Duration::days(N_DAYS_DEFAULT_REDEEM_START),
            today + Duration::days(N_DAYS_DEFAULT_REDEEM_END),
        );
        SpecDateInput::from_ty(ty_qualify, ty_redeem).resolve()
    }

    /// LLY qualify window: LY + 1 day. Derived only.
    pub fn lly_qualify(&self) -> SpecDateWindow {
        self.ly_qualify.shift_days(N_DAYS_LLY_OFFSET)
    }

    /// LLY redeem window: LY + 1 day. Derived only.
    pub fn lly_redeem(&self) -> SpecDateWindow {
        self.ly_redeem.shift_days(N_DAYS_LLY_OFFSET)
    }

    /// Windows as written for `sub_phase`.
    ///
    /// The LY pass moves the whole instrument back one year: TY slots carry
    /// the LY windows and LY slots carry the LLY windows. TY and Lift passes,
    /// and single-pass templates, are unshifted.
    pub fn shifted_for(&self, sub_phase: Option<EnumSubPhase>) -> Self {
        match sub_phase {
            Some(EnumSubPhase::Ly) => Self {
                ty_qualify: self.ly_qualify,
                ty_redeem: self.ly_redeem,
                ly_qualify: self.lly_qualify(),
                ly_redeem: self.lly_redeem(),
            },
            _ => *self,
        }
    }

    pub fn to_formatted(&self) -> SpecFormattedDates {
        SpecFormattedDates {
            ty_q_start: format_date(self.ty_qualify.start),
            ty_q_end: format_date(self.ty_qualify.end),
            ty_r_start: format_date(self.ty_redeem.start),
            ty_r_end: format_date(self.ty_redeem.end),
            ly_q_start: format_date(self.ly_qualify.start),
            ly_q_end: format_date(self.ly_qualify.end),
            ly_r_start: format_date(self.ly_redeem.start),
            ly_r_end: format_date(self.ly_redeem.end),
        }
    }
}

/// Operator-entered windows. An LY window left `None` defaults to TY - 364
/// days; a given one is kept as entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecDateInput {
    pub ty_qualify: SpecDateWindow,
    pub ty_redeem: SpecDateWindow,
    pub ly_qualify: Option<SpecDateWindow>,
    pub ly_redeem: Option<SpecDateWindow>,
}

impl SpecDateInput {
    pub fn from_ty(ty_qualify: SpecDateWindow, ty_redeem: SpecDateWindow) -> Self {
        Self {
            ty_qualify,
            ty_redeem,
            ly_qualify: None,
            ly_redeem: None,
        }
    }

    pub fn resolve(&self) -> SpecCampaignDates {
        SpecCampaignDates {
            ty_qualify: self.ty_qualify,
            ty_redeem: self.ty_redeem,
            ly_qualify: self
                .ly_qualify
                .unwrap_or_else(|| self.ty_qualify.shift_days(-N_DAYS_LY_OFFSET)),
            ly_redeem: self
                .ly_redeem
                .unwrap_or_else(|| self.ty_redeem.shift_days(-N_DAYS_LY_OFFSET)),
        }
    }
}

/// Windows rendered to cell text, as used by SQL substitution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFormattedDates {
    pub ty_q_start: String,
    pub ty_q_end: String,
    pub ty_r_start: String,
    pub ty_r_end: String,
    pub ly_q_start: String,
    pub ly_q_end: String,
    pub ly_r_start: String,
    pub ly_r_end: String,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_parse_round_trip() {
        let mut date = ymd(1999, 12, 25);
        while date < ymd(2032, 1, 1) {
            assert_eq!(parse_date_text(&format_date(date)), Some(date));
            date += Duration::days(97);
        }
        assert_eq!(format_date(ymd(2024, 1, 5)), "01/05/2024");
    }

    #[test]
    fn test_parse_date_text_variants() {
        assert_eq!(parse_date_text("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date_text(" 1/15/2024 "), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date_text("2024-01-15 00:00:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date_text("soon"), None);
        assert!(matches!(
            require_date_text("TY Qualify Start", "soon"),
            Err(EnumCampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_excel_serial() {
        assert_eq!(convert_excel_serial_to_date(45306.0), Some(ymd(2024, 1, 15)));
        assert_eq!(convert_excel_serial_to_date(45306.75), Some(ymd(2024, 1, 15)));
        assert_eq!(convert_excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_ly_defaults_and_overrides() {
        let ty_q = SpecDateWindow::new(ymd(2024, 1, 15), ymd(2024, 1, 29));
        let ty_r = SpecDateWindow::new(ymd(2024, 1, 30), ymd(2024, 2, 13));
        let dates = SpecDateInput::from_ty(ty_q, ty_r).resolve();
        assert_eq!(dates.ly_qualify.start, ymd(2023, 1, 16));
        assert_eq!(dates.ly_redeem.end, ymd(2023, 2, 14));

        let ly_manual = SpecDateWindow::new(ymd(2023, 1, 1), ymd(2023, 1, 10));
        let dates = SpecDateInput {
            ly_qualify: Some(ly_manual),
            ..SpecDateInput::from_ty(ty_q, ty_r)
        }
        .resolve();
        assert_eq!(dates.ly_qualify, ly_manual);
    }

    #[test]
    fn test_lly_is_ly_plus_one_day() {
        let dates = SpecCampaignDates::default_from(ymd(2024, 3, 1));
        for (ly, lly) in [
            (dates.ly_qualify, dates.lly_qualify()),
            (dates.ly_redeem, dates.lly_redeem()),
        ] {
            assert_eq!(lly.start - ly.start, Duration::days(1));
            assert_eq!(lly.end - ly.end, Duration::days(1));
        }
    }

    #[test]
    fn test_shift_only_applies_to_ly_pass() {
        let dates = SpecCampaignDates::default_from(ymd(2024, 3, 1));
        let shifted = dates.shifted_for(Some(EnumSubPhase::Ly));
        assert_eq!(shifted.ty_qualify, dates.ly_qualify);
        assert_eq!(shifted.ly_redeem, dates.lly_redeem());

        assert_eq!(dates.shifted_for(Some(EnumSubPhase::Ty)), dates);
        assert_eq!(dates.shifted_for(Some(EnumSubPhase::Lift)), dates);
        assert_eq!(dates.shifted_for(None), dates);
    }

    #[test]
    fn test_default_windows() {
        let dates = SpecCampaignDates::default_from(ymd(2024, 3, 1));
        assert_eq!(dates.ty_qualify.to_range_text(), "03/01/2024 - 03/15/2024");
        assert_eq!(dates.ty_redeem.to_range_text(), "03/16/2024 - 03/30/2024");
    }
}
