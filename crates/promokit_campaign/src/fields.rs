//! Typed per-tab field records.
//!
//! Stages exchange these records; the flat key -> value store only exists at
//! the point where values are written to mapped cells.

use std::collections::BTreeMap;

use promokit_io_xlsx::EnumCellValue;

use crate::conf::{
    C_MAP_LY_QUALIFY_DATES, C_MAP_LY_REDEEM_DATES, C_MAP_QUALIFY_AMOUNT, C_MAP_REDEEM_AMOUNT,
    C_MAP_TY_QUALIFY_DATES, C_MAP_TY_REDEEM_DATES,
};
use crate::dates::{SpecCampaignDates, SpecDateWindow, SpecFormattedDates};
use crate::handler::EnumSubPhase;

/// Tab chosen at base-sheet selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTabContext {
    pub campaign_name: String,
    pub tab_name: String,
    pub base_sheet: String,
}

/// Values shown on the input form before the operator edits them.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFormDefaults {
    pub dates: SpecCampaignDates,
    /// LLY windows, derived and read-only.
    pub lly_qualify: SpecDateWindow,
    pub lly_redeem: SpecDateWindow,
    pub qualify_amount: f64,
    pub redeem_amount: f64,
    pub tab_name: String,
    pub base_sheet: String,
}

/// Everything one pass wrote, as later stages need it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTabFields {
    pub tab_name: String,
    pub base_sheet: String,
    pub sub_phase: Option<EnumSubPhase>,
    /// Windows as written (after any sub-phase shift).
    pub dates: SpecCampaignDates,
    pub formatted: SpecFormattedDates,
    pub qualify_amount: f64,
    pub redeem_amount: f64,
    pub sql_article_tuple: String,
}

impl SpecTabFields {
    /// Mapping key -> cell value for the tab header cells.
    pub fn to_field_store(&self) -> BTreeMap<String, EnumCellValue> {
        BTreeMap::from([
            (
                C_MAP_TY_QUALIFY_DATES.to_string(),
                EnumCellValue::String(self.dates.ty_qualify.to_range_text()),
            ),
            (
                C_MAP_TY_REDEEM_DATES.to_string(),
                EnumCellValue::String(self.dates.ty_redeem.to_range_text()),
            ),
            (
                C_MAP_LY_QUALIFY_DATES.to_string(),
                EnumCellValue::String(self.dates.ly_qualify.to_range_text()),
            ),
            (
                C_MAP_LY_REDEEM_DATES.to_string(),
                EnumCellValue::String(self.dates.ly_redeem.to_range_text()),
            ),
            (
                C_MAP_QUALIFY_AMOUNT.to_string(),
                EnumCellValue::Number(self.qualify_amount),
            ),
            (
                C_MAP_REDEEM_AMOUNT.to_string(),
                EnumCellValue::Number(self.redeem_amount),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_field_store_keys_and_values() {
        let dates =
            SpecCampaignDates::default_from(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let fields = SpecTabFields {
            tab_name: "Promo_Qual".to_string(),
            base_sheet: "Base".to_string(),
            sub_phase: None,
            dates,
            formatted: dates.to_formatted(),
            qualify_amount: 25.0,
            redeem_amount: 5.5,
            sql_article_tuple: "()".to_string(),
        };
        let dict_store = fields.to_field_store();
        assert_eq!(dict_store.len(), 6);
        assert_eq!(
            dict_store[C_MAP_TY_QUALIFY_DATES],
            EnumCellValue::String("01/15/2024 - 01/29/2024".to_string())
        );
        assert_eq!(dict_store[C_MAP_REDEEM_AMOUNT], EnumCellValue::Number(5.5));
    }
}
