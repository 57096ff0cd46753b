//! Parsing of SQL results pasted back by the operator.

use std::collections::BTreeMap;

use promokit_io_xlsx::{EnumCellValue, convert_text_to_cell_value};

use crate::error::{CampaignResult, EnumCampaignError};

/// Split on runs of whitespace (spaces, tabs, line breaks).
pub fn split_result_tokens(c_paste: &str) -> Vec<String> {
    c_paste.split_whitespace().map(str::to_string).collect()
}

/// Tokens for a vertical write; an empty paste is rejected.
pub fn parse_result_sequence(c_paste: &str) -> CampaignResult<Vec<String>> {
    let l_tokens = split_result_tokens(c_paste);
    if l_tokens.is_empty() {
        return Err(EnumCampaignError::Validation(
            "Paste the SQL output first.".to_string(),
        ));
    }
    Ok(l_tokens)
}

/// Parse `Key Value Key Value ...`. Values are coerced to numbers where they
/// parse. A repeated key keeps its last value.
pub fn parse_key_value_tokens(c_paste: &str) -> CampaignResult<BTreeMap<String, EnumCellValue>> {
    let l_tokens = parse_result_sequence(c_paste)?;
    if l_tokens.len() % 2 != 0 {
        return Err(EnumCampaignError::Validation(format!(
            "Every key needs a value; got {} tokens.",
            l_tokens.len()
        )));
    }
    Ok(l_tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), convert_text_to_cell_value(&pair[1])))
        .collect())
}
