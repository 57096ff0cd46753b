//! Stateless helpers for addresses, sheet names, and value coercion.

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, SpecCellAddress, XlsxError};

////////////////////////////////////////////////////////////////////////////////
// #region CellAddressing

/// Parse column letters (`A`, `xfd`) into a one-based column number.
pub fn parse_column_letters(c_col: &str) -> Result<u32, XlsxError> {
    let c_col = c_col.trim().trim_start_matches('$');
    if c_col.is_empty() {
        return Err(XlsxError::invalid_address(c_col, "missing column letters"));
    }

    let mut n_col: u32 = 0;
    for ch in c_col.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(XlsxError::invalid_address(
                c_col,
                format!("unexpected character {ch:?} in column"),
            ));
        }
        let n_digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        n_col = n_col
            .checked_mul(26)
            .and_then(|n| n.checked_add(n_digit))
            .filter(|n| *n <= N_NCOLS_EXCEL_MAX)
            .ok_or_else(|| XlsxError::invalid_address(c_col, "column beyond XFD"))?;
    }
    Ok(n_col)
}

/// Render a one-based column number as letters.
pub fn derive_column_letters(n_col: u32) -> String {
    let mut n_rest = n_col;
    let mut l_chars = Vec::new();
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Parse an A1-style reference. `$` anchors are accepted and ignored.
pub fn parse_cell_address(c_address: &str) -> Result<SpecCellAddress, XlsxError> {
    let c_trimmed = c_address.trim();
    let c_plain: String = c_trimmed.chars().filter(|ch| *ch != '$').collect();

    let n_idx_digit = c_plain
        .find(|ch: char| ch.is_ascii_digit())
        .ok_or_else(|| XlsxError::invalid_address(c_address, "missing row number"))?;
    let (c_col, c_row) = c_plain.split_at(n_idx_digit);
    if c_col.is_empty() {
        return Err(XlsxError::invalid_address(c_address, "missing column letters"));
    }

    let n_col = parse_column_letters(c_col)
        .map_err(|_| XlsxError::invalid_address(c_address, "invalid column letters"))?;
    let n_row: u32 = c_row
        .parse()
        .map_err(|_| XlsxError::invalid_address(c_address, "invalid row number"))?;
    if n_row == 0 || n_row > N_NROWS_EXCEL_MAX {
        return Err(XlsxError::invalid_address(
            c_address,
            format!("row must be within 1..={N_NROWS_EXCEL_MAX}"),
        ));
    }

    Ok(SpecCellAddress::new(n_row, n_col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNames

/// Sanitize a sheet name for Excel constraints.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Reject names Excel would refuse to open.
pub fn validate_sheet_name(name: &str) -> Result<(), XlsxError> {
    let fail = |reason: &str| XlsxError::InvalidSheetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(fail("name is empty"));
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(fail("name exceeds 31 characters"));
    }
    if TUP_EXCEL_ILLEGAL.iter().any(|c| name.contains(c)) {
        return Err(fail("name contains one of * : ? / \\ [ ]"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(fail("name starts or ends with an apostrophe"));
    }
    Ok(())
}

/// Sheet names compare case-insensitively inside a workbook.
pub fn is_same_sheet_name(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// `name` if no sheet in `l_taken` uses it, else `name` with the smallest
/// free `_2`, `_3`, ... suffix. The stem is cut so the result stays within
/// the sheet-name limit.
pub fn derive_free_sheet_name<S: AsRef<str>>(name: &str, l_taken: &[S]) -> String {
    let is_taken = |c_name: &str| l_taken.iter().any(|t| is_same_sheet_name(t.as_ref(), c_name));
    if !is_taken(name) {
        return name.to_string();
    }
    (2usize..)
        .map(|n_idx| {
            let c_suffix = format!("_{n_idx}");
            let n_keep = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len());
            let c_stem: String = name.chars().take(n_keep).collect();
            format!("{}{c_suffix}", c_stem.trim_end().trim_end_matches('\''))
        })
        .find(|c_candidate| !is_taken(c_candidate))
        .unwrap_or_else(|| name.to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Numeric-or-text coercion applied to operator-supplied text.
///
/// Finite numbers become [`EnumCellValue::Number`]; everything else is kept
/// verbatim as text.
pub fn convert_text_to_cell_value(c_text: &str) -> EnumCellValue {
    match c_text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && !c_text.trim().is_empty() => EnumCellValue::Number(n),
        _ => EnumCellValue::String(c_text.to_string()),
    }
}

/// Apply [`convert_text_to_cell_value`] to text values; others pass through.
pub fn coerce_cell_value(value: &EnumCellValue) -> EnumCellValue {
    match value {
        EnumCellValue::String(s) => convert_text_to_cell_value(s),
        other => other.clone(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_address_accepts_anchors_and_lowercase() {
        assert_eq!(parse_cell_address("C13").unwrap(), SpecCellAddress::new(13, 3));
        assert_eq!(parse_cell_address("$b$2").unwrap(), SpecCellAddress::new(2, 2));
        assert_eq!(
            parse_cell_address("XFD1048576").unwrap(),
            SpecCellAddress::new(1_048_576, 16_384)
        );
    }

    #[test]
    fn test_parse_cell_address_rejects_malformed() {
        for c_bad in ["", "A", "12", "A0", "XFE1", "A1048577", "A1B", "1A"] {
            assert!(
                matches!(
                    parse_cell_address(c_bad),
                    Err(XlsxError::InvalidAddress { .. })
                ),
                "{c_bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_column_letters_match_excel_numbering() {
        assert_eq!(parse_column_letters("A").unwrap(), 1);
        assert_eq!(parse_column_letters("Z").unwrap(), 26);
        assert_eq!(parse_column_letters("AA").unwrap(), 27);
        assert_eq!(parse_column_letters("xfd").unwrap(), 16_384);
        assert_eq!(derive_column_letters(1), "A");
        assert_eq!(derive_column_letters(28), "AB");
        assert_eq!(derive_column_letters(16_384), "XFD");
        assert_eq!(SpecCellAddress::new(7, 3).to_string(), "C7");
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]", "_"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").chars().count(), 31);
    }

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("Promo_Qual").is_ok());
        assert!(validate_sheet_name("a:b").is_err());
        assert!(validate_sheet_name("'quoted").is_err());
        assert!(validate_sheet_name(&"y".repeat(32)).is_err());
    }

    #[test]
    fn test_convert_text_to_cell_value() {
        assert_eq!(convert_text_to_cell_value("100"), EnumCellValue::Number(100.0));
        assert_eq!(convert_text_to_cell_value("3.5"), EnumCellValue::Number(3.5));
        assert_eq!(
            convert_text_to_cell_value("abc"),
            EnumCellValue::String("abc".to_string())
        );
        assert_eq!(
            convert_text_to_cell_value("NaN"),
            EnumCellValue::String("NaN".to_string())
        );
        assert_eq!(convert_text_to_cell_value(""), EnumCellValue::String(String::new()));
    }

    #[test]
    fn test_derive_free_sheet_name() {
        assert_eq!(derive_free_sheet_name("Promo_LY", &["Base"]), "Promo_LY");
        assert_eq!(derive_free_sheet_name("Promo_LY", &["promo_ly"]), "Promo_LY_2");
        assert_eq!(
            derive_free_sheet_name("Promo_LY", &["Promo_LY", "Promo_LY_2"]),
            "Promo_LY_3"
        );

        let c_long = "TY_Items_SpringClearance2024Wav";
        let c_free = derive_free_sheet_name(c_long, &[c_long]);
        assert_eq!(c_free, "TY_Items_SpringClearance2024W_2");
        assert_eq!(c_free.chars().count(), N_LEN_EXCEL_SHEET_NAME_MAX);
    }
}
