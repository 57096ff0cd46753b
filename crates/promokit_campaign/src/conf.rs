/// Text format for every date written to cells or SQL.
pub const C_FORMAT_DATE: &str = "%m/%d/%Y";
/// Default offset from TY to LY; keeps the weekday aligned.
pub const N_DAYS_LY_OFFSET: i64 = 364;
/// LLY windows start one day after the matching LY window.
pub const N_DAYS_LLY_OFFSET: i64 = 1;

/// Default window lengths relative to the qualify start, in days.
pub const N_DAYS_DEFAULT_QUALIFY_END: i64 = 14;
pub const N_DAYS_DEFAULT_REDEEM_START: i64 = 15;
pub const N_DAYS_DEFAULT_REDEEM_END: i64 = 29;

pub const C_TAB_SUFFIX_DEFAULT: &str = "Qual";
pub const C_SHEET_REQUEST_FORM: &str = "Request Form";
pub const C_DOWNLOAD_SUFFIX: &str = "_Analysis.xlsx";
pub const C_PROFILE_GLOB: &str = "*.json";

pub const C_SQL_TUPLE_EMPTY: &str = "()";
pub const C_SQL_MISSING_PLACEHOLDER: &str = "-- Error: No SQL code found in designated column.";

/// Zero-based position of the pre-built tuple cell (`F1`) in an article upload.
pub const N_IDX_TUPLE_ROW: usize = 0;
pub const N_IDX_TUPLE_COL: usize = 5;

////////////////////////////////////////////////////////////////////////////////
// #region SheetRoles

pub const C_ROLE_BASE_ANALYSIS: &str = "base_analysis";
pub const C_ROLE_ITEM_LIST: &str = "item_list";
pub const C_ROLE_SQL_OUTPUT: &str = "sql_output";
pub const C_ROLE_LY_BASE: &str = "ly_base";
pub const C_ROLE_TY_BASE: &str = "ty_base";
pub const C_ROLE_LIFT_BASE: &str = "lift_base";

/// Keys inside `sheets` that hold lists rather than roles.
pub const C_SHEETS_KEY_ALLOWED_BASE: &str = "allowed_base_sheets";
pub const C_SHEETS_KEY_REMOVE_ON_EXPORT: &str = "remove_on_export";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellMappings

pub const C_MAP_TY_QUALIFY_DATES: &str = "ty_qualify_dates";
pub const C_MAP_TY_REDEEM_DATES: &str = "ty_redeem_dates";
pub const C_MAP_LY_QUALIFY_DATES: &str = "ly_qualify_dates";
pub const C_MAP_LY_REDEEM_DATES: &str = "ly_redeem_dates";
pub const C_MAP_QUALIFY_AMOUNT: &str = "p4_qualify_amt";
pub const C_MAP_REDEEM_AMOUNT: &str = "q4_redeem_amt";
pub const C_MAP_SQL_CODE_COL: &str = "sql_code_col";
pub const C_MAP_SQL_CODE_COL_LIFT: &str = "sql_code_col_lift";
pub const C_MAP_SQL_OUTPUT_START: &str = "sql_output_start";

pub const C_SQL_CODE_COL_DEFAULT: &str = "A";
pub const C_SQL_CODE_COL_LIFT_DEFAULT: &str = "C";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RequestForm

pub const C_CELL_FORM_TY_QUALIFY_START: &str = "C13";
pub const C_CELL_FORM_TY_QUALIFY_END: &str = "C14";
pub const C_CELL_FORM_TY_REDEEM_START: &str = "C19";
pub const C_CELL_FORM_TY_REDEEM_END: &str = "C20";
/// The form stores the LY qualify window in the same cells as the TY redeem window.
pub const C_CELL_FORM_LY_QUALIFY_START: &str = "C19";
pub const C_CELL_FORM_LY_QUALIFY_END: &str = "C20";
pub const C_CELL_FORM_LY_REDEEM_START: &str = "C26";
pub const C_CELL_FORM_LY_REDEEM_END: &str = "C27";
pub const C_CELL_FORM_QUALIFY_AMOUNT: &str = "C21";
pub const C_CELL_FORM_REDEEM_AMOUNT: &str = "C22";

// #endregion
////////////////////////////////////////////////////////////////////////////////
