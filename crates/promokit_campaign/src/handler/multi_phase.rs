//! Three-pass tab cycle (LY, TY, Lift), each pass on its own base sheet.

use std::collections::BTreeMap;

use promokit_io_xlsx::{EnumCellValue, SpecXlsxReport, derive_free_sheet_name, sanitize_sheet_name};
use tracing::{debug, info};

use super::{
    EnumSubPhase, PhaseHandler, SpecPhaseContext, SpecPhaseInput, create_tab, plan_tab_header,
    prepare_tab_name, render_sql_from_column, validate_amounts, write_tab_header,
};
use crate::article::{ArticleList, EnumYearLabel};
use crate::conf::{
    C_MAP_LY_QUALIFY_DATES, C_MAP_SQL_CODE_COL, C_MAP_SQL_CODE_COL_LIFT, C_MAP_TY_QUALIFY_DATES,
    C_ROLE_LIFT_BASE, C_ROLE_LY_BASE, C_ROLE_TY_BASE, C_SQL_CODE_COL_DEFAULT,
    C_SQL_CODE_COL_LIFT_DEFAULT,
};
use crate::error::{CampaignResult, EnumCampaignError};
use crate::fields::SpecTabFields;
use crate::profile::{EnumHandlerKind, SpecTemplateProfile};
use crate::results::parse_key_value_tokens;
use crate::session::SpecWorkbookSession;
use crate::sql::SpecRenderedSql;

const TUP_MAPPINGS_REQUIRED: [&str; 2] = [C_MAP_TY_QUALIFY_DATES, C_MAP_LY_QUALIFY_DATES];

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiPhaseHandler;

impl MultiPhaseHandler {
    fn require_sub_phase(ctx: &SpecPhaseContext<'_>) -> CampaignResult<EnumSubPhase> {
        ctx.sub_phase.ok_or_else(|| {
            EnumCampaignError::Validation("Multi-phase input needs an active sub-phase.".to_string())
        })
    }

    fn base_role(sub_phase: EnumSubPhase) -> &'static str {
        match sub_phase {
            EnumSubPhase::Ly => C_ROLE_LY_BASE,
            EnumSubPhase::Ty => C_ROLE_TY_BASE,
            EnumSubPhase::Lift => C_ROLE_LIFT_BASE,
        }
    }
}

/// `{label}_Items_{tab}`, cut to the sheet-name limit.
pub fn derive_raw_sheet_name(label: EnumYearLabel, c_tab: &str) -> String {
    sanitize_sheet_name(&format!("{label}_Items_{c_tab}"), "_")
}

/// Raw sheet names for `l_labels`. None reuses a sheet in `l_existing`,
/// the tab itself or another label's name; cut names that collide get a
/// numeric suffix.
fn plan_raw_sheet_names(
    l_labels: &[EnumYearLabel],
    c_tab: &str,
    l_existing: &[String],
) -> Vec<String> {
    let mut l_taken: Vec<String> = l_existing.to_vec();
    l_taken.push(c_tab.to_string());
    let mut l_names = Vec::with_capacity(l_labels.len());
    for label in l_labels {
        let c_name = derive_free_sheet_name(&derive_raw_sheet_name(*label, c_tab), &l_taken);
        l_taken.push(c_name.clone());
        l_names.push(c_name);
    }
    l_names
}

/// Every labelled list, or a validation error naming the missing labels.
fn load_labelled_lists(input: &SpecPhaseInput) -> CampaignResult<BTreeMap<EnumYearLabel, ArticleList>> {
    let l_missing: Vec<&str> = EnumYearLabel::ALL
        .iter()
        .filter(|label| !input.dict_uploads.contains_key(label))
        .map(EnumYearLabel::as_str)
        .collect();
    if !l_missing.is_empty() {
        return Err(EnumCampaignError::Validation(format!(
            "Upload the TY, LY and LLY article lists; missing: {}.",
            l_missing.join(", ")
        )));
    }
    EnumYearLabel::ALL
        .iter()
        .map(|label| {
            ArticleList::load(&input.dict_uploads[label], Some(*label)).map(|list| (*label, list))
        })
        .collect()
}

impl PhaseHandler for MultiPhaseHandler {
    fn kind(&self) -> EnumHandlerKind {
        EnumHandlerKind::MultiPhase
    }

    fn first_sub_phase(&self) -> Option<EnumSubPhase> {
        Some(EnumSubPhase::Ly)
    }

    fn tab_name_stem(&self, ctx: &SpecPhaseContext<'_>) -> String {
        match ctx.sub_phase {
            Some(sub_phase) => format!("{}_{sub_phase}", ctx.tab.campaign_name),
            None => ctx.tab.tab_name.clone(),
        }
    }

    fn base_sheet(
        &self,
        profile: &SpecTemplateProfile,
        session: &SpecWorkbookSession,
        ctx: &SpecPhaseContext<'_>,
    ) -> CampaignResult<String> {
        let sub_phase = Self::require_sub_phase(ctx)?;
        let c_role = Self::base_role(sub_phase);
        if !profile.sheet_roles.contains_key(c_role) {
            debug!(role = c_role, base = %ctx.tab.base_sheet, "no base role; using the selected base sheet");
            return Ok(ctx.tab.base_sheet.clone());
        }
        profile.resolve_sheet_role(c_role, &session.list_sheets())
    }

    fn collect_inputs(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        ctx: &SpecPhaseContext<'_>,
        input: &SpecPhaseInput,
    ) -> CampaignResult<SpecTabFields> {
        let sub_phase = Self::require_sub_phase(ctx)?;
        validate_amounts(input)?;
        let c_requested = match &input.tab_name {
            Some(c_name) => c_name.clone(),
            None => self.default_tab_name(session, ctx),
        };
        let c_tab = prepare_tab_name(session, &c_requested)?;
        let c_base = self.base_sheet(profile, session, ctx)?;

        let dict_lists = load_labelled_lists(input)?;
        let l_labels: Vec<EnumYearLabel> = dict_lists.keys().copied().collect();
        let l_names = plan_raw_sheet_names(&l_labels, &c_tab, &session.list_sheets());
        let l_raw_sheets: Vec<(String, &[Vec<EnumCellValue>])> = l_names
            .into_iter()
            .zip(dict_lists.values().map(ArticleList::rows))
            .collect();
        let sql_article_tuple = dict_lists[&EnumYearLabel::Ty].derive_sql_tuple(profile.tuple_source);

        let dates = input.dates.resolve().shifted_for(Some(sub_phase));
        let fields = SpecTabFields {
            tab_name: c_tab.clone(),
            base_sheet: c_base.clone(),
            sub_phase: Some(sub_phase),
            dates,
            formatted: dates.to_formatted(),
            qualify_amount: input.qualify_amount,
            redeem_amount: input.redeem_amount,
            sql_article_tuple,
        };
        let plan = plan_tab_header(profile, &fields, &TUP_MAPPINGS_REQUIRED)?;

        for (c_sheet, l_rows) in &l_raw_sheets {
            session.workbook_mut().create_sheet_from_tabular(c_sheet, l_rows)?;
            session.mark_touched(c_sheet);
        }
        create_tab(session, &c_base, &c_tab)?;
        write_tab_header(session, &c_tab, &plan)?;

        info!(tab = %c_tab, base = %c_base, sub_phase = %sub_phase, "phase tab created");
        Ok(fields)
    }

    fn build_sql_template(
        &self,
        session: &SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
    ) -> CampaignResult<SpecRenderedSql> {
        let c_column = match fields.sub_phase {
            Some(EnumSubPhase::Lift) => profile
                .mapping(C_MAP_SQL_CODE_COL_LIFT)
                .unwrap_or(C_SQL_CODE_COL_LIFT_DEFAULT),
            _ => profile
                .mapping(C_MAP_SQL_CODE_COL)
                .unwrap_or(C_SQL_CODE_COL_DEFAULT),
        };
        render_sql_from_column(session, profile, fields, c_column)
    }

    fn capture_results(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
        c_paste: &str,
    ) -> CampaignResult<SpecXlsxReport> {
        let dict_values = parse_key_value_tokens(c_paste)?;
        let report = session.workbook_mut().write_key_value_batch(
            &fields.tab_name,
            &dict_values,
            &profile.sql_result_mappings,
        )?;
        session.mark_touched(&fields.tab_name);
        info!(
            tab = %fields.tab_name,
            written = report.cells.len(),
            skipped = report.warnings.len(),
            "key/value results written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SpecUpload;
    use crate::dates::{SpecDateInput, SpecDateWindow};
    use crate::fields::SpecTabContext;
    use crate::request_form::SpecSeedValues;
    use chrono::NaiveDate;
    use promokit_io_xlsx::{EnumCellValue, XlsxWorkbook};
    use rust_xlsxwriter::Workbook;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session() -> SpecWorkbookSession {
        let mut workbook = Workbook::new();
        for name in ["LY Base", "TY Base", "Lift Base"] {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name).unwrap();
            sheet.write_string(0, 0, name).unwrap();
        }
        let sheet = workbook.add_worksheet();
        sheet.set_name("SQL").unwrap();
        sheet.write_string(0, 0, "set qualify_start = '';").unwrap();
        sheet.write_string(1, 0, "where id in article_list=()").unwrap();
        sheet.write_string(0, 2, "-- lift ly_qualify_start='';").unwrap();
        let v_bytes = workbook.save_to_buffer().unwrap();
        SpecWorkbookSession::from_workbook(XlsxWorkbook::from_bytes(&v_bytes).unwrap(), "t.xlsx")
    }

    fn profile() -> SpecTemplateProfile {
        let c_json = r#"{"display_name": "Multi", "template_file": "t.xlsx",
            "handler_module": "small_scale_new",
            "sheets": {"ly_base": "LY Base", "ty_base": "TY Base", "lift_base": "Lift Base",
                "sql_output": "SQL"},
            "mappings": {"ty_qualify_dates": "B2", "ly_qualify_dates": "C2"},
            "sql_mappings": {"MetricA": "D5", "MetricB": "D6"}}"#;
        SpecTemplateProfile::from_json_str(c_json, None).unwrap()
    }

    fn csv(c_text: &str) -> SpecUpload {
        SpecUpload::new("list.csv", c_text.as_bytes().to_vec())
    }

    fn input(if_all_uploads: bool) -> SpecPhaseInput {
        let mut dict_uploads = BTreeMap::from([
            (EnumYearLabel::Ty, csv("Article\nT-1\nT-2\n")),
            (EnumYearLabel::Ly, csv("Article\nL-1\n")),
        ]);
        if if_all_uploads {
            dict_uploads.insert(EnumYearLabel::Lly, csv("Article\nLL-1\n"));
        }
        SpecPhaseInput {
            dates: SpecDateInput {
                ty_qualify: SpecDateWindow::new(ymd(2024, 6, 1), ymd(2024, 6, 14)),
                ty_redeem: SpecDateWindow::new(ymd(2024, 6, 15), ymd(2024, 6, 29)),
                ly_qualify: Some(SpecDateWindow::new(ymd(2023, 6, 3), ymd(2023, 6, 16))),
                ly_redeem: None,
            },
            article: None,
            dict_uploads,
            qualify_amount: 10.0,
            redeem_amount: 2.0,
            tab_name: None,
        }
    }

    fn tab() -> SpecTabContext {
        SpecTabContext {
            campaign_name: "Promo".to_string(),
            tab_name: "Promo_Qual".to_string(),
            base_sheet: "LY Base".to_string(),
        }
    }

    #[test]
    fn test_ly_pass_shifts_dates_and_stores_raw_lists() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Ly),
            seeds: &seeds,
        };
        let fields = MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(true))
            .unwrap();

        assert_eq!(fields.tab_name, "Promo_LY");
        assert_eq!(fields.base_sheet, "LY Base");
        assert_eq!(fields.dates.ty_qualify.start, ymd(2023, 6, 3));
        assert_eq!(fields.dates.ly_qualify.start, ymd(2023, 6, 4));
        assert_eq!(fields.sql_article_tuple, "('T-1','T-2')");

        let workbook = session.workbook();
        assert_eq!(
            workbook.list_sheets(),
            vec![
                "LY Base",
                "TY Base",
                "Lift Base",
                "SQL",
                "TY_Items_Promo_LY",
                "LY_Items_Promo_LY",
                "LLY_Items_Promo_LY",
                "Promo_LY",
            ]
        );
        assert_eq!(
            workbook.read_cell("Promo_LY", "B2").unwrap(),
            EnumCellValue::String("06/03/2023 - 06/16/2023".to_string())
        );
        assert_eq!(
            workbook.read_cell("Promo_LY", "C2").unwrap(),
            EnumCellValue::String("06/04/2023 - 06/17/2023".to_string())
        );
        assert_eq!(
            workbook.read_column_as_text("TY_Items_Promo_LY", "A").unwrap(),
            "Article\nT-1\nT-2"
        );
    }

    #[test]
    fn test_missing_upload_fails_before_mutation() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Ty),
            seeds: &seeds,
        };
        let err = MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(false))
            .unwrap_err();
        assert!(matches!(&err, EnumCampaignError::Validation(msg) if msg.contains("LLY")));
        assert_eq!(session.list_sheets().len(), 4);
        assert!(session.sheets_touched().is_empty());
    }

    #[test]
    fn test_lift_pass_reads_lift_column_and_writes_key_values() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Lift),
            seeds: &seeds,
        };
        let fields = MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(true))
            .unwrap();
        assert_eq!(fields.base_sheet, "Lift Base");
        assert_eq!(fields.dates.ty_qualify.start, ymd(2024, 6, 1));

        let rendered = MultiPhaseHandler
            .build_sql_template(&session, &profile, &fields)
            .unwrap();
        assert_eq!(rendered.text, "-- lift ly_qualify_start='06/03/2023';");

        let report = MultiPhaseHandler
            .capture_results(&mut session, &profile, &fields, "MetricA 100\nMetricB abc Other 1")
            .unwrap();
        assert_eq!(report.cells, vec!["D5", "D6"]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            session.workbook().read_cell("Promo_LIFT", "D5").unwrap(),
            EnumCellValue::Number(100.0)
        );
        assert!(matches!(
            MultiPhaseHandler.capture_results(&mut session, &profile, &fields, "MetricA"),
            Err(EnumCampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_ty_pass_sql_uses_default_column() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Ty),
            seeds: &seeds,
        };
        let fields = MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(true))
            .unwrap();
        let rendered = MultiPhaseHandler
            .build_sql_template(&session, &profile, &fields)
            .unwrap();
        assert_eq!(
            rendered.text,
            "set qualify_start='06/01/2024';\nwhere id in article_list=('T-1','T-2')"
        );
    }

    #[test]
    fn test_raw_sheets_keep_upload_cells_verbatim() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Ly),
            seeds: &seeds,
        };
        let mut input = input(true);
        input.dict_uploads.insert(
            EnumYearLabel::Ty,
            csv("Article,,,,,\"('00042')\"\n00042\n00042\n"),
        );
        let fields = MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input)
            .unwrap();
        assert_eq!(fields.sql_article_tuple, "('00042')");

        let workbook = session.workbook();
        assert_eq!(workbook.read_cell("TY_Items_Promo_LY", "B1").unwrap(), EnumCellValue::None);
        assert_eq!(workbook.read_cell("TY_Items_Promo_LY", "C1").unwrap(), EnumCellValue::None);
        assert_eq!(
            workbook.read_cell("TY_Items_Promo_LY", "F1").unwrap(),
            EnumCellValue::String("('00042')".to_string())
        );
        assert_eq!(
            workbook.read_cell("TY_Items_Promo_LY", "A2").unwrap(),
            EnumCellValue::String("00042".to_string())
        );
        assert_eq!(
            workbook.read_column_as_text("TY_Items_Promo_LY", "A").unwrap(),
            "Article\n00042\n00042"
        );
    }

    #[test]
    fn test_long_campaign_name_keeps_each_pass_raw_sheets() {
        let mut session = session();
        let profile = profile();
        let tab = SpecTabContext {
            campaign_name: "SpringClearance2024Wave".to_string(),
            tab_name: "SpringClearance2024Wave_Qual".to_string(),
            base_sheet: "LY Base".to_string(),
        };
        let seeds = SpecSeedValues::default();
        for sub_phase in [EnumSubPhase::Ly, EnumSubPhase::Ty] {
            let ctx = SpecPhaseContext {
                tab: &tab,
                sub_phase: Some(sub_phase),
                seeds: &seeds,
            };
            MultiPhaseHandler
                .collect_inputs(&mut session, &profile, &ctx, &input(true))
                .unwrap();
        }

        let l_sheets = session.list_sheets();
        assert_eq!(
            &l_sheets[4..],
            [
                "TY_Items_SpringClearance2024Wav",
                "LY_Items_SpringClearance2024Wav",
                "LLY_Items_SpringClearance2024Wa",
                "SpringClearance2024Wave_LY",
                "TY_Items_SpringClearance2024W_2",
                "LY_Items_SpringClearance2024W_2",
                "LLY_Items_SpringClearance2024_2",
                "SpringClearance2024Wave_TY",
            ]
        );
        assert_eq!(
            session
                .workbook()
                .read_column_as_text("LY_Items_SpringClearance2024Wav", "A")
                .unwrap(),
            "Article\nL-1"
        );
    }

    #[test]
    fn test_default_tab_name_skips_taken_names() {
        let mut session = session();
        let profile = profile();
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: Some(EnumSubPhase::Ly),
            seeds: &seeds,
        };
        assert_eq!(MultiPhaseHandler.default_tab_name(&session, &ctx), "Promo_LY");
        MultiPhaseHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(true))
            .unwrap();
        assert_eq!(MultiPhaseHandler.default_tab_name(&session, &ctx), "Promo_LY_2");
    }

    #[test]
    fn test_raw_sheet_name_is_truncated() {
        let c_name = derive_raw_sheet_name(EnumYearLabel::Lly, "A_Very_Long_Campaign_Name_TY");
        assert_eq!(c_name.chars().count(), promokit_io_xlsx::N_LEN_EXCEL_SHEET_NAME_MAX);
        assert!(c_name.starts_with("LLY_Items_A_Very"));
    }
}
