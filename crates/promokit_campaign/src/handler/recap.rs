//! Single-pass recap tab: TY and LY windows side by side on one sheet.

use promokit_io_xlsx::SpecXlsxReport;
use tracing::{debug, info};

use super::{
    PhaseHandler, SpecPhaseContext, SpecPhaseInput, create_tab, plan_tab_header, prepare_tab_name,
    render_sql_from_column, validate_amounts, write_tab_header,
};
use crate::article::ArticleList;
use crate::conf::{
    C_MAP_LY_QUALIFY_DATES, C_MAP_LY_REDEEM_DATES, C_MAP_SQL_CODE_COL, C_MAP_SQL_OUTPUT_START,
    C_MAP_TY_QUALIFY_DATES, C_MAP_TY_REDEEM_DATES, C_ROLE_ITEM_LIST, C_SQL_CODE_COL_DEFAULT,
    C_SQL_TUPLE_EMPTY,
};
use crate::error::CampaignResult;
use crate::fields::SpecTabFields;
use crate::profile::{EnumArticlePolicy, EnumHandlerKind, SpecTemplateProfile};
use crate::results::parse_result_sequence;
use crate::session::SpecWorkbookSession;
use crate::sql::SpecRenderedSql;

const TUP_MAPPINGS_REQUIRED: [&str; 4] = [
    C_MAP_TY_QUALIFY_DATES,
    C_MAP_TY_REDEEM_DATES,
    C_MAP_LY_QUALIFY_DATES,
    C_MAP_LY_REDEEM_DATES,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RecapHandler;

impl PhaseHandler for RecapHandler {
    fn kind(&self) -> EnumHandlerKind {
        EnumHandlerKind::Recap
    }

    fn tab_name_stem(&self, ctx: &SpecPhaseContext<'_>) -> String {
        ctx.tab.tab_name.clone()
    }

    fn base_sheet(
        &self,
        _profile: &SpecTemplateProfile,
        _session: &SpecWorkbookSession,
        ctx: &SpecPhaseContext<'_>,
    ) -> CampaignResult<String> {
        Ok(ctx.tab.base_sheet.clone())
    }

    fn collect_inputs(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        ctx: &SpecPhaseContext<'_>,
        input: &SpecPhaseInput,
    ) -> CampaignResult<SpecTabFields> {
        validate_amounts(input)?;
        let c_requested = match &input.tab_name {
            Some(c_name) => c_name.clone(),
            None => self.default_tab_name(session, ctx),
        };
        let c_tab = prepare_tab_name(session, &c_requested)?;
        let c_base = self.base_sheet(profile, session, ctx)?;

        let articles = input
            .article
            .as_ref()
            .map(|upload| ArticleList::load(upload, None))
            .transpose()?;
        let c_item_sheet = match &articles {
            Some(_) => Some(profile.resolve_sheet_role(C_ROLE_ITEM_LIST, &session.list_sheets())?),
            None => None,
        };
        let sql_article_tuple = articles
            .as_ref()
            .map(|list| list.derive_sql_tuple(profile.tuple_source))
            .unwrap_or_else(|| C_SQL_TUPLE_EMPTY.to_string());

        let dates = input.dates.resolve();
        let fields = SpecTabFields {
            tab_name: c_tab.clone(),
            base_sheet: c_base.clone(),
            sub_phase: None,
            dates,
            formatted: dates.to_formatted(),
            qualify_amount: input.qualify_amount,
            redeem_amount: input.redeem_amount,
            sql_article_tuple,
        };
        let plan = plan_tab_header(profile, &fields, &TUP_MAPPINGS_REQUIRED)?;

        if let (Some(list), Some(c_item_sheet)) = (&articles, &c_item_sheet) {
            let n_rows = match profile.article_policy {
                EnumArticlePolicy::Overwrite => session
                    .workbook_mut()
                    .overwrite_sheet(c_item_sheet, &list.raw()?)?,
                EnumArticlePolicy::Append => session
                    .workbook_mut()
                    .append_rows(c_item_sheet, &list.raw()?, true)?,
            };
            session.mark_touched(c_item_sheet);
            debug!(sheet = %c_item_sheet, rows = n_rows, policy = ?profile.article_policy, "article list written");
        }
        create_tab(session, &c_base, &c_tab)?;
        write_tab_header(session, &c_tab, &plan)?;

        info!(tab = %c_tab, base = %c_base, "recap tab created");
        Ok(fields)
    }

    fn build_sql_template(
        &self,
        session: &SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
    ) -> CampaignResult<SpecRenderedSql> {
        let c_column = profile
            .mapping(C_MAP_SQL_CODE_COL)
            .unwrap_or(C_SQL_CODE_COL_DEFAULT);
        render_sql_from_column(session, profile, fields, c_column)
    }

    fn capture_results(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
        c_paste: &str,
    ) -> CampaignResult<SpecXlsxReport> {
        let l_tokens = parse_result_sequence(c_paste)?;
        let c_start = profile.require_mapping(C_MAP_SQL_OUTPUT_START)?;
        let report = session.workbook_mut().write_column_from_sequence(
            &fields.tab_name,
            c_start,
            &l_tokens,
        )?;
        session.mark_touched(&fields.tab_name);
        info!(tab = %fields.tab_name, values = l_tokens.len(), "results written");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{SpecDateInput, SpecDateWindow};
    use crate::error::EnumCampaignError;
    use crate::fields::SpecTabContext;
    use crate::request_form::SpecSeedValues;
    use crate::article::SpecUpload;
    use chrono::NaiveDate;
    use promokit_io_xlsx::{EnumCellValue, XlsxWorkbook};
    use rust_xlsxwriter::Workbook;
    use std::collections::BTreeMap;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session() -> SpecWorkbookSession {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Base").unwrap();
        sheet.write_formula(5, 1, "=LEN(B2)").unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Item List").unwrap();
        sheet.write_string(0, 0, "Article").unwrap();
        sheet.write_string(1, 0, "OLD-1").unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("SQL").unwrap();
        sheet.write_string(0, 0, "WbVarDef qualify_start='';").unwrap();
        sheet.write_string(1, 0, "WbVarDef ly_qualify_end='';").unwrap();
        sheet.write_string(3, 0, "select * from t where a in article_list=()").unwrap();
        let v_bytes = workbook.save_to_buffer().unwrap();
        SpecWorkbookSession::from_workbook(XlsxWorkbook::from_bytes(&v_bytes).unwrap(), "t.xlsx")
    }

    fn profile(c_policy: &str) -> SpecTemplateProfile {
        let c_json = format!(
            r#"{{"display_name": "Recap", "template_file": "t.xlsx", "handler": "recap",
            "article_policy": "{c_policy}",
            "sheets": {{"base_analysis": "Base", "item_list": "Item List", "sql_output": "SQL"}},
            "mappings": {{"ty_qualify_dates": "B2", "ty_redeem_dates": "B3",
                "ly_qualify_dates": "C2", "ly_redeem_dates": "C3",
                "p4_qualify_amt": "P4", "q4_redeem_amt": "Q4",
                "sql_code_col": "A", "sql_output_start": "E10"}}}}"#
        );
        SpecTemplateProfile::from_json_str(&c_json, None).unwrap()
    }

    fn input(article: Option<SpecUpload>) -> SpecPhaseInput {
        SpecPhaseInput {
            dates: SpecDateInput::from_ty(
                SpecDateWindow::new(ymd(2024, 1, 15), ymd(2024, 1, 29)),
                SpecDateWindow::new(ymd(2024, 1, 30), ymd(2024, 2, 13)),
            ),
            article,
            dict_uploads: BTreeMap::new(),
            qualify_amount: 25.0,
            redeem_amount: 5.0,
            tab_name: None,
        }
    }

    fn tab() -> SpecTabContext {
        SpecTabContext {
            campaign_name: "Promo".to_string(),
            tab_name: "Promo_Qual".to_string(),
            base_sheet: "Base".to_string(),
        }
    }

    #[test]
    fn test_collect_inputs_creates_tab_and_writes_mappings() {
        let mut session = session();
        let profile = profile("overwrite");
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: None,
            seeds: &seeds,
        };
        let upload = SpecUpload::new("a.csv", b"Article\nA-1\nA-2\n".to_vec());
        let fields = RecapHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(Some(upload)))
            .unwrap();

        assert_eq!(fields.sql_article_tuple, "('A-1','A-2')");
        assert_eq!(fields.formatted.ly_q_start, "01/16/2023");
        let workbook = session.workbook();
        assert_eq!(
            workbook.read_cell("Promo_Qual", "B2").unwrap(),
            EnumCellValue::String("01/15/2024 - 01/29/2024".to_string())
        );
        assert_eq!(
            workbook.read_cell("Promo_Qual", "C3").unwrap(),
            EnumCellValue::String("01/31/2023 - 02/14/2023".to_string())
        );
        assert_eq!(workbook.read_cell("Promo_Qual", "P4").unwrap(), EnumCellValue::Number(25.0));
        assert_eq!(
            workbook.read_cell("Promo_Qual", "B6").unwrap(),
            EnumCellValue::Formula("LEN(B2)".to_string())
        );
        assert_eq!(
            workbook.read_column_as_text("Item List", "A").unwrap(),
            "Article\nA-1\nA-2"
        );
        assert!(session.sheets_touched().contains("Item List"));

        let rendered = RecapHandler
            .build_sql_template(&session, &profile, &fields)
            .unwrap();
        assert!(!rendered.if_placeholder);
        assert_eq!(
            rendered.text,
            "WbVarDef qualify_start='01/15/2024';\nWbVarDef ly_qualify_end='01/30/2023';\n\n\
             select * from t where a in article_list=('A-1','A-2')"
        );

        let report = RecapHandler
            .capture_results(&mut session, &profile, &fields, "100\tabc 3.5")
            .unwrap();
        assert_eq!(report.cells, vec!["E10", "E11", "E12"]);
        let workbook = session.workbook();
        assert_eq!(workbook.read_cell("Promo_Qual", "E10").unwrap(), EnumCellValue::Number(100.0));
        assert_eq!(
            workbook.read_cell("Promo_Qual", "E11").unwrap(),
            EnumCellValue::String("abc".to_string())
        );
    }

    #[test]
    fn test_append_policy_keeps_existing_rows() {
        let mut session = session();
        let profile = profile("append");
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: None,
            seeds: &seeds,
        };
        let upload = SpecUpload::new("a.csv", b"Article\nA-1\n".to_vec());
        RecapHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(Some(upload)))
            .unwrap();
        assert_eq!(
            session.workbook().read_column_as_text("Item List", "A").unwrap(),
            "Article\nOLD-1\nA-1"
        );
    }

    #[test]
    fn test_failures_leave_workbook_untouched() {
        let mut session = session();
        let profile = profile("overwrite");
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: None,
            seeds: &seeds,
        };
        let bad = SpecUpload::new("a.txt", b"x".to_vec());
        assert!(matches!(
            RecapHandler.collect_inputs(&mut session, &profile, &ctx, &input(Some(bad))),
            Err(EnumCampaignError::Validation(_))
        ));
        assert_eq!(session.list_sheets(), vec!["Base", "Item List", "SQL"]);
        assert!(session.sheets_touched().is_empty());
    }

    #[test]
    fn test_no_article_gives_empty_tuple_and_empty_paste_fails() {
        let mut session = session();
        let profile = profile("overwrite");
        let tab = tab();
        let seeds = SpecSeedValues::default();
        let ctx = SpecPhaseContext {
            tab: &tab,
            sub_phase: None,
            seeds: &seeds,
        };
        let fields = RecapHandler
            .collect_inputs(&mut session, &profile, &ctx, &input(None))
            .unwrap();
        assert_eq!(fields.sql_article_tuple, "()");
        assert!(matches!(
            RecapHandler.capture_results(&mut session, &profile, &fields, "   "),
            Err(EnumCampaignError::Validation(_))
        ));
    }
}
