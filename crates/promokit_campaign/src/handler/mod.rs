//! Phase handlers: the per-template strategy behind the input, SQL and
//! result stages.
//!
//! Handlers are picked from a static registry keyed by
//! [`EnumHandlerKind`], so an unknown kind fails when the profile loads.

mod multi_phase;
mod recap;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use promokit_io_xlsx::{
    EnumCellValue, SpecXlsxReport, derive_free_sheet_name, parse_cell_address,
    sanitize_sheet_name, validate_sheet_name,
};
use tracing::debug;

use crate::article::{EnumYearLabel, SpecUpload};
use crate::conf::C_ROLE_SQL_OUTPUT;
use crate::dates::{SpecCampaignDates, SpecDateInput};
use crate::error::{CampaignResult, EnumCampaignError};
use crate::fields::{SpecFormDefaults, SpecTabContext, SpecTabFields};
use crate::profile::{EnumHandlerKind, SpecTemplateProfile};
use crate::request_form::SpecSeedValues;
use crate::session::SpecWorkbookSession;
use crate::sql::{SpecRenderedSql, SpecSqlContext};

pub use multi_phase::MultiPhaseHandler;
pub use recap::RecapHandler;

////////////////////////////////////////////////////////////////////////////////
// #region SubPhase

/// Pass of a multi-phase tab cycle. Order: LY, TY, Lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumSubPhase {
    Ly,
    Ty,
    Lift,
}

impl EnumSubPhase {
    pub const SEQUENCE: [EnumSubPhase; 3] = [Self::Ly, Self::Ty, Self::Lift];

    /// Next pass; `None` after Lift.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Ly => Some(Self::Ty),
            Self::Ty => Some(Self::Lift),
            Self::Lift => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ly => "LY",
            Self::Ty => "TY",
            Self::Lift => "LIFT",
        }
    }
}

impl fmt::Display for EnumSubPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Contract

/// What the input stage hands a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPhaseInput {
    pub dates: SpecDateInput,
    /// Single article list (recap).
    pub article: Option<SpecUpload>,
    /// Labelled article lists (multi-phase).
    pub dict_uploads: BTreeMap<EnumYearLabel, SpecUpload>,
    pub qualify_amount: f64,
    pub redeem_amount: f64,
    /// Overrides the handler's default tab name.
    pub tab_name: Option<String>,
}

impl SpecPhaseInput {
    /// Input prefilled from form defaults, without uploads.
    pub fn from_defaults(defaults: &SpecFormDefaults) -> Self {
        Self {
            dates: SpecDateInput {
                ty_qualify: defaults.dates.ty_qualify,
                ty_redeem: defaults.dates.ty_redeem,
                ly_qualify: Some(defaults.dates.ly_qualify),
                ly_redeem: Some(defaults.dates.ly_redeem),
            },
            article: None,
            dict_uploads: BTreeMap::new(),
            qualify_amount: defaults.qualify_amount,
            redeem_amount: defaults.redeem_amount,
            tab_name: None,
        }
    }
}

/// Session state a handler may read.
#[derive(Debug, Clone, Copy)]
pub struct SpecPhaseContext<'a> {
    pub tab: &'a SpecTabContext,
    pub sub_phase: Option<EnumSubPhase>,
    pub seeds: &'a SpecSeedValues,
}

pub trait PhaseHandler: fmt::Debug {
    fn kind(&self) -> EnumHandlerKind;

    /// Sub-phase entered with the input stage; `None` for single-pass kinds.
    fn first_sub_phase(&self) -> Option<EnumSubPhase> {
        None
    }

    /// Tab name the pass suggests, before checking the workbook.
    fn tab_name_stem(&self, ctx: &SpecPhaseContext<'_>) -> String;

    /// [`Self::tab_name_stem`], suffixed `_2`, `_3`, ... when a sheet already
    /// uses it, so a repeated cycle never suggests a taken name.
    fn default_tab_name(
        &self,
        session: &SpecWorkbookSession,
        ctx: &SpecPhaseContext<'_>,
    ) -> String {
        derive_free_sheet_name(
            &sanitize_sheet_name(&self.tab_name_stem(ctx), "_"),
            &session.list_sheets(),
        )
    }

    /// Base sheet the current pass duplicates.
    fn base_sheet(
        &self,
        profile: &SpecTemplateProfile,
        session: &SpecWorkbookSession,
        ctx: &SpecPhaseContext<'_>,
    ) -> CampaignResult<String>;

    /// Form values before operator edits. Never mutates anything.
    fn form_defaults(
        &self,
        profile: &SpecTemplateProfile,
        session: &SpecWorkbookSession,
        ctx: &SpecPhaseContext<'_>,
        today: NaiveDate,
    ) -> CampaignResult<SpecFormDefaults> {
        let dates = ctx.seeds.apply_to(&SpecCampaignDates::default_from(today));
        Ok(SpecFormDefaults {
            lly_qualify: dates.lly_qualify(),
            lly_redeem: dates.lly_redeem(),
            dates,
            qualify_amount: ctx.seeds.qualify_amount.unwrap_or(0.0),
            redeem_amount: ctx.seeds.redeem_amount.unwrap_or(0.0),
            tab_name: self.default_tab_name(session, ctx),
            base_sheet: self.base_sheet(profile, session, ctx)?,
        })
    }

    /// Validate the input, create the tab and write its header cells.
    fn collect_inputs(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        ctx: &SpecPhaseContext<'_>,
        input: &SpecPhaseInput,
    ) -> CampaignResult<SpecTabFields>;

    /// SQL text with the pass's dates and tuple injected.
    fn build_sql_template(
        &self,
        session: &SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
    ) -> CampaignResult<SpecRenderedSql>;

    /// Write pasted results onto the tab.
    fn capture_results(
        &self,
        session: &mut SpecWorkbookSession,
        profile: &SpecTemplateProfile,
        fields: &SpecTabFields,
        c_paste: &str,
    ) -> CampaignResult<SpecXlsxReport>;
}

type FnBuildHandler = fn() -> Box<dyn PhaseHandler>;

const TUP_HANDLER_REGISTRY: [(EnumHandlerKind, FnBuildHandler); 2] = [
    (EnumHandlerKind::Recap, || Box::new(RecapHandler)),
    (EnumHandlerKind::MultiPhase, || Box::new(MultiPhaseHandler)),
];

pub fn build_handler(kind: EnumHandlerKind) -> CampaignResult<Box<dyn PhaseHandler>> {
    TUP_HANDLER_REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, build)| build())
        .ok_or_else(|| {
            EnumCampaignError::Configuration(format!("No handler registered for {kind:?}."))
        })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SharedSteps

/// Sanitized tab name that does not exist in the workbook yet.
pub(crate) fn prepare_tab_name(
    session: &SpecWorkbookSession,
    c_requested: &str,
) -> CampaignResult<String> {
    let c_name = sanitize_sheet_name(c_requested, "_");
    validate_sheet_name(&c_name)?;
    if session.workbook().has_sheet(&c_name) {
        return Err(EnumCampaignError::Validation(format!(
            "A sheet named {c_name:?} already exists; choose another tab name."
        )));
    }
    Ok(c_name)
}

pub(crate) fn validate_amounts(input: &SpecPhaseInput) -> CampaignResult<()> {
    for (c_label, n_value) in [
        ("Qualification amount", input.qualify_amount),
        ("Redemption amount", input.redeem_amount),
    ] {
        if !n_value.is_finite() {
            return Err(EnumCampaignError::Validation(format!(
                "{c_label} must be a finite number."
            )));
        }
    }
    Ok(())
}

/// Header values and their addresses, checked before any write.
///
/// `l_required` keys must be mapped; other header keys are written only when
/// the profile maps them.
pub(crate) struct SpecTabHeaderPlan {
    dict_values: BTreeMap<String, EnumCellValue>,
    dict_addresses: BTreeMap<String, String>,
}

pub(crate) fn plan_tab_header(
    profile: &SpecTemplateProfile,
    fields: &SpecTabFields,
    l_required: &[&str],
) -> CampaignResult<SpecTabHeaderPlan> {
    for key in l_required {
        profile.require_mapping(key)?;
    }
    let mut dict_values = BTreeMap::new();
    let mut dict_addresses = BTreeMap::new();
    for (key, value) in fields.to_field_store() {
        let Some(c_address) = profile.mapping(&key) else {
            debug!(key = %key, "header field not mapped; skipped");
            continue;
        };
        parse_cell_address(c_address).map_err(|err| {
            EnumCampaignError::Configuration(format!("Mapping {key:?} must be a cell: {err}"))
        })?;
        dict_addresses.insert(key.clone(), c_address.to_string());
        dict_values.insert(key, value);
    }
    Ok(SpecTabHeaderPlan {
        dict_values,
        dict_addresses,
    })
}

pub(crate) fn write_tab_header(
    session: &mut SpecWorkbookSession,
    c_tab: &str,
    plan: &SpecTabHeaderPlan,
) -> CampaignResult<SpecXlsxReport> {
    let report =
        session
            .workbook_mut()
            .write_key_value_batch(c_tab, &plan.dict_values, &plan.dict_addresses)?;
    session.mark_touched(c_tab);
    Ok(report)
}

/// Duplicate `base` as `tab`.
pub(crate) fn create_tab(
    session: &mut SpecWorkbookSession,
    c_base: &str,
    c_tab: &str,
) -> CampaignResult<()> {
    session.workbook_mut().duplicate_sheet(c_base, c_tab)?;
    session.mark_touched(c_tab);
    Ok(())
}

/// Render SQL stored one line per cell in `column` of the SQL-source sheet.
pub(crate) fn render_sql_from_column(
    session: &SpecWorkbookSession,
    profile: &SpecTemplateProfile,
    fields: &SpecTabFields,
    c_column: &str,
) -> CampaignResult<SpecRenderedSql> {
    let ctx = SpecSqlContext {
        dates: &fields.formatted,
        article_tuple: &fields.sql_article_tuple,
    };
    if !profile.sheet_roles.contains_key(C_ROLE_SQL_OUTPUT) {
        return SpecRenderedSql::from_source("", &ctx, "the profile (no sql_output sheet)");
    }
    let c_sheet = profile.resolve_sheet_role(C_ROLE_SQL_OUTPUT, &session.list_sheets())?;
    let c_source = session.workbook().read_column_as_text(&c_sheet, c_column)?;
    SpecRenderedSql::from_source(&c_source, &ctx, &format!("{c_sheet}!{c_column}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
