//! Stage sequencing for one campaign session.
//!
//! `Setup -> DataSourceChoice -> BaseSheetSelection -> [PhaseInput ->
//! SqlTemplate -> ResultCapture] x n -> LoopOrFinalize -> Finalize -> Done`.
//!
//! Every transition checks the current stage first and fails with
//! [`EnumCampaignError::InvalidTransition`] without side effects when called
//! out of order. Transitions that fail on operator input leave the stage
//! unchanged.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use promokit_io_xlsx::{C_MIME_XLSX, SpecXlsxReport, sanitize_sheet_name};
use tracing::{debug, info};

use crate::article::SpecUpload;
use crate::conf::{C_DOWNLOAD_SUFFIX, C_SHEET_REQUEST_FORM, C_TAB_SUFFIX_DEFAULT};
use crate::error::{CampaignResult, EnumCampaignError};
use crate::fields::{SpecFormDefaults, SpecTabContext, SpecTabFields};
use crate::handler::{EnumSubPhase, PhaseHandler, SpecPhaseContext, SpecPhaseInput, build_handler};
use crate::profile::{SpecProfileCatalog, SpecTemplateProfile};
use crate::request_form::{SpecSeedValues, extract_request_form};
use crate::session::SpecWorkbookSession;
use crate::sql::SpecRenderedSql;

////////////////////////////////////////////////////////////////////////////////
// #region Stage

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumWorkflowStage {
    Setup,
    DataSourceChoice,
    BaseSheetSelection,
    PhaseInput,
    SqlTemplate,
    ResultCapture,
    LoopOrFinalize,
    Finalize,
    Done,
}

impl fmt::Display for EnumWorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Download

/// Finished workbook ready for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDownload {
    pub file_name: String,
    pub mime: &'static str,
    pub v_bytes: Vec<u8>,
}

impl SpecDownload {
    /// Write into `dir` under [`Self::file_name`]; returns the written path.
    pub fn save_to(&self, dir: &Path) -> CampaignResult<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.v_bytes).map_err(|err| EnumCampaignError::file_access(&path, err))?;
        info!(path = %path.display(), bytes = self.v_bytes.len(), "download written");
        Ok(path)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workflow

/// Profile, template and handler bound at Setup; kept across tabs.
#[derive(Debug)]
struct SpecActiveCampaign {
    campaign_name: String,
    profile: SpecTemplateProfile,
    session: SpecWorkbookSession,
    handler: Box<dyn PhaseHandler>,
    seeds: SpecSeedValues,
}

#[derive(Debug)]
pub struct CampaignWorkflow {
    path_config_dir: Option<PathBuf>,
    catalog: SpecProfileCatalog,
    stage: EnumWorkflowStage,
    active: Option<SpecActiveCampaign>,
    tab: Option<SpecTabContext>,
    fields: Option<SpecTabFields>,
    sub_phase: Option<EnumSubPhase>,
    l_sub_phases_visited: Vec<EnumSubPhase>,
    l_tabs_completed: Vec<String>,
    download: Option<SpecDownload>,
}

impl CampaignWorkflow {
    /// Load the profile catalog from `config_dir` and start at Setup.
    pub fn new(config_dir: impl Into<PathBuf>) -> CampaignResult<Self> {
        let path_config_dir = config_dir.into();
        let catalog = SpecProfileCatalog::load_dir(&path_config_dir)?;
        let mut workflow = Self::from_catalog(catalog);
        workflow.path_config_dir = Some(path_config_dir);
        Ok(workflow)
    }

    /// Start at Setup with an already loaded catalog. [`Self::reset`] keeps
    /// this catalog since there is no directory to reload from.
    pub fn from_catalog(catalog: SpecProfileCatalog) -> Self {
        Self {
            path_config_dir: None,
            catalog,
            stage: EnumWorkflowStage::Setup,
            active: None,
            tab: None,
            fields: None,
            sub_phase: None,
            l_sub_phases_visited: Vec::new(),
            l_tabs_completed: Vec::new(),
            download: None,
        }
    }

    // #region Accessors

    pub fn stage(&self) -> EnumWorkflowStage {
        self.stage
    }

    pub fn catalog(&self) -> &SpecProfileCatalog {
        &self.catalog
    }

    pub fn campaign_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.campaign_name.as_str())
    }

    pub fn profile(&self) -> Option<&SpecTemplateProfile> {
        self.active.as_ref().map(|a| &a.profile)
    }

    pub fn session(&self) -> Option<&SpecWorkbookSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn seeds(&self) -> Option<&SpecSeedValues> {
        self.active.as_ref().map(|a| &a.seeds)
    }

    pub fn tab(&self) -> Option<&SpecTabContext> {
        self.tab.as_ref()
    }

    /// Fields written by the current pass, once PhaseInput succeeded.
    pub fn fields(&self) -> Option<&SpecTabFields> {
        self.fields.as_ref()
    }

    /// Active multi-phase pass; `None` outside a cycle and for recap.
    pub fn sub_phase(&self) -> Option<EnumSubPhase> {
        self.sub_phase
    }

    /// Passes entered in the current tab cycle, in order.
    pub fn sub_phases_visited(&self) -> &[EnumSubPhase] {
        &self.l_sub_phases_visited
    }

    /// Tabs whose results were captured, across every cycle.
    pub fn tabs_completed(&self) -> &[String] {
        &self.l_tabs_completed
    }

    pub fn download(&self) -> Option<&SpecDownload> {
        self.download.as_ref()
    }

    // #endregion

    fn expect_stage(&self, expected: EnumWorkflowStage, action: &'static str) -> CampaignResult<()> {
        if self.stage != expected {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action,
            });
        }
        Ok(())
    }

    fn require_active(&self, action: &'static str) -> CampaignResult<&SpecActiveCampaign> {
        self.active.as_ref().ok_or(EnumCampaignError::InvalidTransition {
            stage: self.stage,
            action,
        })
    }

    fn require_tab(&self, action: &'static str) -> CampaignResult<&SpecTabContext> {
        self.tab.as_ref().ok_or(EnumCampaignError::InvalidTransition {
            stage: self.stage,
            action,
        })
    }

    fn require_fields(&self, action: &'static str) -> CampaignResult<&SpecTabFields> {
        self.fields.as_ref().ok_or(EnumCampaignError::InvalidTransition {
            stage: self.stage,
            action,
        })
    }

    fn advance(&mut self, next: EnumWorkflowStage) {
        info!(from = %self.stage, to = %next, sub_phase = ?self.sub_phase, "stage transition");
        self.stage = next;
    }

    // #region Setup

    /// Bind campaign name and profile, open the template and check every
    /// sheet role against it.
    pub fn start(&mut self, campaign_name: &str, profile_name: &str) -> CampaignResult<()> {
        const C_ACTION: &str = "start";
        self.expect_stage(EnumWorkflowStage::Setup, C_ACTION)?;

        let campaign_name = campaign_name.trim();
        if campaign_name.is_empty() {
            return Err(EnumCampaignError::Validation(
                "Enter a campaign name.".to_string(),
            ));
        }
        let profile = self.catalog.get(profile_name).cloned().ok_or_else(|| {
            EnumCampaignError::Configuration(format!(
                "Unknown profile {profile_name:?}; available: {:?}.",
                self.catalog.names()
            ))
        })?;
        let session = SpecWorkbookSession::open(&profile.template_file)?;
        profile.validate_against_workbook(&session.list_sheets())?;
        let handler = build_handler(profile.handler_kind)?;

        info!(
            campaign = campaign_name,
            profile = %profile.display_name,
            handler = profile.handler_kind.as_str(),
            "campaign started"
        );
        self.active = Some(SpecActiveCampaign {
            campaign_name: campaign_name.to_string(),
            profile,
            session,
            handler,
            seeds: SpecSeedValues::default(),
        });
        self.advance(EnumWorkflowStage::DataSourceChoice);
        Ok(())
    }

    // #endregion
    // #region DataSource

    /// Seed the forms from a request form and keep a raw copy of it in the
    /// workbook.
    pub fn choose_request_form(&mut self, upload: &SpecUpload) -> CampaignResult<SpecSeedValues> {
        const C_ACTION: &str = "choose_request_form";
        self.expect_stage(EnumWorkflowStage::DataSourceChoice, C_ACTION)?;

        let form = extract_request_form(upload)?;
        let Some(active) = self.active.as_mut() else {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        };
        active
            .session
            .workbook_mut()
            .create_sheet_from_tabular(C_SHEET_REQUEST_FORM, &form.l_rows)?;
        active.session.mark_touched(C_SHEET_REQUEST_FORM);
        active.seeds = form.seeds;
        let seeds = form.seeds;

        self.advance(EnumWorkflowStage::BaseSheetSelection);
        Ok(seeds)
    }

    /// No seeds; form defaults apply.
    pub fn choose_manual_entry(&mut self) -> CampaignResult<()> {
        const C_ACTION: &str = "choose_manual_entry";
        self.expect_stage(EnumWorkflowStage::DataSourceChoice, C_ACTION)?;
        let Some(active) = self.active.as_mut() else {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        };
        active.seeds = SpecSeedValues::default();
        self.advance(EnumWorkflowStage::BaseSheetSelection);
        Ok(())
    }

    // #endregion
    // #region BaseSheet

    /// Allowed base sheets present in the workbook, in profile order.
    pub fn base_sheet_candidates(&self) -> CampaignResult<Vec<String>> {
        let active = self.require_active("base_sheet_candidates")?;
        let l_present = active.session.list_sheets();
        Ok(active
            .profile
            .allowed_base_sheets()
            .into_iter()
            .filter(|name| l_present.contains(name))
            .collect())
    }

    /// Fix the base sheet and tab name (`{campaign}_{suffix}`) for the next
    /// tab cycle.
    pub fn select_base_sheet(
        &mut self,
        base_sheet: &str,
        tab_suffix: Option<&str>,
    ) -> CampaignResult<&SpecTabContext> {
        const C_ACTION: &str = "select_base_sheet";
        self.expect_stage(EnumWorkflowStage::BaseSheetSelection, C_ACTION)?;

        let l_candidates = self.base_sheet_candidates()?;
        if l_candidates.is_empty() {
            let active = self.require_active(C_ACTION)?;
            return Err(EnumCampaignError::Configuration(format!(
                "None of the allowed base sheets {:?} exist in the template.",
                active.profile.allowed_base_sheets()
            )));
        }
        if !l_candidates.iter().any(|name| name == base_sheet) {
            return Err(EnumCampaignError::Validation(format!(
                "{base_sheet:?} is not a valid base sheet; choose one of {l_candidates:?}."
            )));
        }

        let active = self.require_active(C_ACTION)?;
        let c_suffix = tab_suffix
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(C_TAB_SUFFIX_DEFAULT);
        let tab = SpecTabContext {
            campaign_name: active.campaign_name.clone(),
            tab_name: sanitize_sheet_name(&format!("{}_{c_suffix}", active.campaign_name), "_"),
            base_sheet: base_sheet.to_string(),
        };
        let sub_phase = active.handler.first_sub_phase();
        debug!(tab = %tab.tab_name, base = %tab.base_sheet, "base sheet selected");

        self.sub_phase = sub_phase;
        self.l_sub_phases_visited = sub_phase.into_iter().collect();
        self.fields = None;
        self.advance(EnumWorkflowStage::PhaseInput);
        Ok(&*self.tab.insert(tab))
    }

    // #endregion
    // #region Phase

    /// Values the input form starts from. Read-only.
    pub fn form_defaults(&self, today: NaiveDate) -> CampaignResult<SpecFormDefaults> {
        const C_ACTION: &str = "form_defaults";
        self.expect_stage(EnumWorkflowStage::PhaseInput, C_ACTION)?;
        let active = self.require_active(C_ACTION)?;
        let ctx = SpecPhaseContext {
            tab: self.require_tab(C_ACTION)?,
            sub_phase: self.sub_phase,
            seeds: &active.seeds,
        };
        active
            .handler
            .form_defaults(&active.profile, &active.session, &ctx, today)
    }

    /// Validate the pass input, then create and fill the tab.
    pub fn submit_phase_input(&mut self, input: &SpecPhaseInput) -> CampaignResult<&SpecTabFields> {
        const C_ACTION: &str = "submit_phase_input";
        self.expect_stage(EnumWorkflowStage::PhaseInput, C_ACTION)?;
        let (Some(active), Some(tab)) = (self.active.as_mut(), self.tab.as_ref()) else {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        };
        let ctx = SpecPhaseContext {
            tab,
            sub_phase: self.sub_phase,
            seeds: &active.seeds,
        };
        let fields =
            active
                .handler
                .collect_inputs(&mut active.session, &active.profile, &ctx, input)?;

        self.advance(EnumWorkflowStage::SqlTemplate);
        Ok(&*self.fields.insert(fields))
    }

    /// SQL for the current pass. Read-only; available until results are
    /// captured.
    pub fn render_sql(&self) -> CampaignResult<SpecRenderedSql> {
        const C_ACTION: &str = "render_sql";
        if !matches!(
            self.stage,
            EnumWorkflowStage::SqlTemplate | EnumWorkflowStage::ResultCapture
        ) {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        }
        let active = self.require_active(C_ACTION)?;
        let fields = self.require_fields(C_ACTION)?;
        active
            .handler
            .build_sql_template(&active.session, &active.profile, fields)
    }

    pub fn proceed_to_result_capture(&mut self) -> CampaignResult<()> {
        self.expect_stage(EnumWorkflowStage::SqlTemplate, "proceed_to_result_capture")?;
        self.advance(EnumWorkflowStage::ResultCapture);
        Ok(())
    }

    /// Write pasted results, then move to the next sub-phase or, after the
    /// last one, to LoopOrFinalize.
    pub fn submit_results(&mut self, c_paste: &str) -> CampaignResult<SpecXlsxReport> {
        const C_ACTION: &str = "submit_results";
        self.expect_stage(EnumWorkflowStage::ResultCapture, C_ACTION)?;
        let (Some(active), Some(fields)) = (self.active.as_mut(), self.fields.as_ref()) else {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        };
        let report =
            active
                .handler
                .capture_results(&mut active.session, &active.profile, fields, c_paste)?;
        self.l_tabs_completed.push(fields.tab_name.clone());
        self.fields = None;

        match self.sub_phase.and_then(|sub_phase| sub_phase.next()) {
            Some(next) => {
                self.sub_phase = Some(next);
                self.l_sub_phases_visited.push(next);
                self.advance(EnumWorkflowStage::PhaseInput);
            }
            None => {
                self.sub_phase = None;
                self.advance(EnumWorkflowStage::LoopOrFinalize);
            }
        }
        Ok(report)
    }

    // #endregion
    // #region Finish

    /// Start another tab on the same workbook and profile.
    pub fn add_another_tab(&mut self) -> CampaignResult<()> {
        self.expect_stage(EnumWorkflowStage::LoopOrFinalize, "add_another_tab")?;
        self.tab = None;
        self.fields = None;
        self.sub_phase = None;
        self.l_sub_phases_visited.clear();
        self.advance(EnumWorkflowStage::BaseSheetSelection);
        Ok(())
    }

    /// Drop scratch sheets and serialize the workbook for download.
    pub fn finalize(&mut self) -> CampaignResult<&SpecDownload> {
        const C_ACTION: &str = "finalize";
        self.expect_stage(EnumWorkflowStage::LoopOrFinalize, C_ACTION)?;
        let Some(active) = self.active.as_mut() else {
            return Err(EnumCampaignError::InvalidTransition {
                stage: self.stage,
                action: C_ACTION,
            });
        };
        active
            .session
            .remove_scratch_sheets(&active.profile.sheets_to_remove_on_export)?;
        let download = SpecDownload {
            file_name: format!("{}{C_DOWNLOAD_SUFFIX}", active.campaign_name),
            mime: C_MIME_XLSX,
            v_bytes: active.session.serialize()?,
        };
        info!(
            file = %download.file_name,
            sheets = ?active.session.list_sheets(),
            "workbook finalized"
        );

        self.advance(EnumWorkflowStage::Finalize);
        Ok(&*self.download.insert(download))
    }

    pub fn mark_downloaded(&mut self) -> CampaignResult<()> {
        self.expect_stage(EnumWorkflowStage::Finalize, "mark_downloaded")?;
        self.advance(EnumWorkflowStage::Done);
        Ok(())
    }

    /// Clear every piece of session state and return to Setup, reloading the
    /// catalog from disk when it came from a directory. A failed reload
    /// leaves the workflow as it was.
    pub fn reset(&mut self) -> CampaignResult<()> {
        if let Some(dir) = &self.path_config_dir {
            self.catalog = SpecProfileCatalog::load_dir(dir)?;
        }
        self.active = None;
        self.tab = None;
        self.fields = None;
        self.sub_phase = None;
        self.l_sub_phases_visited.clear();
        self.l_tabs_completed.clear();
        self.download = None;
        self.advance(EnumWorkflowStage::Setup);
        Ok(())
    }

    // #endregion
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
