use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use promokit_campaign::dates::require_date_text;
use promokit_campaign::{
    CampaignWorkflow, EnumWorkflowStage, EnumYearLabel, SpecDateWindow, SpecFormDefaults,
    SpecPhaseInput, SpecProfileCatalog, SpecUpload,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "promokit", about = "Build promo campaign analysis workbooks from templates")]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: EnumCommand,
}

#[derive(Subcommand, Debug)]
enum EnumCommand {
    /// List the template profiles found in a config directory.
    Profiles {
        #[arg(long)]
        config_dir: PathBuf,
    },
    /// Run a scripted campaign session and write the finished workbook.
    Run {
        #[arg(long)]
        config_dir: PathBuf,
        /// JSON session script; relative upload paths resolve against its directory.
        #[arg(long)]
        script: PathBuf,
        /// Output directory for `{campaign}_Analysis.xlsx`.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

////////////////////////////////////////////////////////////////////////////////
// #region Script

#[derive(Debug, Deserialize)]
struct SpecScript {
    campaign_name: String,
    profile: String,
    /// Request form to seed the inputs from; manual entry when absent.
    request_form: Option<PathBuf>,
    tabs: Vec<SpecScriptTab>,
}

#[derive(Debug, Deserialize)]
struct SpecScriptTab {
    /// First candidate when absent.
    base_sheet: Option<String>,
    tab_suffix: Option<String>,
    phases: Vec<SpecScriptPhase>,
}

/// One pass. Omitted values fall back to the form defaults.
#[derive(Debug, Deserialize)]
struct SpecScriptPhase {
    ty_qualify: Option<(String, String)>,
    ty_redeem: Option<(String, String)>,
    ly_qualify: Option<(String, String)>,
    ly_redeem: Option<(String, String)>,
    article: Option<PathBuf>,
    article_sheet: Option<String>,
    /// `TY`/`LY`/`LLY` -> upload path.
    #[serde(default)]
    uploads: BTreeMap<String, PathBuf>,
    qualify_amount: Option<f64>,
    redeem_amount: Option<f64>,
    tab_name: Option<String>,
    results: String,
}

fn parse_window(c_field: &str, window: &(String, String)) -> Result<SpecDateWindow> {
    Ok(SpecDateWindow::new(
        require_date_text(&format!("{c_field} start"), &window.0)?,
        require_date_text(&format!("{c_field} end"), &window.1)?,
    ))
}

fn parse_year_label(c_key: &str) -> Result<EnumYearLabel> {
    EnumYearLabel::ALL
        .into_iter()
        .find(|label| label.as_str().eq_ignore_ascii_case(c_key.trim()))
        .ok_or_else(|| anyhow!("Unknown upload label {c_key:?}; use TY, LY or LLY."))
}

impl SpecScriptPhase {
    fn to_input(&self, defaults: &SpecFormDefaults, base_dir: &Path) -> Result<SpecPhaseInput> {
        let mut input = SpecPhaseInput::from_defaults(defaults);
        // An edited TY window re-derives its LY default unless LY is given too.
        if let Some(window) = &self.ty_qualify {
            input.dates.ty_qualify = parse_window("TY qualify", window)?;
            input.dates.ly_qualify = None;
        }
        if let Some(window) = &self.ty_redeem {
            input.dates.ty_redeem = parse_window("TY redeem", window)?;
            input.dates.ly_redeem = None;
        }
        if let Some(window) = &self.ly_qualify {
            input.dates.ly_qualify = Some(parse_window("LY qualify", window)?);
        }
        if let Some(window) = &self.ly_redeem {
            input.dates.ly_redeem = Some(parse_window("LY redeem", window)?);
        }

        if let Some(path) = &self.article {
            let upload = SpecUpload::from_path(&base_dir.join(path))?;
            input.article = Some(match &self.article_sheet {
                Some(sheet) => upload.with_sheet(sheet.as_str()),
                None => upload,
            });
        }
        for (c_key, path) in &self.uploads {
            input
                .dict_uploads
                .insert(parse_year_label(c_key)?, SpecUpload::from_path(&base_dir.join(path))?);
        }
        if let Some(n) = self.qualify_amount {
            input.qualify_amount = n;
        }
        if let Some(n) = self.redeem_amount {
            input.redeem_amount = n;
        }
        input.tab_name = self.tab_name.clone();
        Ok(input)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Commands

fn init_tracing(if_json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    let result = if if_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| anyhow!("failed to initialise logging: {err}"))
}

fn list_profiles(config_dir: &Path) -> Result<()> {
    let catalog = SpecProfileCatalog::load_dir(config_dir)?;
    for profile in catalog.profiles() {
        println!(
            "{}\t{}\t{}",
            profile.display_name,
            profile.handler_kind.as_str(),
            profile.template_file.display()
        );
    }
    Ok(())
}

fn run_script(config_dir: &Path, script_path: &Path, out_dir: &Path, today: NaiveDate) -> Result<PathBuf> {
    let c_script = fs::read_to_string(script_path)
        .with_context(|| format!("reading script {}", script_path.display()))?;
    let script: SpecScript = serde_json::from_str(&c_script)
        .with_context(|| format!("parsing script {}", script_path.display()))?;
    let base_dir = script_path.parent().unwrap_or(Path::new("."));
    if script.tabs.is_empty() {
        bail!("Script {} defines no tabs.", script_path.display());
    }

    let mut workflow = CampaignWorkflow::new(config_dir)?;
    workflow.start(&script.campaign_name, &script.profile)?;
    match &script.request_form {
        Some(path) => {
            let seeds = workflow.choose_request_form(&SpecUpload::from_path(&base_dir.join(path))?)?;
            info!(?seeds, "request form applied");
        }
        None => workflow.choose_manual_entry()?,
    }

    for (idx_tab, tab) in script.tabs.iter().enumerate() {
        if idx_tab > 0 {
            workflow.add_another_tab()?;
        }
        let c_base = match &tab.base_sheet {
            Some(name) => name.clone(),
            None => workflow
                .base_sheet_candidates()?
                .into_iter()
                .next()
                .context("the template has no allowed base sheet")?,
        };
        workflow.select_base_sheet(&c_base, tab.tab_suffix.as_deref())?;

        for phase in &tab.phases {
            if workflow.stage() != EnumWorkflowStage::PhaseInput {
                bail!("Tab {} lists more phases than its cycle has.", idx_tab + 1);
            }
            let defaults = workflow.form_defaults(today)?;
            let input = phase.to_input(&defaults, base_dir)?;
            let c_tab = workflow.submit_phase_input(&input)?.tab_name.clone();

            let rendered = workflow.render_sql()?;
            println!("-- {c_tab}\n{}\n", rendered.text);
            workflow.proceed_to_result_capture()?;

            let report = workflow.submit_results(&phase.results)?;
            for c_warning in &report.warnings {
                warn!(tab = %c_tab, "{c_warning}");
            }
        }
        if workflow.stage() != EnumWorkflowStage::LoopOrFinalize {
            bail!(
                "Tab {} stopped at {} before its cycle finished.",
                idx_tab + 1,
                workflow.stage()
            );
        }
    }

    let path = workflow.finalize()?.save_to(out_dir)?;
    workflow.mark_downloaded()?;
    Ok(path)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        EnumCommand::Profiles { config_dir } => list_profiles(&config_dir),
        EnumCommand::Run {
            config_dir,
            script,
            out,
        } => {
            let path = run_script(&config_dir, &script, &out, Local::now().date_naive())?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
