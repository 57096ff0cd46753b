//! Template profiles: declarative per-template configuration.
//!
//! A profile is a JSON file naming the template workbook, the handler that
//! drives the per-tab stages, which sheets play which roles, and which cells
//! each logical field is written to.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use promokit_io_xlsx::{parse_cell_address, parse_column_letters};
use serde::Deserialize;
use tracing::{debug, info};

use crate::conf::{
    C_PROFILE_GLOB, C_ROLE_BASE_ANALYSIS, C_ROLE_LIFT_BASE, C_ROLE_LY_BASE, C_ROLE_TY_BASE,
    C_SHEETS_KEY_ALLOWED_BASE, C_SHEETS_KEY_REMOVE_ON_EXPORT,
};
use crate::error::{CampaignResult, EnumCampaignError};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Strategy driving the input, SQL and result stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumHandlerKind {
    /// Single pass writing TY and LY windows onto one tab.
    #[serde(alias = "small_scale_recap")]
    Recap,
    /// Three passes (LY, TY, Lift) onto three base sheets.
    #[serde(alias = "small_scale_new")]
    MultiPhase,
}

impl EnumHandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recap => "recap",
            Self::MultiPhase => "multi_phase",
        }
    }
}

/// How an uploaded article list is written to the item-list sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumArticlePolicy {
    /// Add rows beneath existing content; the header is written once.
    Append,
    /// Delete every row and paste the upload from `A1`.
    #[default]
    Overwrite,
}

/// Where the SQL article tuple comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumTupleSource {
    /// Pre-built cell when present, else built from column A.
    #[default]
    Auto,
    /// Pre-built cell only (`F1` of the upload).
    Cell,
    /// Always built from column A.
    Column,
}

/// A role bound to one sheet or to an ordered list of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnumSheetRef {
    One(String),
    Candidates(Vec<String>),
}

impl EnumSheetRef {
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name.clone()],
            Self::Candidates(l_names) => l_names.clone(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Profile

#[derive(Debug, Deserialize)]
struct RawTemplateProfile {
    display_name: String,
    template_file: PathBuf,
    #[serde(alias = "handler_module")]
    handler: Option<EnumHandlerKind>,
    #[serde(default)]
    sheets: BTreeMap<String, EnumSheetRef>,
    #[serde(default)]
    mappings: BTreeMap<String, String>,
    #[serde(default)]
    sql_mappings: BTreeMap<String, String>,
    remove_on_export: Option<Vec<String>>,
    allowed_base_sheets: Option<Vec<String>>,
    #[serde(default)]
    article_policy: EnumArticlePolicy,
    #[serde(default)]
    tuple_source: EnumTupleSource,
}

/// Validated template profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTemplateProfile {
    /// Unique catalog key.
    pub display_name: String,
    /// Template workbook; relative paths are resolved against the profile's
    /// directory.
    pub template_file: PathBuf,
    pub handler_kind: EnumHandlerKind,
    /// Role -> sheet name or candidate names.
    pub sheet_roles: BTreeMap<String, EnumSheetRef>,
    /// Field -> cell address or column letters.
    pub cell_mappings: BTreeMap<String, String>,
    /// Result key -> cell address.
    pub sql_result_mappings: BTreeMap<String, String>,
    pub sheets_to_remove_on_export: Vec<String>,
    /// Explicit allowed base sheets; see [`Self::allowed_base_sheets`].
    pub allowed_base_sheets_explicit: Option<Vec<String>>,
    pub article_policy: EnumArticlePolicy,
    pub tuple_source: EnumTupleSource,
}

impl SpecTemplateProfile {
    /// Parse and validate a profile document. `base_dir` anchors a relative
    /// `template_file`.
    pub fn from_json_str(c_json: &str, base_dir: Option<&Path>) -> CampaignResult<Self> {
        let raw: RawTemplateProfile = serde_json::from_str(c_json)
            .map_err(|err| EnumCampaignError::Configuration(format!("Invalid profile: {err}")))?;
        let profile = Self::from_raw(raw, base_dir)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> CampaignResult<Self> {
        let c_json =
            fs::read_to_string(path).map_err(|err| EnumCampaignError::file_access(path, err))?;
        Self::from_json_str(&c_json, path.parent()).map_err(|err| match err {
            EnumCampaignError::Configuration(msg) => {
                EnumCampaignError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    fn from_raw(mut raw: RawTemplateProfile, base_dir: Option<&Path>) -> CampaignResult<Self> {
        let handler_kind = raw.handler.unwrap_or(EnumHandlerKind::Recap);

        let remove_nested = raw.sheets.remove(C_SHEETS_KEY_REMOVE_ON_EXPORT);
        let allowed_nested = raw.sheets.remove(C_SHEETS_KEY_ALLOWED_BASE);
        let sheets_to_remove_on_export = raw
            .remove_on_export
            .or_else(|| remove_nested.map(|r| r.names()))
            .unwrap_or_default();
        let allowed_base_sheets_explicit = raw
            .allowed_base_sheets
            .or_else(|| allowed_nested.map(|r| r.names()));

        let template_file = match base_dir {
            Some(dir) if raw.template_file.is_relative() => dir.join(&raw.template_file),
            _ => raw.template_file,
        };

        Ok(Self {
            display_name: raw.display_name.trim().to_string(),
            template_file,
            handler_kind,
            sheet_roles: raw.sheets,
            cell_mappings: raw.mappings,
            sql_result_mappings: raw.sql_mappings,
            sheets_to_remove_on_export,
            allowed_base_sheets_explicit,
            article_policy: raw.article_policy,
            tuple_source: raw.tuple_source,
        })
    }

    /// Check every mapping value without a workbook at hand.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.display_name.is_empty() {
            return Err(EnumCampaignError::Configuration(
                "Profile display_name is empty.".to_string(),
            ));
        }
        for (key, c_target) in &self.cell_mappings {
            if parse_cell_address(c_target).is_err() && parse_column_letters(c_target).is_err() {
                return Err(EnumCampaignError::Configuration(format!(
                    "Mapping {key:?} -> {c_target:?} is neither a cell address nor a column."
                )));
            }
        }
        for (key, c_target) in &self.sql_result_mappings {
            parse_cell_address(c_target).map_err(|err| {
                EnumCampaignError::Configuration(format!("SQL mapping {key:?}: {err}"))
            })?;
        }
        if let Some((role, _)) = self
            .sheet_roles
            .iter()
            .find(|(_, r)| matches!(r, EnumSheetRef::Candidates(l) if l.is_empty()))
        {
            return Err(EnumCampaignError::Configuration(
                format!("Sheet role {role:?} lists no candidates."),
            ));
        }
        Ok(())
    }

    /// Check that every declared role resolves in a workbook with `l_present`
    /// sheets. Runs before the workbook is touched.
    pub fn validate_against_workbook(&self, l_present: &[String]) -> CampaignResult<()> {
        for role in self.sheet_roles.keys() {
            self.resolve_sheet_role(role, l_present)?;
        }
        Ok(())
    }

    /// Sheet playing `role`: the named sheet, or the first present candidate.
    pub fn resolve_sheet_role(&self, role: &str, l_present: &[String]) -> CampaignResult<String> {
        let sheet_ref = self.sheet_roles.get(role).ok_or_else(|| {
            EnumCampaignError::Configuration(format!(
                "Profile {:?} defines no sheet for role {role:?}.",
                self.display_name
            ))
        })?;
        let l_candidates = sheet_ref.names();
        l_candidates
            .iter()
            .find(|name| l_present.contains(name))
            .cloned()
            .ok_or_else(|| {
                EnumCampaignError::Configuration(format!(
                    "None of {l_candidates:?} (role {role:?}) exist in the template; sheets are {l_present:?}."
                ))
            })
    }

    /// Allowed base sheets: explicit list, else the handler's role sheets.
    pub fn allowed_base_sheets(&self) -> Vec<String> {
        if let Some(l_names) = &self.allowed_base_sheets_explicit {
            return l_names.clone();
        }
        let l_roles: &[&str] = match self.handler_kind {
            EnumHandlerKind::Recap => &[C_ROLE_BASE_ANALYSIS],
            EnumHandlerKind::MultiPhase => &[C_ROLE_LY_BASE, C_ROLE_TY_BASE, C_ROLE_LIFT_BASE],
        };
        l_roles
            .iter()
            .filter_map(|role| self.sheet_roles.get(*role))
            .flat_map(EnumSheetRef::names)
            .collect()
    }

    pub fn mapping(&self, key: &str) -> Option<&str> {
        self.cell_mappings.get(key).map(String::as_str)
    }

    /// Mapped target of `key`, or a configuration error naming it.
    pub fn require_mapping(&self, key: &str) -> CampaignResult<&str> {
        self.mapping(key).ok_or_else(|| {
            EnumCampaignError::Configuration(format!(
                "Profile {:?} has no mapping for {key:?}.",
                self.display_name
            ))
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Catalog

/// Profiles keyed by display name.
#[derive(Debug, Clone, Default)]
pub struct SpecProfileCatalog {
    dict_profiles: BTreeMap<String, SpecTemplateProfile>,
}

impl SpecProfileCatalog {
    /// Read every `*.json` file directly inside `dir`.
    ///
    /// A malformed profile or an empty directory is a configuration error.
    pub fn load_dir(dir: &Path) -> CampaignResult<Self> {
        let matcher = Glob::new(C_PROFILE_GLOB)
            .map_err(|err| EnumCampaignError::Configuration(format!("Invalid profile glob: {err}")))?
            .compile_matcher();
        let entries = fs::read_dir(dir).map_err(|err| EnumCampaignError::file_access(dir, err))?;

        let mut l_paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| EnumCampaignError::file_access(dir, err))?.path();
            let if_match = path
                .file_name()
                .is_some_and(|name| matcher.is_match(name));
            if if_match && path.is_file() {
                l_paths.push(path);
            }
        }
        l_paths.sort();

        let mut catalog = Self::default();
        for path in &l_paths {
            let profile = SpecTemplateProfile::load(path)?;
            debug!(path = %path.display(), profile = %profile.display_name, "profile loaded");
            catalog.insert(profile)?;
        }
        if catalog.is_empty() {
            return Err(EnumCampaignError::Configuration(format!(
                "No profile files found in {}.",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), profiles = catalog.len(), "profile catalog loaded");
        Ok(catalog)
    }

    pub fn from_profiles(l_profiles: Vec<SpecTemplateProfile>) -> CampaignResult<Self> {
        let mut catalog = Self::default();
        for profile in l_profiles {
            catalog.insert(profile)?;
        }
        Ok(catalog)
    }

    fn insert(&mut self, profile: SpecTemplateProfile) -> CampaignResult<()> {
        if self.dict_profiles.contains_key(&profile.display_name) {
            return Err(EnumCampaignError::Configuration(format!(
                "Duplicate profile display_name {:?}.",
                profile.display_name
            )));
        }
        self.dict_profiles
            .insert(profile.display_name.clone(), profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SpecTemplateProfile> {
        self.dict_profiles.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.dict_profiles.keys().cloned().collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SpecTemplateProfile> {
        self.dict_profiles.values()
    }

    pub fn len(&self) -> usize {
        self.dict_profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_profiles.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
