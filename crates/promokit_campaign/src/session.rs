//! One loaded template and the sheets a campaign session touched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use promokit_io_xlsx::{XlsxError, XlsxWorkbook};
use tracing::info;

use crate::error::{CampaignResult, EnumCampaignError};

#[derive(Debug, Clone)]
pub struct SpecWorkbookSession {
    path_template: PathBuf,
    workbook: XlsxWorkbook,
    set_sheets_original: BTreeSet<String>,
    set_sheets_touched: BTreeSet<String>,
}

impl SpecWorkbookSession {
    /// Open the template. A missing or unreadable file is a file-access
    /// error carrying the path.
    pub fn open(path: &Path) -> CampaignResult<Self> {
        let workbook = XlsxWorkbook::open(path).map_err(|err| match err {
            XlsxError::FileNotFound(path) => {
                EnumCampaignError::file_access(path, "template file not found")
            }
            other => EnumCampaignError::file_access(path, other),
        })?;
        info!(path = %path.display(), "template opened");
        Ok(Self::from_workbook(workbook, path))
    }

    pub fn from_workbook(workbook: XlsxWorkbook, path_template: impl Into<PathBuf>) -> Self {
        let set_sheets_original = workbook.list_sheets().into_iter().collect();
        Self {
            path_template: path_template.into(),
            workbook,
            set_sheets_original,
            set_sheets_touched: BTreeSet::new(),
        }
    }

    pub fn path_template(&self) -> &Path {
        &self.path_template
    }

    pub fn workbook(&self) -> &XlsxWorkbook {
        &self.workbook
    }

    /// Mutable access; callers record what they change with [`Self::mark_touched`].
    pub fn workbook_mut(&mut self) -> &mut XlsxWorkbook {
        &mut self.workbook
    }

    pub fn list_sheets(&self) -> Vec<String> {
        self.workbook.list_sheets()
    }

    pub fn mark_touched(&mut self, sheet: &str) {
        self.set_sheets_touched.insert(sheet.to_string());
    }

    pub fn sheets_original(&self) -> &BTreeSet<String> {
        &self.set_sheets_original
    }

    pub fn sheets_touched(&self) -> &BTreeSet<String> {
        &self.set_sheets_touched
    }

    /// Touched sheets that were not in the template.
    pub fn sheets_created(&self) -> Vec<String> {
        self.set_sheets_touched
            .difference(&self.set_sheets_original)
            .cloned()
            .collect()
    }

    /// Drop scratch sheets; repeated calls are no-ops.
    pub fn remove_scratch_sheets(&mut self, l_names: &[String]) -> CampaignResult<Vec<String>> {
        let l_removed = self.workbook.remove_sheets(l_names)?;
        for name in &l_removed {
            self.set_sheets_touched.remove(name);
        }
        if !l_removed.is_empty() {
            info!(sheets = ?l_removed, "scratch sheets removed");
        }
        Ok(l_removed)
    }

    pub fn serialize(&self) -> CampaignResult<Vec<u8>> {
        Ok(self.workbook.serialize()?)
    }
}
