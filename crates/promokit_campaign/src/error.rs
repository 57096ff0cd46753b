//! Campaign error taxonomy.

use std::path::PathBuf;

use promokit_io_xlsx::XlsxError;
use thiserror::Error;

use crate::workflow::EnumWorkflowStage;

#[derive(Debug, Error)]
pub enum EnumCampaignError {
    /// Missing or malformed profile, missing mapped cell, empty base-sheet set.
    #[error("CONFIGURATION: {0}")]
    Configuration(String),
    /// Template or upload not found or unreadable.
    #[error("FILE_ACCESS: {path}: {message}")]
    FileAccess { path: PathBuf, message: String },
    /// Operator input that blocks the transition until corrected.
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("INVALID_TRANSITION: `{action}` is not allowed in stage {stage:?}")]
    InvalidTransition {
        stage: EnumWorkflowStage,
        action: &'static str,
    },
    #[error("WORKBOOK: {0}")]
    Workbook(#[from] XlsxError),
}

impl EnumCampaignError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type CampaignResult<T> = Result<T, EnumCampaignError>;
