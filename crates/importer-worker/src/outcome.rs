//! Per-file results of a job

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FileError, FileResult};
use crate::strategy::ImportSummary;

/// Result of one file entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success(ImportSummary),
    Failure {
        kind: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<ImportSummary>,
    },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Error kind for failures
    pub fn failure_kind(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(kind),
        }
    }
}

impl From<FileError> for FileOutcome {
    fn from(err: FileError) -> Self {
        let kind = err.kind().to_string();
        let message = err.to_string();
        let partial = err.partial().cloned();

        Self::Failure {
            kind,
            message,
            partial,
        }
    }
}

impl From<FileResult<ImportSummary>> for FileOutcome {
    fn from(result: FileResult<ImportSummary>) -> Self {
        match result {
            Ok(summary) => Self::Success(summary),
            Err(err) => err.into(),
        }
    }
}

/// File name to outcome, one entry per distinct file name of the job
pub type OutcomeMap = BTreeMap<String, FileOutcome>;
