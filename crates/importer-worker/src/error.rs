//! Worker error types
//!
//! Errors are split by blast radius. A [`FileError`] aborts one file of a job
//! and ends up in the outcome mapping; a [`JobError`] aborts the job and is
//! settled at the job boundary according to the acknowledgement policy.

use importer_common::CommonError;
use thiserror::Error;

use crate::strategy::ImportSummary;

/// Result type alias for per-file pipeline steps
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Result type alias for job-level operations
pub type JobResult<T> = std::result::Result<T, JobError>;

/// Failure of a single file within a job
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Checksum mismatch: expected {expected}, storage reported {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Storage error for {key}: {message}")]
    StorageIo { key: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Domain validation failed: {message}")]
    DomainValidation {
        message: String,
        /// Counts and row rejections when the strategy persisted the valid
        /// rows of the file
        partial: Option<ImportSummary>,
    },

    #[error("Domain store error: {message}")]
    Store {
        message: String,
        /// Counts for the rows persisted before the store failed
        partial: Option<ImportSummary>,
    },

    #[error("File processing panicked: {0}")]
    Panicked(String),
}

impl FileError {
    /// Stable snake_case tag used in notifications and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::StorageIo { .. } => "storage_io_error",
            Self::Decode(_) => "decode_error",
            Self::DomainValidation { .. } => "domain_validation_error",
            Self::Store { .. } => "store_error",
            Self::Panicked(_) => "panicked",
        }
    }

    pub fn storage(key: &str, err: impl std::fmt::Display) -> Self {
        Self::StorageIo {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::DomainValidation {
            message: message.into(),
            partial: None,
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store {
            message: err.to_string(),
            partial: None,
        }
    }

    /// Attach the counts of rows already persisted. Only strategy errors
    /// carry a summary; other kinds are returned unchanged.
    pub fn with_partial(self, summary: ImportSummary) -> Self {
        match self {
            Self::DomainValidation { message, .. } => Self::DomainValidation {
                message,
                partial: Some(summary),
            },
            Self::Store { message, .. } => Self::Store {
                message,
                partial: Some(summary),
            },
            other => other,
        }
    }

    /// Summary of rows persisted before the failure, if any
    pub fn partial(&self) -> Option<&ImportSummary> {
        match self {
            Self::DomainValidation { partial, .. } | Self::Store { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }
}

impl From<CommonError> for FileError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::ChecksumMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            },
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Job step that failed with an infrastructure error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Directory,
    Audit,
    Notification,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Audit => "audit",
            Self::Notification => "notification",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a whole job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("No import strategy registered for category '{0}'")]
    UnknownCategory(String),

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Job infrastructure error during {stage}: {cause:#}")]
    Infrastructure { stage: JobStage, cause: anyhow::Error },

    #[error("Job processing panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn infrastructure(stage: JobStage, cause: impl Into<anyhow::Error>) -> Self {
        Self::Infrastructure {
            stage,
            cause: cause.into(),
        }
    }

    /// Stable snake_case tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "unknown_category",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Infrastructure { .. } => "job_infrastructure_error",
            Self::Panicked(_) => "panicked",
        }
    }
}
