//! Queue message types shared by the enqueuing side and the worker
//!
//! Field names on the wire are camelCase to stay compatible with producers
//! outside this workspace.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

/// Logical name of the importer job queue
pub const IMPORTER_QUEUE: &str = "importer";

/// Logical name of the notification (mailer) queue
pub const MAILER_QUEUE: &str = "mailer";

// ============================================================================
// Import Jobs
// ============================================================================

/// Category of an import job, selecting the domain import strategy.
///
/// Any string deserializes; strings without a known variant become
/// [`ImportCategory::Other`] so the worker can report them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImportCategory {
    Member,
    Other(String),
}

impl ImportCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Member => "member",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ImportCategory {
    fn from(value: String) -> Self {
        match value.as_str() {
            "member" => Self::Member,
            _ => Self::Other(value),
        }
    }
}

impl From<ImportCategory> for String {
    fn from(value: ImportCategory) -> Self {
        match value {
            ImportCategory::Member => "member".to_string(),
            ImportCategory::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for ImportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One uploaded file referenced by an import job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Checksum declared by the uploader, compared against the storage tag
    #[serde(alias = "checksumETag")]
    pub checksum: String,
    /// File name relative to the tenant prefix in object storage
    pub file_name: String,
}

impl FileInfo {
    pub fn new(checksum: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            file_name: file_name.into(),
        }
    }
}

/// Import job payload
///
/// Immutable once enqueued. The worker may see the same job more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    /// Tenant identifier
    pub app_id: String,
    /// Member who triggered the import
    pub invoker_member_id: String,
    /// Which domain import strategy handles the files
    pub category: ImportCategory,
    /// Files to import, in upload order
    #[serde(default)]
    pub file_infos: Vec<FileInfo>,
}

impl ImportJob {
    /// Create a new import job with no files
    pub fn new(
        app_id: impl Into<String>,
        invoker_member_id: impl Into<String>,
        category: ImportCategory,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            invoker_member_id: invoker_member_id.into(),
            category,
            file_infos: Vec::new(),
        }
    }

    /// Append a file to the job
    pub fn with_file(mut self, checksum: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.file_infos.push(FileInfo::new(checksum, file_name));
        self
    }

    /// Object key for a file of this job: `{appId}/{fileName}`
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.app_id, file_name)
    }

    /// File names in job order
    pub fn file_names(&self) -> Vec<&str> {
        self.file_infos.iter().map(|f| f.file_name.as_str()).collect()
    }

    /// Reject payloads the worker can never process.
    ///
    /// File entries are not checked here; a bad entry fails only that file.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(CommonError::InvalidJob("appId is empty".to_string()));
        }
        if self.invoker_member_id.trim().is_empty() {
            return Err(CommonError::InvalidJob("invokerMemberId is empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Mail Jobs
// ============================================================================

/// Notification message consumed by the mailer worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailJob {
    pub app_id: String,
    /// Recipient e-mail addresses
    pub to: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// HTML body
    pub content: String,
}

impl MailJob {
    /// Build a message whose body wraps `body` in a minimal HTML document
    pub fn html(
        app_id: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        body: &str,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            to,
            subject: subject.into(),
            cc: Vec::new(),
            bcc: Vec::new(),
            content: format!("<html>\n  <body>\n    {}\n  </body>\n</html>", body),
        }
    }
}
