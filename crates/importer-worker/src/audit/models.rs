//! Audit data models

use serde::{Deserialize, Serialize};

/// Actions recorded in the member audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Upload,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating an audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    pub app_id: String,
    /// Members who performed the action
    pub member_ids: Vec<String>,
    /// What the action was performed on, e.g. the joined file names of an import
    pub target: String,
    pub action: AuditAction,
}

impl CreateAuditEntry {
    /// Entry for an import job: the invoker uploaded the listed files
    pub fn upload(app_id: &str, invoker: &str, file_names: &[&str]) -> Self {
        Self {
            app_id: app_id.to_string(),
            member_ids: vec![invoker.to_string()],
            target: join_file_names(file_names),
            action: AuditAction::Upload,
        }
    }
}

/// File names in their original order, separated by `", "`
pub fn join_file_names(file_names: &[&str]) -> String {
    file_names.join(", ")
}
