//! Domain import strategies
//!
//! A strategy takes the decoded rows of one file and persists them for a
//! tenant. Strategies are looked up by [`ImportCategory`] in a
//! [`StrategyRegistry`]; a category with no registered strategy is a job
//! error, never a silent no-op.

use async_trait::async_trait;
use importer_common::ImportCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::decode::Row;
use crate::error::{FileResult, JobError, JobResult};

pub mod member;

pub use member::MemberImportStrategy;

/// Upper bound on row rejections kept in a summary
pub const MAX_RECORDED_REJECTIONS: usize = 100;

/// A row the strategy refused to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based source line, counting the header line
    pub row: usize,
    pub reason: String,
}

/// Per-file import counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RowRejection>,
}

impl ImportSummary {
    pub fn record_created(&mut self) {
        self.created += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Count a rejected row, keeping its reason while under the cap
    pub fn reject(&mut self, row: usize, reason: impl Into<String>) {
        self.failed += 1;
        if self.rejections.len() < MAX_RECORDED_REJECTIONS {
            self.rejections.push(RowRejection {
                row,
                reason: reason.into(),
            });
        }
    }

    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.skipped + self.failed
    }

    pub fn has_rejections(&self) -> bool {
        self.failed > 0
    }
}

#[async_trait]
pub trait ImportStrategy: Send + Sync {
    /// Category this strategy handles
    fn category(&self) -> ImportCategory;

    /// Validate and persist `rows` for `app_id`.
    ///
    /// An error aborts only the file being imported.
    async fn import(&self, app_id: &str, rows: Vec<Row>) -> FileResult<ImportSummary>;
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<ImportCategory, Arc<dyn ImportStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own category, replacing any previous one
    pub fn register(&mut self, strategy: Arc<dyn ImportStrategy>) -> &mut Self {
        self.strategies.insert(strategy.category(), strategy);
        self
    }

    pub fn with(mut self, strategy: Arc<dyn ImportStrategy>) -> Self {
        self.register(strategy);
        self
    }

    pub fn resolve(&self, category: &ImportCategory) -> JobResult<Arc<dyn ImportStrategy>> {
        self.strategies
            .get(category)
            .cloned()
            .ok_or_else(|| JobError::UnknownCategory(category.to_string()))
    }

    pub fn categories(&self) -> Vec<&ImportCategory> {
        self.strategies.keys().collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
