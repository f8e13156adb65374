//! Member audit trail
//!
//! The importer appends exactly one entry per job, after every file has been
//! attempted. There is no read path here.
//!
//! ```no_run
//! use importer_worker::audit::{AuditRecorder, CreateAuditEntry, PgAuditRecorder};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> anyhow::Result<()> {
//! let recorder = PgAuditRecorder::new(pool);
//! recorder
//!     .record(CreateAuditEntry::upload("t1", "u1", &["a.csv", "b.csv"]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

mod models;

pub use models::{join_file_names, AuditAction, CreateAuditEntry};

#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, entry: CreateAuditEntry) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgAuditRecorder {
    pool: PgPool,
}

impl PgAuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRecorder for PgAuditRecorder {
    async fn record(&self, entry: CreateAuditEntry) -> anyhow::Result<()> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO member_audit_log (app_id, member_ids, target, action)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&entry.app_id)
        .bind(&entry.member_ids)
        .bind(&entry.target)
        .bind(entry.action.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert member audit entry")?;

        debug!(
            audit_id = %id,
            app_id = %entry.app_id,
            action = %entry.action,
            target = %entry.target,
            "Created audit log entry"
        );

        Ok(())
    }
}
