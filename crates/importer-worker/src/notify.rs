//! Job result notifications
//!
//! One [`MailJob`] per import job goes onto the mailer queue, which a separate
//! worker consumes. The importer never waits for the mail to be sent; at most
//! it waits for the queue to accept the message ([`DispatchMode::AwaitAck`]).

use anyhow::anyhow;
use apalis::prelude::TaskSink;
use apalis_postgres::PostgresStorage;
use async_trait::async_trait;
use importer_common::types::MAILER_QUEUE;
use importer_common::{ImportCategory, MailJob};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{JobError, JobResult, JobStage};
use crate::members::Member;
use crate::outcome::OutcomeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Spawn the enqueue and return immediately; failures are only logged
    #[default]
    FireAndForget,
    /// Wait for the queue to accept the message and fail the job otherwise
    AwaitAck,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fire_and_forget" | "fire-and-forget" => Ok(Self::FireAndForget),
            "await_ack" | "await-ack" => Ok(Self::AwaitAck),
            _ => Err(format!("Invalid dispatch mode: {}", s)),
        }
    }
}

/// One-way send onto the notification queue
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, mail: MailJob) -> anyhow::Result<()>;
}

/// Mailer queue backed by apalis PostgreSQL storage.
///
/// apalis keys the storage by message type, so every [`MailJob`] lands on
/// the one mailer queue.
#[derive(Clone)]
pub struct ApalisMailQueue {
    storage: PostgresStorage<MailJob>,
}

impl ApalisMailQueue {
    pub fn new(pool: &PgPool) -> Self {
        Self {
            storage: PostgresStorage::new(pool),
        }
    }
}

#[async_trait]
impl NotificationQueue for ApalisMailQueue {
    async fn enqueue(&self, mail: MailJob) -> anyhow::Result<()> {
        let mut storage = self.storage.clone();
        storage
            .push(mail)
            .await
            .map_err(|e| anyhow!("Failed to push mail job onto {}: {}", MAILER_QUEUE, e))?;
        Ok(())
    }
}

/// E-mail addresses of `members`, de-duplicated case-insensitively in
/// first-seen order. Members without an address are skipped.
pub fn recipient_emails<'a>(members: impl IntoIterator<Item = &'a Member>) -> Vec<String> {
    let mut seen = HashSet::new();

    members
        .into_iter()
        .filter_map(|m| m.email.as_deref())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .filter(|email| seen.insert(email.to_lowercase()))
        .map(str::to_string)
        .collect()
}

pub fn subject_for(category: &ImportCategory) -> String {
    format!("Import result ({})", category)
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    mode: DispatchMode,
}

impl NotificationDispatcher {
    pub fn new(queue: Arc<dyn NotificationQueue>, mode: DispatchMode) -> Self {
        Self { queue, mode }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Build the job summary message. The body is the JSON outcome mapping.
    pub fn compose(
        &self,
        app_id: &str,
        category: &ImportCategory,
        recipients: Vec<String>,
        outcomes: &OutcomeMap,
    ) -> JobResult<MailJob> {
        let body = serde_json::to_string(outcomes)
            .map_err(|e| JobError::infrastructure(JobStage::Notification, e))?;

        if recipients.is_empty() {
            warn!(app_id, "Import notification has no recipients");
        }

        Ok(MailJob::html(app_id, recipients, subject_for(category), &body))
    }

    pub async fn dispatch(&self, mail: MailJob) -> JobResult<()> {
        debug!(
            app_id = %mail.app_id,
            recipients = mail.to.len(),
            mode = ?self.mode,
            "Dispatching import notification"
        );

        match self.mode {
            DispatchMode::FireAndForget => {
                let queue = Arc::clone(&self.queue);
                tokio::spawn(async move {
                    let app_id = mail.app_id.clone();
                    if let Err(e) = queue.enqueue(mail).await {
                        error!(app_id = %app_id, error = %format!("{:#}", e), "Failed to enqueue import notification");
                    }
                });
                Ok(())
            },
            DispatchMode::AwaitAck => self
                .queue
                .enqueue(mail)
                .await
                .map_err(|e| JobError::infrastructure(JobStage::Notification, e)),
        }
    }
}
