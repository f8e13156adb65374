//! Import job tasker
//!
//! Drives one [`ImportJob`] end to end:
//!
//! 1. resolve the category strategy (unknown categories abort the job)
//! 2. resolve the invoker and tenant admins as notification recipients
//! 3. per file: fetch, verify the integrity tag, decode, import, delete
//! 4. append one audit entry naming every file of the job
//! 5. enqueue one notification carrying the outcome of every file
//!
//! Errors and panics in step 3 are confined to the file's entry in the
//! outcome mapping. Everything else is a job-level [`JobError`].

use async_trait::async_trait;
use futures::FutureExt;
use importer_common::{FileInfo, ImportJob};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::{panic_message, TaskExit, Tasker, TaskerStats};
use crate::audit::{AuditRecorder, CreateAuditEntry};
use crate::decode::decode_rows;
use crate::error::{FileError, FileResult, JobError, JobResult, JobStage};
use crate::integrity::IntegrityValidator;
use crate::members::{MemberDirectory, ADMIN_ROLE};
use crate::notify::{recipient_emails, NotificationDispatcher};
use crate::outcome::{FileOutcome, OutcomeMap};
use crate::storage::ObjectStore;
use crate::strategy::{ImportStrategy, ImportSummary, StrategyRegistry};

pub struct ImporterTasker {
    objects: Arc<dyn ObjectStore>,
    directory: Arc<dyn MemberDirectory>,
    strategies: StrategyRegistry,
    audit: Arc<dyn AuditRecorder>,
    notifier: NotificationDispatcher,
    integrity: IntegrityValidator,
    admin_role: String,
    stats: TaskerStats,
}

impl ImporterTasker {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        directory: Arc<dyn MemberDirectory>,
        strategies: StrategyRegistry,
        audit: Arc<dyn AuditRecorder>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            objects,
            directory,
            strategies,
            audit,
            notifier,
            integrity: IntegrityValidator::default(),
            admin_role: ADMIN_ROLE.to_string(),
            stats: TaskerStats::default(),
        }
    }

    pub fn with_integrity(mut self, integrity: IntegrityValidator) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn with_admin_role(mut self, role: impl Into<String>) -> Self {
        self.admin_role = role.into();
        self
    }

    /// Process a job and return its outcome mapping.
    ///
    /// This is [`Tasker::run`] without the lifecycle scope.
    pub async fn process(&self, job: &ImportJob) -> JobResult<OutcomeMap> {
        job.validate()
            .map_err(|e| JobError::InvalidPayload(e.to_string()))?;

        let strategy = self.strategies.resolve(&job.category)?;
        let recipients = self.resolve_recipients(job).await?;

        let mut outcomes = OutcomeMap::new();
        for info in &job.file_infos {
            let outcome: FileOutcome =
                match AssertUnwindSafe(self.process_file(job, info, strategy.as_ref()))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result.into(),
                    Err(panic) => FileError::Panicked(panic_message(panic.as_ref())).into(),
                };

            match &outcome {
                FileOutcome::Success(summary) => debug!(
                    file = %info.file_name,
                    created = summary.created,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "File imported"
                ),
                FileOutcome::Failure { kind, message, .. } => warn!(
                    file = %info.file_name,
                    kind = %kind,
                    error = %message,
                    "File import failed"
                ),
            }

            if outcomes.insert(info.file_name.clone(), outcome).is_some() {
                warn!(file = %info.file_name, "Duplicate file name in job; keeping the later outcome");
            }
        }

        self.audit
            .record(CreateAuditEntry::upload(
                &job.app_id,
                &job.invoker_member_id,
                &job.file_names(),
            ))
            .await
            .map_err(|e| JobError::infrastructure(JobStage::Audit, e))?;

        let mail = self
            .notifier
            .compose(&job.app_id, &job.category, recipients, &outcomes)?;
        self.notifier.dispatch(mail).await?;

        let succeeded = outcomes.values().filter(|o| o.is_success()).count();
        info!(
            app_id = %job.app_id,
            files = job.file_infos.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "Import job processed"
        );

        Ok(outcomes)
    }

    /// E-mail addresses of the invoker followed by the tenant admins
    async fn resolve_recipients(&self, job: &ImportJob) -> JobResult<Vec<String>> {
        let invoker = self
            .directory
            .find_member(&job.app_id, &job.invoker_member_id)
            .await
            .map_err(|e| JobError::infrastructure(JobStage::Directory, e))?;

        if invoker.is_none() {
            warn!(
                app_id = %job.app_id,
                invoker = %job.invoker_member_id,
                "Invoking member not found; notifying admins only"
            );
        }

        let admins = self
            .directory
            .find_by_role(&job.app_id, &self.admin_role)
            .await
            .map_err(|e| JobError::infrastructure(JobStage::Directory, e))?;

        Ok(recipient_emails(invoker.iter().chain(admins.iter())))
    }

    #[instrument(skip(self, job, info, strategy), fields(app_id = %job.app_id, file = %info.file_name))]
    async fn process_file(
        &self,
        job: &ImportJob,
        info: &FileInfo,
        strategy: &dyn ImportStrategy,
    ) -> FileResult<ImportSummary> {
        let key = job.object_key(&info.file_name);
        if info.file_name.trim().is_empty() {
            return Err(FileError::storage(&key, "empty fileName"));
        }

        let object = self.objects.get(&key).await?;
        self.integrity.verify(&info.checksum, &object)?;

        let rows = decode_rows(object.content_type.as_deref(), &object.body)?;
        debug!(rows = rows.len(), content_type = ?object.content_type, "Decoded file");

        let summary = strategy.import(&job.app_id, rows).await?;

        if let Err(e) = self.objects.delete(&key).await {
            warn!(key = %key, error = %e, "Imported file could not be deleted from storage");
        }

        Ok(summary)
    }
}

#[async_trait]
impl Tasker for ImporterTasker {
    type Job = ImportJob;

    fn name(&self) -> &str {
        "importer"
    }

    fn stats(&self) -> &TaskerStats {
        &self.stats
    }

    fn pre_process(&self, job: &ImportJob) {
        info!(
            app_id = %job.app_id,
            invoker = %job.invoker_member_id,
            category = %job.category,
            files = job.file_infos.len(),
            "Processing import job"
        );
    }

    fn post_process(&self, exit: TaskExit, elapsed: Duration) {
        let stats = self.stats.snapshot();
        info!(
            exit = exit.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            processed = stats.processed,
            failed = stats.failed,
            "Import job finished"
        );
    }

    async fn run(&self, job: ImportJob) -> JobResult<()> {
        self.process(&job).await.map(|_| ())
    }
}
