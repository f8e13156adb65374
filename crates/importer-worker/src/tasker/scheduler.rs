//! Job scheduler
//!
//! Registers the importer tasker as an apalis worker over PostgreSQL storage.

use anyhow::{anyhow, Result};
use apalis::prelude::*;
use apalis_postgres::PostgresStorage;
use importer_common::types::IMPORTER_QUEUE;
use importer_common::ImportJob;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{execute, AckPolicy, ImporterTasker};
use crate::error::JobResult;

/// Shared state handed to every job invocation
pub struct WorkerContext {
    tasker: Arc<ImporterTasker>,
    ack_policy: AckPolicy,
    /// Held for the whole job: a worker instance processes one job at a time
    gate: Mutex<()>,
}

impl WorkerContext {
    pub fn new(tasker: Arc<ImporterTasker>, ack_policy: AckPolicy) -> Self {
        Self {
            tasker,
            ack_policy,
            gate: Mutex::new(()),
        }
    }

    pub async fn handle(&self, job: ImportJob) -> JobResult<()> {
        let _gate = self.gate.lock().await;
        execute(self.tasker.as_ref(), self.ack_policy, job).await
    }
}

/// Job scheduler
pub struct JobScheduler {
    worker_name: String,
    db: PgPool,
    context: Arc<WorkerContext>,
}

impl JobScheduler {
    pub fn new(worker_name: impl Into<String>, db: PgPool, context: WorkerContext) -> Self {
        Self {
            worker_name: worker_name.into(),
            db,
            context: Arc::new(context),
        }
    }

    /// Start the worker monitor in a background task
    pub async fn start(self) -> Result<JoinHandle<()>> {
        info!(worker = %self.worker_name, queue = IMPORTER_QUEUE, "Starting job scheduler");

        let storage = importer_storage(&self.db);
        let context = self.context;
        let worker_name = self.worker_name;

        let handle = tokio::spawn(async move {
            info!("Job worker started");
            if let Err(e) = Monitor::new()
                .register(move |_index| {
                    WorkerBuilder::new(&worker_name)
                        .backend(storage.clone())
                        .data(context.clone())
                        .build(process_import_job)
                })
                .run()
                .await
            {
                error!("Job worker error: {:?}", e);
            }
            info!("Job worker stopped");
        });

        Ok(handle)
    }
}

/// apalis storage for the importer queue
pub fn importer_storage(db: &PgPool) -> PostgresStorage<ImportJob> {
    PostgresStorage::new(db)
}

/// Push one job onto the importer queue
pub async fn enqueue_import_job(db: &PgPool, job: ImportJob) -> Result<()> {
    job.validate()?;

    let mut storage = importer_storage(db);
    storage
        .push(job)
        .await
        .map_err(|e| anyhow!("Failed to push import job: {}", e))?;

    Ok(())
}

async fn process_import_job(
    job: ImportJob,
    context: Data<Arc<WorkerContext>>,
) -> std::result::Result<(), BoxDynError> {
    context.handle(job).await?;
    Ok(())
}
