//! Tasker lifecycle
//!
//! A [`Tasker`] processes one kind of queued job. [`execute`] wraps every
//! invocation in a [`TaskScope`]: the pre-hook runs on entry and the post-hook
//! runs from `Drop`, so teardown happens on completion, on error, on panic and
//! when the processing future is dropped mid-flight. The job-level result is
//! then settled against the configured [`AckPolicy`].

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{JobError, JobResult};

pub mod importer;
pub mod scheduler;

pub use importer::ImporterTasker;

/// What the queue is told when a job fails at the job level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Log job-level errors and report the job as processed
    #[default]
    AlwaysAck,
    /// Report job-level errors to the queue so it can redeliver the job
    AckOnlyOnFullSuccess,
}

impl AckPolicy {
    /// Map a job result to what is returned to the queue
    pub fn settle(&self, tasker: &str, result: JobResult<()>) -> JobResult<()> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match self {
            Self::AlwaysAck => {
                error!(
                    tasker,
                    kind = err.kind(),
                    error = %err,
                    "Job failed; acknowledging without redelivery"
                );
                Ok(())
            },
            Self::AckOnlyOnFullSuccess => {
                warn!(
                    tasker,
                    kind = err.kind(),
                    error = %err,
                    "Job failed; returning error to the queue"
                );
                Err(err)
            },
        }
    }
}

impl FromStr for AckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always_ack" | "always-ack" => Ok(Self::AlwaysAck),
            "ack_only_on_full_success" | "ack-only-on-full-success" => {
                Ok(Self::AckOnlyOnFullSuccess)
            },
            _ => Err(format!("Invalid ack policy: {}", s)),
        }
    }
}

/// Counters maintained by [`TaskScope`]
#[derive(Debug, Default)]
pub struct TaskerStats {
    in_flight: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`TaskerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskerStatsSnapshot {
    pub in_flight: u64,
    pub processed: u64,
    pub failed: u64,
}

impl TaskerStats {
    pub fn snapshot(&self) -> TaskerStatsSnapshot {
        TaskerStatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// How a job invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    Completed,
    Failed,
    /// Panicked or dropped before finishing
    Abandoned,
}

impl TaskExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }
}

#[async_trait]
pub trait Tasker: Send + Sync {
    type Job: Send + 'static;

    fn name(&self) -> &str;

    fn stats(&self) -> &TaskerStats;

    /// Runs before [`Tasker::run`]
    fn pre_process(&self, _job: &Self::Job) {
        debug!(tasker = self.name(), "Job started");
    }

    /// Runs after [`Tasker::run`] on every exit path
    fn post_process(&self, exit: TaskExit, elapsed: Duration) {
        info!(
            tasker = self.name(),
            exit = exit.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Job finished"
        );
    }

    async fn run(&self, job: Self::Job) -> JobResult<()>;
}

/// Guard pairing [`Tasker::pre_process`] with [`Tasker::post_process`]
pub struct TaskScope<'a, T: Tasker + ?Sized> {
    tasker: &'a T,
    started: Instant,
    exit: TaskExit,
}

impl<'a, T: Tasker + ?Sized> TaskScope<'a, T> {
    pub fn enter(tasker: &'a T, job: &T::Job) -> Self {
        tasker.stats().in_flight.fetch_add(1, Ordering::Relaxed);
        tasker.pre_process(job);

        Self {
            tasker,
            started: Instant::now(),
            exit: TaskExit::Abandoned,
        }
    }

    pub fn finish(&mut self, result: &JobResult<()>) {
        self.exit = match result {
            Ok(()) => TaskExit::Completed,
            Err(_) => TaskExit::Failed,
        };
    }
}

impl<T: Tasker + ?Sized> Drop for TaskScope<'_, T> {
    fn drop(&mut self) {
        let stats = self.tasker.stats();
        stats.in_flight.fetch_sub(1, Ordering::Relaxed);
        match self.exit {
            TaskExit::Completed => stats.processed.fetch_add(1, Ordering::Relaxed),
            TaskExit::Failed | TaskExit::Abandoned => stats.failed.fetch_add(1, Ordering::Relaxed),
        };

        self.tasker.post_process(self.exit, self.started.elapsed());
    }
}

/// Run one job through `tasker` inside a [`TaskScope`] and settle the result.
///
/// Panics inside [`Tasker::run`] become [`JobError::Panicked`].
pub async fn execute<T: Tasker + ?Sized>(
    tasker: &T,
    policy: AckPolicy,
    job: T::Job,
) -> JobResult<()> {
    let result = {
        let mut scope = TaskScope::enter(tasker, &job);
        let result = match AssertUnwindSafe(tasker.run(job)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
        };
        scope.finish(&result);
        result
    };

    policy.settle(tasker.name(), result)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
