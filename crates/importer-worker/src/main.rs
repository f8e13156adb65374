//! Importer Worker - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use importer_common::logging::{init_logging, LogConfig, LogLevel};
use importer_common::{ImportCategory, ImportJob};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use importer_worker::{
    audit::PgAuditRecorder,
    config::Config,
    integrity::IntegrityValidator,
    members::PgMemberRepository,
    notify::{ApalisMailQueue, NotificationDispatcher},
    storage::Storage,
    strategy::{MemberImportStrategy, StrategyRegistry},
    tasker::{
        scheduler::{enqueue_import_job, JobScheduler, WorkerContext},
        ImporterTasker,
    },
};

#[derive(Parser, Debug)]
#[command(name = "importer-worker")]
#[command(author, version, about = "Bulk-import queue worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process import jobs until interrupted (default)
    Run,

    /// Push one import job onto the importer queue
    Enqueue {
        /// Tenant identifier
        #[arg(long)]
        app_id: String,

        /// Member the import is performed for
        #[arg(long)]
        invoker: String,

        /// Import category
        #[arg(long, default_value = "member")]
        category: String,

        /// Uploaded file as <name>=<checksum>; repeatable
        #[arg(long = "file", value_parser = parse_file_arg)]
        files: Vec<(String, String)>,
    },
}

fn parse_file_arg(value: &str) -> std::result::Result<(String, String), String> {
    match value.rsplit_once('=') {
        Some((name, checksum)) if !name.is_empty() && !checksum.is_empty() => {
            Ok((name.to_string(), checksum.to_string()))
        },
        _ => Err(format!("expected <name>=<checksum>, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("importer-worker")
        .filter_directives("importer_worker=debug,sqlx=warn,aws_config=warn")
        .build()
        .merge_env()?;

    init_logging(&log_config)?;

    let config = Config::load()?;

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.connect_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    info!("Database connection pool established");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, db_pool).await,
        Command::Enqueue {
            app_id,
            invoker,
            category,
            files,
        } => {
            let job = files.into_iter().fold(
                ImportJob::new(app_id, invoker, ImportCategory::from(category)),
                |job, (name, checksum)| job.with_file(checksum, name),
            );
            if job.file_infos.is_empty() {
                warn!("Enqueuing an import job without files");
            }

            enqueue_import_job(&db_pool, job).await?;
            info!("Import job enqueued");
            Ok(())
        },
    }
}

async fn run(config: Config, db_pool: sqlx::PgPool) -> Result<()> {
    info!(worker = %config.worker.name, "Starting importer worker");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;

    apalis_postgres::PostgresStorage::setup(&db_pool)
        .await
        .context("Failed to set up job queue storage")?;

    info!("Database migrations completed");

    let storage = Storage::new(config.storage.clone()).await?;
    let members = Arc::new(PgMemberRepository::new(db_pool.clone()));

    let strategies = StrategyRegistry::new().with(Arc::new(MemberImportStrategy::new(members.clone())));

    let notifier = NotificationDispatcher::new(
        Arc::new(ApalisMailQueue::new(&db_pool)),
        config.worker.dispatch_mode,
    );

    let tasker = ImporterTasker::new(
        Arc::new(storage),
        members,
        strategies,
        Arc::new(PgAuditRecorder::new(db_pool.clone())),
        notifier,
    )
    .with_integrity(IntegrityValidator::new(config.worker.verify_content_digest))
    .with_admin_role(config.worker.admin_role.clone());

    let context = WorkerContext::new(Arc::new(tasker), config.worker.ack_policy);
    let mut handle = JobScheduler::new(config.worker.name.clone(), db_pool, context)
        .start()
        .await?;

    tokio::select! {
        result = &mut handle => {
            if let Err(e) = result {
                warn!("Job worker task ended unexpectedly: {}", e);
            }
        },
        _ = shutdown_signal() => {
            handle.abort();
        },
    }

    info!("Importer worker shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
