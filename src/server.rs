//! Process startup: logging, stores and the worker pool run loop.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mediaqueue_config::{Config, ConfigLoader, DatabaseConfig, LoggingConfig};
use mediaqueue_workqueue::{
    ConfigurationStore, JobQueue, JobRegistry, MemoryQueueStore, QueueStore, SqliteQueueStore,
    WorkerPoolManager, WorkerSettings,
};

/// Initialize tracing with console and, when enabled, daily-rotated file output.
pub(crate) fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = if config.file {
        let log_dir = ConfigLoader::expand_path(&config.directory);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("mediaqueue")
            .filename_suffix("log")
            .max_log_files(30)
            .build(&log_dir)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The writer flushes on drop of the guard, so keep it for the process lifetime.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Both store views of one backing database.
pub(crate) struct Stores {
    pub queue: Arc<dyn QueueStore>,
    pub settings: Arc<dyn ConfigurationStore>,
}

/// Open the configured store.
pub(crate) async fn open_stores(config: &DatabaseConfig) -> anyhow::Result<Stores> {
    if config.in_memory {
        warn!("Using in-memory queue store; jobs will not survive a restart");
        let store = Arc::new(MemoryQueueStore::new());
        return Ok(Stores {
            queue: store.clone(),
            settings: store,
        });
    }

    let path = ConfigLoader::expand_path(&config.path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    let store = Arc::new(
        SqliteQueueStore::open(&path)
            .await
            .with_context(|| format!("opening queue database {}", path.display()))?,
    );
    info!("Queue database: {}", path.display());
    Ok(Stores {
        queue: store.clone(),
        settings: store,
    })
}

/// Build the job queue for the configured store.
pub(crate) fn job_queue(config: &Config, stores: &Stores) -> Arc<JobQueue> {
    Arc::new(JobQueue::with_config(
        stores.queue.clone(),
        &config.queue,
        &config.retry,
    ))
}

/// Run the worker pools until Ctrl-C, then stop them gracefully.
///
/// Fails before touching the store when `registry` is empty.
pub(crate) async fn run_server(config: Config, registry: JobRegistry) -> anyhow::Result<()> {
    info!("Starting mediaqueue v{}", env!("CARGO_PKG_VERSION"));

    if registry.job_types().is_empty() {
        anyhow::bail!(
            "no job types registered; refusing to start workers that would dead-letter every job"
        );
    }
    info!(job_types = ?registry.job_types(), "Registered job types");

    let stores = open_stores(&config.database).await?;
    let queue = job_queue(&config, &stores);

    let manager = WorkerPoolManager::new(
        queue,
        Arc::new(registry),
        stores.settings.clone(),
        &config.queues,
        WorkerSettings::from(&config.worker),
    );

    manager.initialize().await?;
    for name in manager.queue_names() {
        info!(
            queue = %name,
            workers = manager.worker_count(&name),
            "Queue online"
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    manager.shutdown().await;
    stores.queue.save_changes().await?;
    info!("mediaqueue stopped");
    Ok(())
}
