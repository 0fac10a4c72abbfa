//! taskq daemon - Main Entry Point
//! Drains one admission queue and completes tasks as their workflows exit.

mod config;
mod logging;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use config::DaemonConfig;
use taskq_core::application::{shutdown_channel, AdmissionController, CreateQueueRequest, Dispatcher};
use taskq_core::domain::QueueId;
use taskq_core::port::id_provider::UuidProvider;
use taskq_core::port::time_provider::SystemTimeProvider;
use taskq_core::port::QueueFilter;
use taskq_infra_sqlite::{create_pool, run_migrations, SqliteQueueStore};
use taskq_infra_system::SubprocessLauncher;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init(&config.log_format, config.log_dir.as_deref())?;

    info!("taskq daemon v{} starting...", VERSION);

    // 2. Database
    if let Some(parent) = Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path, "Initializing database...");

    let pool = create_pool(&config.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Wiring
    let id_provider = Arc::new(UuidProvider);
    let time_provider = Arc::new(SystemTimeProvider);
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();

    let launcher = SubprocessLauncher::new(
        id_provider.clone(),
        time_provider.clone(),
        config.env_allowlist.clone(),
        config.api_url.clone(),
    )
    .with_exit_notifier(exit_tx);

    let controller = Arc::new(AdmissionController::new(
        Arc::new(SqliteQueueStore::new(pool.clone())),
        Arc::new(launcher),
        id_provider,
        time_provider,
    ));

    // 4. Queue this daemon drives
    let queue_id = ensure_queue(&controller, &config).await?;

    // 5. Dispatcher
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let dispatcher = Dispatcher::new(queue_id.clone(), config.owner.clone(), controller)
        .with_drain_limit(config.drain_limit)
        .with_poll_interval(config.poll_interval);

    let dispatcher_handle = tokio::spawn(async move {
        if let Err(e) = dispatcher.run(shutdown_rx, exit_rx).await {
            error!(error = ?e, "Dispatcher failed");
        }
    });

    info!(queue_id = %queue_id, queue = %config.queue_name, "System ready. Waiting for tasks...");
    info!("Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, dispatcher_handle)
        .await
        .is_err()
    {
        error!("Dispatcher did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}

/// Look up the configured queue by owner and name, creating it on first start
async fn ensure_queue(controller: &AdmissionController, config: &DaemonConfig) -> Result<QueueId> {
    let filter = QueueFilter::by_owner_and_name(config.owner.clone(), config.queue_name.clone());
    if let Some(queue) = controller.find(&filter).await?.into_iter().next() {
        let mismatches = config.mismatches(&queue);
        if !mismatches.is_empty() {
            warn!(
                queue_id = %queue.id,
                mismatches = ?mismatches,
                "Existing queue keeps its stored settings; configuration differs"
            );
        }
        info!(
            queue_id = %queue.id,
            running = queue.running_count,
            pending = queue.pending.len(),
            "Resuming existing queue"
        );
        return Ok(queue.id);
    }

    let queue_id = controller
        .create(CreateQueueRequest {
            name: config.queue_name.clone(),
            owner: config.owner.clone(),
            discipline: config.discipline,
            max_concurrent: config.max_concurrent,
            max_pending: config.max_pending,
        })
        .await
        .context("Failed to create queue")?;
    info!(queue_id = %queue_id, discipline = %config.discipline, "Created queue");
    Ok(queue_id)
}
