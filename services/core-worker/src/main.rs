//! ember Core Worker
//!
//! Runs the actor manager with its notification loop and pending-location
//! sweep until interrupted.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ember_core_worker::{Config, CoreWorker};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        worker_id = %config.worker_id,
        node_id = %config.node_id,
        listen_addr = %config.listen_addr,
        "Starting ember core worker"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut worker = CoreWorker::in_memory(config);
    let tasks = worker.start(shutdown_rx)?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Signal shutdown to all loops
    let _ = shutdown_tx.send(true);

    if let Err(e) = tasks.join().await {
        error!(error = %e, "Worker loop failed during shutdown");
    }

    info!(
        handles = worker.manager().handle_count(),
        pending_locations = worker.manager().pending_location_count(),
        "Core worker shutdown complete"
    );
    Ok(())
}
