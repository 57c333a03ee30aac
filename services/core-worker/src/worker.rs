//! Wiring of the actor manager to its collaborators and background loops.

use std::sync::Arc;

use anyhow::{bail, Result};
use ember_actor_manager::mock::{
    InMemoryControlStore, InMemoryReferenceCounter, RecordingTaskSubmitter,
};
use ember_actor_manager::{
    run_notification_loop, run_pending_location_sweep, ActorManager, ActorStateData,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;

/// Background tasks started by [`CoreWorker::start`].
pub struct WorkerTasks {
    pub sweep: JoinHandle<()>,
    pub notifications: JoinHandle<()>,
}

impl WorkerTasks {
    /// Wait for both loops to exit.
    pub async fn join(self) -> Result<()> {
        self.sweep.await?;
        self.notifications.await?;
        Ok(())
    }
}

/// A worker process's actor lifecycle machinery.
pub struct CoreWorker {
    config: Config,
    manager: Arc<ActorManager>,
    control_store: Arc<InMemoryControlStore>,
    references: Arc<InMemoryReferenceCounter>,
    submitter: Arc<RecordingTaskSubmitter>,
    notifications: Option<mpsc::Receiver<ActorStateData>>,
}

impl CoreWorker {
    /// Build a worker backed by in-memory collaborators.
    pub fn in_memory(config: Config) -> Self {
        let (tx, rx) = mpsc::channel(config.notification_buffer);
        let control_store = Arc::new(InMemoryControlStore::with_feed(tx));
        let references = Arc::new(InMemoryReferenceCounter::new());
        let submitter = Arc::new(RecordingTaskSubmitter::new());

        let manager = Arc::new(ActorManager::new(
            config.worker_address(),
            references.clone(),
            control_store.clone(),
            submitter.clone(),
        ));

        Self {
            config,
            manager,
            control_store,
            references,
            submitter,
            notifications: Some(rx),
        }
    }

    pub fn manager(&self) -> &Arc<ActorManager> {
        &self.manager
    }

    pub fn control_store(&self) -> &Arc<InMemoryControlStore> {
        &self.control_store
    }

    pub fn references(&self) -> &Arc<InMemoryReferenceCounter> {
        &self.references
    }

    pub fn submitter(&self) -> &Arc<RecordingTaskSubmitter> {
        &self.submitter
    }

    /// Spawn the notification loop and the pending-location sweep.
    ///
    /// Fails if the worker was already started.
    pub fn start(&mut self, shutdown: watch::Receiver<bool>) -> Result<WorkerTasks> {
        let Some(notifications) = self.notifications.take() else {
            bail!("core worker already started");
        };

        info!(
            worker_id = %self.config.worker_id,
            sweep_interval_ms = self.config.pending_sweep_interval.as_millis() as u64,
            "Starting core worker loops"
        );

        let notifications = tokio::spawn(run_notification_loop(
            Arc::clone(&self.manager),
            notifications,
            shutdown.clone(),
        ));
        let sweep = tokio::spawn(run_pending_location_sweep(
            Arc::clone(&self.manager),
            self.config.pending_sweep_interval,
            shutdown,
        ));

        Ok(WorkerTasks {
            sweep,
            notifications,
        })
    }
}
