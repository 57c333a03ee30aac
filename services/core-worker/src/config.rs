//! Configuration for the core worker.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use ember_actor_manager::Address;
use ember_id::{NodeId, WorkerId};

/// Core worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of this worker process.
    pub worker_id: WorkerId,

    /// Node hosting this worker.
    pub node_id: NodeId,

    /// Address other workers use to reach this one.
    pub listen_addr: SocketAddr,

    /// How often pending-location actors are checked for a dead owner.
    pub pending_sweep_interval: Duration,

    /// Capacity of the control-store notification channel.
    pub notification_buffer: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::new(),
            node_id: NodeId::new(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            pending_sweep_interval: Duration::from_millis(1000),
            notification_buffer: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        // Worker and node IDs can be provided or auto-generated
        let worker_id = std::env::var("EMBER_WORKER_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.worker_id);

        let node_id = std::env::var("EMBER_NODE_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.node_id);

        let listen_addr = match std::env::var("EMBER_WORKER_ADDR") {
            Ok(s) => s
                .parse()
                .with_context(|| format!("invalid EMBER_WORKER_ADDR: {s}"))?,
            Err(_) => defaults.listen_addr,
        };

        let pending_sweep_interval = millis_from_env("EMBER_PENDING_SWEEP_INTERVAL_MS")
            .unwrap_or(defaults.pending_sweep_interval);

        let notification_buffer = std::env::var("EMBER_NOTIFICATION_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.notification_buffer);

        let log_level = std::env::var("EMBER_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            worker_id,
            node_id,
            listen_addr,
            pending_sweep_interval,
            notification_buffer,
            log_level,
        })
    }

    /// This worker's address as recorded in the actor handles it creates.
    pub fn worker_address(&self) -> Address {
        Address {
            worker_id: self.worker_id,
            node_id: self.node_id,
            ip_address: self.listen_addr.ip().to_string(),
            port: self.listen_addr.port(),
        }
    }
}

/// A positive millisecond duration from `name`. Zero and garbage are ignored.
fn millis_from_env(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|ms: &u64| *ms > 0)
        .map(Duration::from_millis)
}
