//! Periodic driver for the pending-location sweep.
//!
//! Control-store propagation is asynchronous relative to local actor
//! creation. Without this loop a worker whose owner died between creation
//! and publish would wait forever for a location that never arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::manager::ActorManager;

/// Shortest period the sweep runs at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Run the sweep every `interval` until shutdown.
///
/// An interval below [`MIN_SWEEP_INTERVAL`] is raised to it.
pub async fn run_pending_location_sweep(
    manager: Arc<ActorManager>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if interval < MIN_SWEEP_INTERVAL {
        warn!(
            interval_ms = interval.as_millis() as u64,
            "Sweep interval too short, using minimum"
        );
    }
    let interval = interval.max(MIN_SWEEP_INTERVAL);

    info!(
        interval_ms = interval.as_millis() as u64,
        "Starting pending-location sweep"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = manager.mark_pending_location_actors_failed().await;
                if outcome.forced_failures > 0 || outcome.deferred > 0 || outcome.resubscribed > 0 {
                    info!(
                        checked = outcome.checked,
                        forced_failures = outcome.forced_failures,
                        deferred = outcome.deferred,
                        resubscribed = outcome.resubscribed,
                        "Pending-location sweep finished"
                    );
                } else {
                    debug!(checked = outcome.checked, skipped = outcome.skipped, "Pending-location sweep finished");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Pending-location sweep shutting down");
                    break;
                }
            }
        }
    }
}
