//! Delivery of control-store actor notifications into the manager.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::collaborators::ActorStateData;
use crate::manager::ActorManager;

/// Feed notifications from the subscription channel into the manager until
/// shutdown or until the channel closes.
pub async fn run_notification_loop(
    manager: Arc<ActorManager>,
    mut notifications: mpsc::Receiver<ActorStateData>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting actor notification loop");
    let mut delivered = 0u64;

    loop {
        tokio::select! {
            msg = notifications.recv() => {
                match msg {
                    Some(data) => {
                        delivered += 1;
                        manager.handle_actor_state_notification(&data);
                    }
                    None => {
                        debug!("Actor notification channel closed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Actor notification loop shutting down");
                    break;
                }
            }
        }
    }

    info!(delivered, "Actor notification loop stopped");
}
