//! Interfaces to the services the actor manager depends on.
//!
//! - `ReferenceCounter`: live-reference tracking for actor creation results
//! - `ControlStore`: cluster-wide actor metadata with per-actor pub/sub
//! - `TaskSubmitter`: direct task submission to actors
//!
//! Reference counter calls are synchronous bookkeeping. Control store
//! queries and disconnects may block on the network and are async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ember_id::{ActorId, ObjectId, WorkerId};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::handle::{ActorHandle, Address};

// =============================================================================
// Reference Counter
// =============================================================================

/// Invoked by the reference counter when an object's count reaches zero.
///
/// May be invoked more than once if the count rises and drops again.
pub type ReferenceZeroCallback = Box<dyn Fn() + Send + Sync>;

/// Distributed reference counting.
pub trait ReferenceCounter: Send + Sync {
    /// Track `object_id` as a dependency whose sole consumer is the actor record.
    fn add_dependency(&self, object_id: ObjectId, actor_id: ActorId);

    /// Record that `outer_id` holds a reference to `inner_id`.
    fn add_nested_reference(&self, outer_id: ObjectId, inner_id: ObjectId, owner: &Address);

    /// Register a callback for when `object_id` has no live references.
    ///
    /// Returns false without registering if the count is already zero.
    fn add_reference_zero_callback(&self, object_id: ObjectId, callback: ReferenceZeroCallback)
        -> bool;
}

// =============================================================================
// Control Store
// =============================================================================

/// Lifecycle state of an actor as published by the control store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    /// The creation task is waiting on its arguments.
    DependenciesUnready,
    /// Scheduled but not yet running.
    PendingCreation,
    Alive,
    Restarting,
    Dead,
}

impl ActorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependenciesUnready => "dependencies_unready",
            Self::PendingCreation => "pending_creation",
            Self::Alive => "alive",
            Self::Restarting => "restarting",
            Self::Dead => "dead",
        }
    }
}

impl std::fmt::Display for ActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition published on an actor's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStateData {
    pub actor_id: ActorId,
    pub state: ActorState,

    /// Where the actor runs, once it has been placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    pub published_at: DateTime<Utc>,
}

impl ActorStateData {
    pub fn new(actor_id: ActorId, state: ActorState) -> Self {
        Self {
            actor_id,
            state,
            address: None,
            published_at: Utc::now(),
        }
    }
}

/// Client for the cluster control store.
#[async_trait]
pub trait ControlStore: Send + Sync {
    /// Subscribe to the actor's channel.
    ///
    /// Notifications are delivered out of band (see
    /// [`crate::run_notification_loop`]); this call only registers interest
    /// and must not block.
    fn subscribe_actor(&self, actor_id: ActorId) -> Result<(), CollaboratorError>;

    /// Whether the worker at `address` is still alive.
    async fn is_worker_alive(&self, address: &Address) -> Result<bool, CollaboratorError>;

    /// Look up a named actor.
    async fn get_named_actor(&self, name: &str) -> Result<Option<ActorHandle>, CollaboratorError>;
}

// =============================================================================
// Task Submitter
// =============================================================================

/// Why an actor is being disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The creating worker died before the actor's location was published.
    OwnerDied { owner_worker_id: WorkerId },
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerDied { owner_worker_id } => write!(
                f,
                "owner {owner_worker_id} died before the actor location was published"
            ),
        }
    }
}

/// Submits tasks directly to actors.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    /// Create the actor's submit queue if it does not exist yet.
    fn add_actor_queue_if_not_exists(&self, actor_id: ActorId);

    /// Treat the actor's creation as permanently failed and fail queued tasks.
    async fn disconnect_actor(
        &self,
        actor_id: ActorId,
        reason: DisconnectReason,
    ) -> Result<(), CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_state_serialization() {
        let json = serde_json::to_string(&ActorState::PendingCreation).unwrap();
        assert_eq!(json, "\"pending_creation\"");
        assert_eq!(ActorState::Dead.to_string(), "dead");
    }

    #[test]
    fn test_disconnect_reason_names_owner() {
        let owner_worker_id = WorkerId::new();
        let reason = DisconnectReason::OwnerDied { owner_worker_id };
        assert!(reason.to_string().contains(&owner_worker_id.to_string()));
    }
}
