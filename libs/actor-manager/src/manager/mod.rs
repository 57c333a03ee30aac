//! The actor manager: one lock, three concerns.
//!
//! - `registry`: which actor handles this worker holds
//! - `out_of_scope`: callbacks fired when no reference to an actor remains
//! - `pending`: owner-created actors whose location has not reached the
//!   control store yet
//!
//! All mutable state lives in a single [`ManagerState`] behind one
//! `RwLock`. No collaborator is ever called with the lock held.

mod out_of_scope;
mod pending;
mod registry;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ember_id::ActorId;
use parking_lot::RwLock;

use crate::collaborators::{ControlStore, ReferenceCounter, TaskSubmitter};
use crate::handle::{ActorHandleState, Address};

pub use out_of_scope::OutOfScopeCallback;
pub use pending::SweepOutcome;

/// Pending-location phase of an owner-created actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingLocation {
    /// Waiting for the control store to publish anything about the actor.
    Waiting,
    /// The owner was found dead; the disconnect has not been acknowledged yet.
    Disconnecting,
}

#[derive(Default)]
pub(crate) struct ManagerState {
    pub(crate) handles: HashMap<ActorId, ActorHandleState>,
    pub(crate) out_of_scope_callbacks: HashMap<ActorId, OutOfScopeCallback>,
    /// Actors whose creation result has had zero references at least once.
    pub(crate) out_of_scope: HashSet<ActorId>,
    pub(crate) pending_locations: HashMap<ActorId, PendingLocation>,
    /// Actors whose control-store subscription failed; retried by the sweep.
    pub(crate) unsubscribed: HashSet<ActorId>,
}

/// Tracks the actor handles held by one worker.
pub struct ActorManager {
    /// Address of the worker this manager belongs to.
    worker_address: Address,

    reference_counter: Arc<dyn ReferenceCounter>,
    control_store: Arc<dyn ControlStore>,
    task_submitter: Arc<dyn TaskSubmitter>,

    state: Arc<RwLock<ManagerState>>,

    /// Serializes pending-location sweeps.
    sweep_guard: tokio::sync::Mutex<()>,
}

impl ActorManager {
    /// Create a manager for the worker at `worker_address`.
    pub fn new(
        worker_address: Address,
        reference_counter: Arc<dyn ReferenceCounter>,
        control_store: Arc<dyn ControlStore>,
        task_submitter: Arc<dyn TaskSubmitter>,
    ) -> Self {
        Self {
            worker_address,
            reference_counter,
            control_store,
            task_submitter,
            state: Arc::new(RwLock::new(ManagerState::default())),
            sweep_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn worker_address(&self) -> &Address {
        &self.worker_address
    }
}

impl std::fmt::Debug for ActorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ActorManager")
            .field("worker_address", &self.worker_address)
            .field("handles", &state.handles.len())
            .field("out_of_scope_callbacks", &state.out_of_scope_callbacks.len())
            .field("pending_locations", &state.pending_locations.len())
            .finish()
    }
}
