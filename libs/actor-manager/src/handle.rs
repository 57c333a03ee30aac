//! Actor handles and the per-worker records the registry keeps for them.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use ember_id::{ActorId, JobId, NodeId, ObjectId, TaskId, WorkerId};
use serde::{Deserialize, Serialize};

use crate::collaborators::ActorState;

/// Network location of a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub worker_id: WorkerId,
    pub node_id: NodeId,
    pub ip_address: String,
    pub port: u16,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{} ({})",
            self.worker_id, self.ip_address, self.port, self.node_id
        )
    }
}

/// A handle to a remote actor as it arrives at this worker.
///
/// Handles come from an explicit creation call, from a named-actor lookup,
/// or embedded in a value passed between tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorHandle {
    pub actor_id: ActorId,

    /// Address of the worker that created the actor.
    pub owner_address: Address,

    pub job_id: JobId,

    /// Cluster-wide name, for named actors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Detached actors outlive their creating worker.
    #[serde(default)]
    pub is_detached: bool,
}

impl ActorHandle {
    /// Id of the object returned by the actor creation call.
    pub fn creation_return_id(&self) -> ObjectId {
        ObjectId::for_actor_handle(self.actor_id)
    }
}

/// Provenance of a registration, kept for debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    pub caller_id: TaskId,
    pub call_site: String,
    pub caller_address: Address,
}

/// The registry's record for one actor on this worker.
///
/// Only the registry constructs or removes these. Everyone else sees them
/// through a borrowed guard from [`crate::ActorManager::get_actor_handle`].
#[derive(Debug)]
pub struct ActorHandleState {
    handle: ActorHandle,
    is_owner_handle: bool,
    caller: CallerInfo,
    creation_return_id: ObjectId,
    registered_at: DateTime<Utc>,

    /// Next sequence number for tasks submitted through this handle.
    task_counter: AtomicU64,

    last_state: Option<ActorState>,
    dead: bool,
}

impl ActorHandleState {
    pub(crate) fn new(handle: ActorHandle, is_owner_handle: bool, caller: CallerInfo) -> Self {
        let creation_return_id = handle.creation_return_id();
        Self {
            handle,
            is_owner_handle,
            caller,
            creation_return_id,
            registered_at: Utc::now(),
            task_counter: AtomicU64::new(0),
            last_state: None,
            dead: false,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.handle.actor_id
    }

    pub fn handle(&self) -> &ActorHandle {
        &self.handle
    }

    pub fn owner_address(&self) -> &Address {
        &self.handle.owner_address
    }

    /// True if this worker created the actor and must eventually tell it
    /// to terminate.
    pub fn is_owner_handle(&self) -> bool {
        self.is_owner_handle
    }

    pub fn caller(&self) -> &CallerInfo {
        &self.caller
    }

    pub fn creation_return_id(&self) -> ObjectId {
        self.creation_return_id
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Latest state published by the control store, if any arrived yet.
    pub fn last_state(&self) -> Option<ActorState> {
        self.last_state
    }

    /// True once the actor's creation was forced to fail.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Reserves the next task sequence number.
    ///
    /// Strictly increasing per handle and independent of the registry lock,
    /// so a read guard is enough to submit.
    pub fn next_task_sequence(&self) -> u64 {
        self.task_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn set_last_state(&mut self, state: ActorState) {
        self.last_state = Some(state);
    }

    pub(crate) fn mark_dead(&mut self) {
        self.dead = true;
    }
}
