//! Identifier types used by the runtime.

use crate::define_id;

// =============================================================================
// Cluster Membership
// =============================================================================

define_id!(
    /// A cluster node hosting one or more workers.
    NodeId,
    "node"
);
define_id!(
    /// A single worker process.
    WorkerId,
    "wrk"
);
define_id!(JobId, "job");

// =============================================================================
// Execution
// =============================================================================

define_id!(
    /// A remote actor. Assigned once at creation and never reused.
    ActorId,
    "actor"
);
define_id!(TaskId, "task");
define_id!(
    /// An object tracked by the reference counter.
    ObjectId,
    "obj"
);

impl ObjectId {
    /// Returns the id of the object produced by an actor's creation call.
    ///
    /// Derived from the actor id so every worker computes the same value
    /// without coordination.
    #[must_use]
    pub const fn for_actor_handle(actor_id: ActorId) -> Self {
        Self::from_ulid(actor_id.ulid())
    }
}

// =============================================================================
// Tests
// =============================================================================
