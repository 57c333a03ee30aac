//! Out-of-scope notification.
//!
//! When an actor's handle is added, the manager installs a hook on the
//! reference counter for the actor's creation result. The hook marks the
//! actor out of scope and fires whatever callback is waiting, once.

use std::sync::{Arc, Weak};

use ember_id::ActorId;
use parking_lot::RwLock;
use tracing::debug;

use super::{ActorManager, ManagerState};
use crate::collaborators::ReferenceZeroCallback;

/// Called with the actor's id once no references to it remain.
pub type OutOfScopeCallback = Box<dyn FnOnce(ActorId) + Send + Sync>;

impl ActorManager {
    /// Run `callback` once no live reference to the actor remains.
    ///
    /// Fires synchronously from this call if the actor is already out of
    /// scope, or if this worker holds no handle to it. A callback that is
    /// still waiting is replaced.
    pub fn wait_for_actor_out_of_scope<F>(&self, actor_id: ActorId, callback: F)
    where
        F: FnOnce(ActorId) + Send + Sync + 'static,
    {
        let fire_now = {
            let mut state = self.state.write();
            if !state.handles.contains_key(&actor_id) || state.out_of_scope.contains(&actor_id) {
                Some(callback)
            } else {
                let replaced = state
                    .out_of_scope_callbacks
                    .insert(actor_id, Box::new(callback))
                    .is_some();
                debug!(actor_id = %actor_id, replaced, "Waiting for actor to go out of scope");
                None
            }
        };

        if let Some(callback) = fire_now {
            debug!(actor_id = %actor_id, "Actor already out of scope");
            callback(actor_id);
        }
    }
}

/// Builds the reference-counter hook for `actor_id`.
///
/// Holds the state weakly: a hook that outlives the manager does nothing.
pub(super) fn out_of_scope_hook(
    state: &Arc<RwLock<ManagerState>>,
    actor_id: ActorId,
) -> ReferenceZeroCallback {
    let state: Weak<RwLock<ManagerState>> = Arc::downgrade(state);
    Box::new(move || {
        if let Some(state) = state.upgrade() {
            fire_out_of_scope(&state, actor_id);
        }
    })
}

/// Marks the actor out of scope and runs the waiting callback, if any.
pub(super) fn fire_out_of_scope(state: &RwLock<ManagerState>, actor_id: ActorId) {
    let callback = {
        let mut state = state.write();
        let first = state.out_of_scope.insert(actor_id);
        if first {
            debug!(actor_id = %actor_id, "Actor went out of scope");
        }
        state.out_of_scope_callbacks.remove(&actor_id)
    };

    if let Some(callback) = callback {
        callback(actor_id);
    }
}
