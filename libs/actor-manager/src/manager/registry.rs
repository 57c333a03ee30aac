//! Actor handle registry.
//!
//! At most one record exists per actor. The first registration wins; later
//! ones are dropped after their id has been read, which makes duplicate
//! delivery of the same handle harmless.

use ember_id::{ActorId, ObjectId};
use parking_lot::{MappedRwLockReadGuard, RwLockReadGuard};
use tracing::{debug, info, warn};

use super::out_of_scope::out_of_scope_hook;
use super::{ActorManager, PendingLocation};
use crate::error::{ActorManagerError, ActorManagerResult};
use crate::handle::{ActorHandle, ActorHandleState, CallerInfo};

impl ActorManager {
    /// Register a handle received indirectly, e.g. inside a task argument.
    ///
    /// Always a non-owner registration. When the handle was found inside
    /// another object, the reference counter learns that `containing_object_id`
    /// holds a reference to the actor's creation result.
    pub fn register_actor_handle(
        &self,
        handle: ActorHandle,
        containing_object_id: Option<ObjectId>,
        caller: CallerInfo,
    ) -> ActorId {
        let actor_id = handle.actor_id;

        if let Some(outer_id) = containing_object_id {
            self.reference_counter.add_nested_reference(
                outer_id,
                handle.creation_return_id(),
                &handle.owner_address,
            );
        }

        let is_detached = handle.is_detached;
        self.add_actor_handle(handle, false, is_detached, caller);
        actor_id
    }

    /// Give this worker a handle it acquired directly.
    ///
    /// Used both for actors this worker just created and for named-actor
    /// lookups through the control store. A lookup counts as a new handle
    /// even when this worker created the actor, since the lookup path skips
    /// normal reference propagation.
    ///
    /// Returns false if a handle for the actor was already held.
    pub fn add_new_actor_handle(
        &self,
        handle: ActorHandle,
        caller: CallerInfo,
        is_detached: bool,
    ) -> bool {
        let is_owner_handle = handle.owner_address.worker_id == self.worker_address.worker_id;
        self.add_actor_handle(handle, is_owner_handle, is_detached, caller)
    }

    fn add_actor_handle(
        &self,
        handle: ActorHandle,
        is_owner_handle: bool,
        is_detached: bool,
        caller: CallerInfo,
    ) -> bool {
        let actor_id = handle.actor_id;
        let creation_return_id = handle.creation_return_id();
        let track_location = is_owner_handle && !is_detached;

        {
            let mut state = self.state.write();
            if state.handles.contains_key(&actor_id) {
                debug!(actor_id = %actor_id, "Actor handle already registered");
                return false;
            }

            state.handles.insert(
                actor_id,
                ActorHandleState::new(handle, is_owner_handle, caller),
            );
            if track_location {
                state
                    .pending_locations
                    .insert(actor_id, PendingLocation::Waiting);
            }
        }

        info!(
            actor_id = %actor_id,
            is_owner_handle,
            is_detached,
            pending_location = track_location,
            "Added actor handle"
        );

        self.reference_counter
            .add_dependency(creation_return_id, actor_id);
        let hook = out_of_scope_hook(&self.state, actor_id);
        if !self
            .reference_counter
            .add_reference_zero_callback(creation_return_id, hook)
        {
            super::out_of_scope::fire_out_of_scope(&self.state, actor_id);
        }

        self.task_submitter.add_actor_queue_if_not_exists(actor_id);

        if let Err(e) = self.control_store.subscribe_actor(actor_id) {
            warn!(
                actor_id = %actor_id,
                error = %e,
                "Failed to subscribe to actor updates, retrying next sweep"
            );
            self.state.write().unsubscribed.insert(actor_id);
        }

        true
    }

    /// Resolve a named actor through the control store and hold a handle to it.
    pub async fn get_named_actor_handle(
        &self,
        name: &str,
        caller: CallerInfo,
    ) -> ActorManagerResult<ActorId> {
        let handle = self
            .control_store
            .get_named_actor(name)
            .await?
            .ok_or_else(|| ActorManagerError::NamedActorNotFound(name.to_string()))?;

        let actor_id = handle.actor_id;
        self.add_new_actor_handle(handle, caller, true);
        Ok(actor_id)
    }

    /// Borrow the record for `actor_id`.
    ///
    /// The guard holds the registry's read lock: use it for the current
    /// operation only and drop it before calling back into the manager.
    pub fn get_actor_handle(
        &self,
        actor_id: ActorId,
    ) -> ActorManagerResult<MappedRwLockReadGuard<'_, ActorHandleState>> {
        RwLockReadGuard::try_map(self.state.read(), |state| state.handles.get(&actor_id))
            .map_err(|_| ActorManagerError::NotFound(actor_id))
    }

    pub fn check_actor_handle_exists(&self, actor_id: ActorId) -> bool {
        self.state.read().handles.contains_key(&actor_id)
    }

    /// Creation-return ids of every handle held, for debugging.
    pub fn actor_handle_ids(&self) -> Vec<ObjectId> {
        self.state
            .read()
            .handles
            .values()
            .map(ActorHandleState::creation_return_id)
            .collect()
    }

    pub fn handle_count(&self) -> usize {
        self.state.read().handles.len()
    }
}
