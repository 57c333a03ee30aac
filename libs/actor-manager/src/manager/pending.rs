//! Pending-location resolution.
//!
//! An owner-created actor starts `Waiting` until the control store publishes
//! anything about it. Two things can end the wait:
//!
//! - a control-store notification (resolved)
//! - a sweep finding the owner dead (forced failure)
//!
//! The choice between them is made under the lock. A notification only
//! resolves a `Waiting` entry; the sweep only claims a `Waiting` entry by
//! moving it to `Disconnecting`. Whichever runs first wins and the other
//! becomes a no-op.

use ember_id::ActorId;
use tracing::{debug, error, info, warn};

use super::{ActorManager, PendingLocation};
use crate::collaborators::{ActorStateData, DisconnectReason};
use crate::handle::Address;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Pending actors examined.
    pub checked: usize,
    /// Actors disconnected because their owner died.
    pub forced_failures: usize,
    /// Actors left for the next sweep because a collaborator was unreachable.
    pub deferred: usize,
    /// Failed control-store subscriptions that succeeded on retry.
    pub resubscribed: usize,
    /// True if another sweep was already running and this one did nothing.
    pub skipped: bool,
}

impl ActorManager {
    /// Handle a state notification from the control store.
    ///
    /// Any published state proves the control store knows the actor, so a
    /// waiting entry resolves regardless of the state value.
    pub fn handle_actor_state_notification(&self, data: &ActorStateData) {
        let actor_id = data.actor_id;
        let mut state = self.state.write();

        if let Some(record) = state.handles.get_mut(&actor_id) {
            record.set_last_state(data.state);
        }

        match state.pending_locations.get(&actor_id).copied() {
            Some(PendingLocation::Waiting) => {
                state.pending_locations.remove(&actor_id);
                info!(
                    actor_id = %actor_id,
                    state = %data.state,
                    "Actor location resolved"
                );
            }
            Some(PendingLocation::Disconnecting) => {
                debug!(
                    actor_id = %actor_id,
                    state = %data.state,
                    "Ignoring notification for actor already being failed"
                );
            }
            None => {
                debug!(actor_id = %actor_id, state = %data.state, "Actor state notification");
            }
        }
    }

    /// Fail pending actors whose owner has died.
    ///
    /// Meant to be driven by a periodic timer. Liveness checks and
    /// disconnects run outside the lock; an unreachable collaborator defers
    /// that actor to the next sweep. A disconnect the submitter rejects is
    /// not retried: the actor is failed locally.
    ///
    /// Subscriptions that failed when a handle was added are retried first.
    pub async fn mark_pending_location_actors_failed(&self) -> SweepOutcome {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            debug!("Pending-location sweep already running, skipping");
            return SweepOutcome {
                skipped: true,
                ..SweepOutcome::default()
            };
        };

        let resubscribed = self.retry_failed_subscriptions();

        let candidates: Vec<(ActorId, PendingLocation, Address)> = {
            let state = self.state.read();
            state
                .pending_locations
                .iter()
                .filter_map(|(actor_id, phase)| {
                    state
                        .handles
                        .get(actor_id)
                        .map(|record| (*actor_id, *phase, record.owner_address().clone()))
                })
                .collect()
        };

        let mut outcome = SweepOutcome {
            checked: candidates.len(),
            resubscribed,
            ..SweepOutcome::default()
        };

        for (actor_id, phase, owner) in candidates {
            if phase == PendingLocation::Waiting {
                match self.control_store.is_worker_alive(&owner).await {
                    Ok(true) => continue,
                    Ok(false) => {
                        if !self.begin_forced_failure(actor_id) {
                            continue;
                        }
                    }
                    Err(e) => {
                        warn!(
                            actor_id = %actor_id,
                            owner = %owner,
                            error = %e,
                            "Owner liveness check failed, deferring"
                        );
                        outcome.deferred += 1;
                        continue;
                    }
                }
            }

            if self.disconnect_pending_location_actor(actor_id, &owner).await {
                outcome.forced_failures += 1;
            } else {
                outcome.deferred += 1;
            }
        }

        outcome
    }

    /// Whether the actor is still waiting for its location.
    pub fn is_actor_location_pending(&self, actor_id: ActorId) -> bool {
        self.state.read().pending_locations.contains_key(&actor_id)
    }

    /// Number of actors whose location is still unresolved.
    pub fn pending_location_count(&self) -> usize {
        self.state.read().pending_locations.len()
    }

    /// Claim a waiting entry for forced failure.
    ///
    /// Returns false if a notification resolved it since the sweep looked.
    fn begin_forced_failure(&self, actor_id: ActorId) -> bool {
        let mut state = self.state.write();
        match state.pending_locations.get_mut(&actor_id) {
            Some(phase) if *phase == PendingLocation::Waiting => {
                *phase = PendingLocation::Disconnecting;
                true
            }
            _ => false,
        }
    }

    async fn disconnect_pending_location_actor(&self, actor_id: ActorId, owner: &Address) -> bool {
        let reason = DisconnectReason::OwnerDied {
            owner_worker_id: owner.worker_id,
        };

        match self.task_submitter.disconnect_actor(actor_id, reason).await {
            Ok(()) => {
                warn!(
                    actor_id = %actor_id,
                    owner = %owner,
                    "Owner died before actor location was published, actor creation failed"
                );
            }
            Err(e) if e.is_unavailable() => {
                warn!(
                    actor_id = %actor_id,
                    error = %e,
                    "Failed to disconnect actor with dead owner, retrying next sweep"
                );
                return false;
            }
            Err(e) => {
                error!(
                    actor_id = %actor_id,
                    owner = %owner,
                    error = %e,
                    "Disconnect of actor with dead owner rejected, failing actor locally"
                );
            }
        }

        let mut state = self.state.write();
        state.pending_locations.remove(&actor_id);
        if let Some(record) = state.handles.get_mut(&actor_id) {
            record.mark_dead();
        }
        true
    }

    /// Re-subscribe actors whose subscription failed when their handle was
    /// added. Returns how many succeeded.
    fn retry_failed_subscriptions(&self) -> usize {
        let actor_ids: Vec<ActorId> = self.state.read().unsubscribed.iter().copied().collect();

        let mut resubscribed = 0;
        for actor_id in actor_ids {
            match self.control_store.subscribe_actor(actor_id) {
                Ok(()) => {
                    self.state.write().unsubscribed.remove(&actor_id);
                    debug!(actor_id = %actor_id, "Subscribed to actor updates on retry");
                    resubscribed += 1;
                }
                Err(e) => {
                    debug!(actor_id = %actor_id, error = %e, "Subscription retry failed");
                }
            }
        }
        resubscribed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock, Weak};

    use async_trait::async_trait;
    use ember_id::{ActorId, WorkerId};
    use rstest::rstest;

    use crate::collaborators::{ActorState, ActorStateData, ControlStore, DisconnectReason};
    use crate::error::CollaboratorError;
    use crate::handle::test_support::{address, caller, handle_owned_by};
    use crate::handle::Address;
    use crate::manager::test_support::{fixture, Fixture};
    use crate::manager::{ActorManager, PendingLocation, SweepOutcome};
    use crate::mock::{InMemoryReferenceCounter, RecordingTaskSubmitter};
    use crate::ActorHandle;

    /// Control store that publishes the watched actor's state while the
    /// sweep is asking about its owner, then reports the owner dead.
    #[derive(Default)]
    struct PublishesDuringLivenessCheck {
        watched: OnceLock<(Weak<ActorManager>, ActorId)>,
    }

    #[async_trait]
    impl ControlStore for PublishesDuringLivenessCheck {
        fn subscribe_actor(&self, _actor_id: ActorId) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn is_worker_alive(&self, _address: &Address) -> Result<bool, CollaboratorError> {
            if let Some((manager, actor_id)) = self.watched.get() {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_actor_state_notification(&ActorStateData::new(
                        *actor_id,
                        ActorState::Alive,
                    ));
                }
            }
            Ok(false)
        }

        async fn get_named_actor(
            &self,
            _name: &str,
        ) -> Result<Option<ActorHandle>, CollaboratorError> {
            Ok(None)
        }
    }

    fn owned_actor(f: &Fixture) -> ActorHandle {
        let handle = handle_owned_by(&f.worker);
        assert!(f
            .manager
            .add_new_actor_handle(handle.clone(), caller(&f.worker), false));
        handle
    }

    #[rstest]
    #[case(ActorState::DependenciesUnready)]
    #[case(ActorState::PendingCreation)]
    #[case(ActorState::Alive)]
    #[case(ActorState::Restarting)]
    #[case(ActorState::Dead)]
    fn test_any_notification_resolves(#[case] published: ActorState) {
        let f = fixture();
        let handle = owned_actor(&f);
        assert!(f.manager.is_actor_location_pending(handle.actor_id));

        f.manager
            .handle_actor_state_notification(&ActorStateData::new(handle.actor_id, published));

        assert!(!f.manager.is_actor_location_pending(handle.actor_id));
        assert_eq!(
            f.manager
                .get_actor_handle(handle.actor_id)
                .unwrap()
                .last_state(),
            Some(published)
        );
    }

    #[test]
    fn test_detached_owner_handle_never_pending() {
        let f = fixture();
        let handle = handle_owned_by(&f.worker);

        f.manager
            .add_new_actor_handle(handle.clone(), caller(&f.worker), true);

        assert!(f.manager.check_actor_handle_exists(handle.actor_id));
        assert!(!f.manager.is_actor_location_pending(handle.actor_id));
    }

    #[tokio::test]
    async fn test_sweep_keeps_actor_with_live_owner() {
        let f = fixture();
        let handle = owned_actor(&f);

        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(
            outcome,
            SweepOutcome {
                checked: 1,
                ..SweepOutcome::default()
            }
        );
        assert!(f.manager.is_actor_location_pending(handle.actor_id));
        assert_eq!(f.submitter.disconnect_count(handle.actor_id), 0);
    }

    #[tokio::test]
    async fn test_sweep_fails_actor_with_dead_owner() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);

        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.forced_failures, 1);
        assert!(!f.manager.is_actor_location_pending(handle.actor_id));
        assert_eq!(
            f.submitter.disconnects(),
            vec![(
                handle.actor_id,
                DisconnectReason::OwnerDied {
                    owner_worker_id: f.worker.worker_id
                }
            )]
        );
        // The record stays as a tombstone.
        assert!(f.manager.get_actor_handle(handle.actor_id).unwrap().is_dead());
    }

    #[tokio::test]
    async fn test_second_sweep_is_noop() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);

        f.manager.mark_pending_location_actors_failed().await;
        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(f.submitter.disconnect_count(handle.actor_id), 1);
    }

    #[tokio::test]
    async fn test_notification_before_sweep_prevents_failure() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);

        f.manager.handle_actor_state_notification(&ActorStateData::new(
            handle.actor_id,
            ActorState::PendingCreation,
        ));
        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.checked, 0);
        assert_eq!(f.submitter.disconnect_count(handle.actor_id), 0);
        assert!(!f.manager.get_actor_handle(handle.actor_id).unwrap().is_dead());
    }

    #[tokio::test]
    async fn test_liveness_unavailable_defers() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);
        f.control_store.set_unavailable(true);

        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome.deferred, 1);
        assert!(f.manager.is_actor_location_pending(handle.actor_id));

        f.control_store.set_unavailable(false);
        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome.forced_failures, 1);
        assert_eq!(f.submitter.disconnect_count(handle.actor_id), 1);
    }

    #[tokio::test]
    async fn test_failed_disconnect_retried_without_resolving() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);
        f.submitter.set_unavailable(true);

        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome.deferred, 1);
        assert_eq!(
            f.manager.state.read().pending_locations.get(&handle.actor_id),
            Some(&PendingLocation::Disconnecting)
        );

        // Forced failure is already committed; a late notification cannot resolve it.
        f.manager.handle_actor_state_notification(&ActorStateData::new(
            handle.actor_id,
            ActorState::Alive,
        ));
        assert!(f.manager.is_actor_location_pending(handle.actor_id));

        f.submitter.set_unavailable(false);
        let queries = f.control_store.liveness_queries();
        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome.forced_failures, 1);
        // Owner death was already established, no second liveness query.
        assert_eq!(f.control_store.liveness_queries(), queries);
        assert!(!f.manager.is_actor_location_pending(handle.actor_id));
    }

    #[tokio::test]
    async fn test_sweep_skips_resolved_and_non_owner_actors() {
        let f = fixture();
        let resolved = owned_actor(&f);
        let unresolved = owned_actor(&f);
        let borrowed = handle_owned_by(&address(WorkerId::new()));
        f.manager
            .register_actor_handle(borrowed.clone(), None, caller(&f.worker));

        f.manager.handle_actor_state_notification(&ActorStateData::new(
            resolved.actor_id,
            ActorState::Alive,
        ));
        f.control_store.mark_worker_dead(f.worker.worker_id);
        f.control_store.mark_worker_dead(borrowed.owner_address.worker_id);
        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.checked, 1);
        assert_eq!(outcome.forced_failures, 1);
        assert_eq!(f.submitter.disconnect_count(resolved.actor_id), 0);
        assert_eq!(f.submitter.disconnect_count(unresolved.actor_id), 1);
        assert_eq!(f.submitter.disconnect_count(borrowed.actor_id), 0);
        assert_eq!(f.manager.pending_location_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sweep_skipped() {
        let f = fixture();
        owned_actor(&f);

        let _held = f.manager.sweep_guard.lock().await;
        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert!(outcome.skipped);
        assert_eq!(outcome.checked, 0);
    }

    #[tokio::test]
    async fn test_notification_during_liveness_check_wins() {
        let worker = address(WorkerId::new());
        let control_store = Arc::new(PublishesDuringLivenessCheck::default());
        let submitter = Arc::new(RecordingTaskSubmitter::new());
        let manager = Arc::new(ActorManager::new(
            worker.clone(),
            Arc::new(InMemoryReferenceCounter::new()),
            control_store.clone(),
            submitter.clone(),
        ));

        let handle = handle_owned_by(&worker);
        manager.add_new_actor_handle(handle.clone(), caller(&worker), false);
        assert!(control_store
            .watched
            .set((Arc::downgrade(&manager), handle.actor_id))
            .is_ok());

        let outcome = manager.mark_pending_location_actors_failed().await;

        assert_eq!(
            outcome,
            SweepOutcome {
                checked: 1,
                ..SweepOutcome::default()
            }
        );
        assert_eq!(submitter.disconnect_count(handle.actor_id), 0);
        assert!(!manager.is_actor_location_pending(handle.actor_id));

        let record = manager.get_actor_handle(handle.actor_id).unwrap();
        assert!(!record.is_dead());
        assert_eq!(record.last_state(), Some(ActorState::Alive));
    }

    #[tokio::test]
    async fn test_rejected_disconnect_fails_actor_without_retry() {
        let f = fixture();
        let handle = owned_actor(&f);
        f.control_store.mark_worker_dead(f.worker.worker_id);
        f.submitter.set_rejecting(true);

        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.forced_failures, 1);
        assert_eq!(outcome.deferred, 0);
        assert!(!f.manager.is_actor_location_pending(handle.actor_id));
        assert!(f.manager.get_actor_handle(handle.actor_id).unwrap().is_dead());

        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(f.submitter.rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_sweep_retries_failed_subscription() {
        let f = fixture();
        f.control_store.set_unavailable(true);
        let handle = owned_actor(&f);
        assert!(!f.control_store.is_subscribed(handle.actor_id));

        f.control_store.set_unavailable(false);
        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.resubscribed, 1);
        assert!(f.control_store.is_subscribed(handle.actor_id));
        assert!(f.manager.is_actor_location_pending(handle.actor_id));

        let outcome = f.manager.mark_pending_location_actors_failed().await;
        assert_eq!(outcome.resubscribed, 0);
    }

    #[tokio::test]
    async fn test_subscription_retry_waits_for_store() {
        let f = fixture();
        f.control_store.set_unavailable(true);
        let handle = owned_actor(&f);

        let outcome = f.manager.mark_pending_location_actors_failed().await;

        assert_eq!(outcome.resubscribed, 0);
        assert_eq!(outcome.deferred, 1);
        assert!(!f.control_store.is_subscribed(handle.actor_id));
        assert!(f.manager.state.read().unsubscribed.contains(&handle.actor_id));
    }
}
