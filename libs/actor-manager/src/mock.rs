//! In-memory collaborators for tests and local development.
//!
//! None of these talk to the network. They keep just enough state to
//! behave like the real services and to let tests assert on the calls the
//! manager made.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ember_id::{ActorId, ObjectId, WorkerId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::collaborators::{
    ActorStateData, ControlStore, DisconnectReason, ReferenceCounter, ReferenceZeroCallback,
    TaskSubmitter,
};
use crate::error::CollaboratorError;
use crate::handle::{ActorHandle, Address};

// =============================================================================
// Reference Counter
// =============================================================================

#[derive(Default)]
struct ReferenceTable {
    counts: HashMap<ObjectId, usize>,
    zero_callbacks: HashMap<ObjectId, Vec<Arc<dyn Fn() + Send + Sync>>>,
    nested: Vec<(ObjectId, ObjectId)>,
}

/// Reference counter keeping local counts only.
///
/// Zero callbacks stay registered and run every time a count drops to zero.
#[derive(Default)]
pub struct InMemoryReferenceCounter {
    table: Mutex<ReferenceTable>,
}

impl InMemoryReferenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local_reference(&self, object_id: ObjectId) {
        *self.table.lock().counts.entry(object_id).or_insert(0) += 1;
    }

    /// Drop one reference, running zero callbacks if none remain.
    pub fn remove_reference(&self, object_id: ObjectId) {
        let callbacks = {
            let mut table = self.table.lock();
            let Some(count) = table.counts.get_mut(&object_id) else {
                warn!(object_id = %object_id, "Removing reference to untracked object");
                return;
            };
            *count = count.saturating_sub(1);
            if *count > 0 {
                return;
            }
            table
                .zero_callbacks
                .get(&object_id)
                .cloned()
                .unwrap_or_default()
        };

        debug!(object_id = %object_id, callbacks = callbacks.len(), "Reference count reached zero");
        for callback in callbacks {
            callback();
        }
    }

    pub fn reference_count(&self, object_id: ObjectId) -> usize {
        self.table
            .lock()
            .counts
            .get(&object_id)
            .copied()
            .unwrap_or(0)
    }

    /// `(outer, inner)` pairs recorded through `add_nested_reference`.
    pub fn nested_references(&self) -> Vec<(ObjectId, ObjectId)> {
        self.table.lock().nested.clone()
    }
}

impl ReferenceCounter for InMemoryReferenceCounter {
    fn add_dependency(&self, object_id: ObjectId, actor_id: ActorId) {
        debug!(object_id = %object_id, actor_id = %actor_id, "Tracking actor creation result");
        self.add_local_reference(object_id);
    }

    fn add_nested_reference(&self, outer_id: ObjectId, inner_id: ObjectId, _owner: &Address) {
        self.table.lock().nested.push((outer_id, inner_id));
    }

    fn add_reference_zero_callback(
        &self,
        object_id: ObjectId,
        callback: ReferenceZeroCallback,
    ) -> bool {
        let mut table = self.table.lock();
        if table.counts.get(&object_id).copied().unwrap_or(0) == 0 {
            return false;
        }
        table
            .zero_callbacks
            .entry(object_id)
            .or_default()
            .push(Arc::from(callback));
        true
    }
}

// =============================================================================
// Control Store
// =============================================================================

/// Control store holding subscriptions, worker liveness and named actors.
///
/// With a feed attached, [`InMemoryControlStore::publish`] delivers
/// notifications for subscribed actors into the channel, as the real
/// subscription client does.
#[derive(Default)]
pub struct InMemoryControlStore {
    subscriptions: Mutex<HashSet<ActorId>>,
    dead_workers: Mutex<HashSet<WorkerId>>,
    named_actors: Mutex<HashMap<String, ActorHandle>>,
    feed: Option<mpsc::Sender<ActorStateData>>,
    unavailable: AtomicBool,
    liveness_queries: AtomicUsize,
}

impl InMemoryControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that delivers published notifications into `feed`.
    pub fn with_feed(feed: mpsc::Sender<ActorStateData>) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    pub fn mark_worker_dead(&self, worker_id: WorkerId) {
        info!(worker_id = %worker_id, "Marking worker dead");
        self.dead_workers.lock().insert(worker_id);
    }

    /// Make every query fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn register_named_actor(&self, name: impl Into<String>, handle: ActorHandle) {
        self.named_actors.lock().insert(name.into(), handle);
    }

    pub fn is_subscribed(&self, actor_id: ActorId) -> bool {
        self.subscriptions.lock().contains(&actor_id)
    }

    pub fn liveness_queries(&self) -> usize {
        self.liveness_queries.load(Ordering::SeqCst)
    }

    /// Publish a state change. Returns true if it was delivered to the feed.
    pub fn publish(&self, data: ActorStateData) -> bool {
        if !self.is_subscribed(data.actor_id) {
            return false;
        }
        let Some(feed) = &self.feed else {
            return false;
        };
        match feed.try_send(data) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Dropping actor notification");
                false
            }
        }
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(
                "control store",
                "in-memory store marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlStore for InMemoryControlStore {
    fn subscribe_actor(&self, actor_id: ActorId) -> Result<(), CollaboratorError> {
        self.check_available()?;
        self.subscriptions.lock().insert(actor_id);
        Ok(())
    }

    async fn is_worker_alive(&self, address: &Address) -> Result<bool, CollaboratorError> {
        self.liveness_queries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(!self.dead_workers.lock().contains(&address.worker_id))
    }

    async fn get_named_actor(&self, name: &str) -> Result<Option<ActorHandle>, CollaboratorError> {
        self.check_available()?;
        Ok(self.named_actors.lock().get(name).cloned())
    }
}

// =============================================================================
// Task Submitter
// =============================================================================

/// Task submitter that records queue creation and disconnects.
#[derive(Default)]
pub struct RecordingTaskSubmitter {
    queues: Mutex<HashSet<ActorId>>,
    disconnects: Mutex<Vec<(ActorId, DisconnectReason)>>,
    unavailable: AtomicBool,
    rejecting: AtomicBool,
    rejected: AtomicUsize,
}

impl RecordingTaskSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make disconnects fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make disconnects fail with `Rejected`.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Disconnects refused while rejecting.
    pub fn rejected_count(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn has_queue(&self, actor_id: ActorId) -> bool {
        self.queues.lock().contains(&actor_id)
    }

    /// Successful disconnects, in call order.
    pub fn disconnects(&self) -> Vec<(ActorId, DisconnectReason)> {
        self.disconnects.lock().clone()
    }

    pub fn disconnect_count(&self, actor_id: ActorId) -> usize {
        self.disconnects
            .lock()
            .iter()
            .filter(|(id, _)| *id == actor_id)
            .count()
    }
}

#[async_trait]
impl TaskSubmitter for RecordingTaskSubmitter {
    fn add_actor_queue_if_not_exists(&self, actor_id: ActorId) {
        self.queues.lock().insert(actor_id);
    }

    async fn disconnect_actor(
        &self,
        actor_id: ActorId,
        reason: DisconnectReason,
    ) -> Result<(), CollaboratorError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(
                "task submitter",
                "in-memory submitter marked unavailable",
            ));
        }
        if self.rejecting.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(CollaboratorError::rejected(
                "task submitter",
                format!("actor {actor_id} has no queue to disconnect"),
            ));
        }
        info!(actor_id = %actor_id, reason = %reason, "Disconnecting actor");
        self.disconnects.lock().push((actor_id, reason));
        Ok(())
    }
}
