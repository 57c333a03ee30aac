//! # ember-actor-manager
//!
//! Tracks the actor handles a worker holds and coordinates their lifecycle.
//!
//! ## Responsibilities
//!
//! - **Registry**: at most one record per actor; decides ownership
//! - **Out-of-scope notification**: fires a callback once no reference to
//!   an actor remains, so the owner knows it can terminate it
//! - **Pending-location resolution**: tracks owner-created actors the
//!   control store has not published yet, and fails them if the owner dies
//!   before it does
//!
//! ## Event sources
//!
//! ```text
//! application calls ──┐
//! control-store feed ─┼──► ActorManager (one RwLock) ──► collaborators
//! periodic sweep ─────┘                                  (outside the lock)
//! ```
//!
//! Collaborators are traits (see [`collaborators`]); [`mock`] has in-memory
//! implementations.

pub mod collaborators;
mod error;
mod handle;
mod manager;
pub mod mock;
mod notifications;
mod sweep;

pub use collaborators::{
    ActorState, ActorStateData, ControlStore, DisconnectReason, ReferenceCounter,
    ReferenceZeroCallback, TaskSubmitter,
};
pub use error::{ActorManagerError, ActorManagerResult, CollaboratorError};
pub use handle::{ActorHandle, ActorHandleState, Address, CallerInfo};
pub use manager::{ActorManager, OutOfScopeCallback, SweepOutcome};
pub use notifications::run_notification_loop;
pub use sweep::{run_pending_location_sweep, MIN_SWEEP_INTERVAL};
