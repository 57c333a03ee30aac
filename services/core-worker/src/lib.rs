//! ember Core Worker Library
//!
//! Hosts the actor manager inside a worker process and drives its two
//! background event sources:
//!
//! - **Notification loop**: control-store actor updates
//! - **Pending-location sweep**: periodic owner liveness checks
//!
//! Collaborators are in-memory for now.

pub mod config;
pub mod worker;

pub use config::Config;
pub use worker::{CoreWorker, WorkerTasks};
