//! # ember-id
//!
//! Typed identifiers for the ember task-execution runtime.
//!
//! Every identifier has a canonical `{prefix}_{ulid}` string form:
//!
//! - `actor_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `obj_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `wrk_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! The prefix keeps ids of different kinds from being mixed up when they
//! travel as strings (logs, control-store keys, serialized handles).

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
