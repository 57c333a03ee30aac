//! Error types for the actor manager and its collaborators.

use ember_id::ActorId;
use thiserror::Error;

/// Result type for actor manager operations.
pub type ActorManagerResult<T> = Result<T, ActorManagerError>;

/// Errors surfaced by [`crate::ActorManager`].
///
/// Duplicate registration is not an error: registration calls report it
/// through their `bool` result.
#[derive(Debug, Error)]
pub enum ActorManagerError {
    /// No handle is registered for the actor.
    #[error("actor handle not found: {0}")]
    NotFound(ActorId),

    /// The control store has no actor registered under the name.
    #[error("named actor not found: {0}")]
    NamedActorNotFound(String),

    /// A collaborator failed while serving the request.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Errors reported by external collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The collaborator could not be reached. Callers retry on their next pass.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The collaborator was reached but refused the request.
    #[error("{service} rejected request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }

    /// Returns true if the failure is transient.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
