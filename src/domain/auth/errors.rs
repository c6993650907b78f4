//! Error kinds surfaced by the authentication core.

use thiserror::Error;

use crate::domain::foundation::{UserId, ValidationError};

/// Failure of a public auth operation.
///
/// Every public operation reports failures through this type and also records
/// the message in the snapshot's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The operation requires a signed-in user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The identity provider, profile store or another backend call rejected.
    #[error("Remote call failed: {0}")]
    RemoteFailure(String),

    /// Concurrent profile creation left no readable record.
    #[error("Profile creation conflict for user {0}")]
    ProfileConflict(UserId),

    /// Input was rejected before any remote call.
    #[error("Validation failed: {0}")]
    ValidationFailure(#[from] ValidationError),
}

impl AuthError {
    /// Creates a remote failure with a message.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteFailure(message.into())
    }
}

/// Result type of the auth core's public operations.
pub type AuthResult<T> = Result<T, AuthError>;
