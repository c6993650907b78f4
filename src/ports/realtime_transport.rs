//! Realtime transport port - server-pushed profile changes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::auth::AuthError;
use crate::domain::foundation::{ChannelId, UserId};
use crate::domain::profile::UserProfile;

/// Kind of row change pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change to a user's profile row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChange {
    pub user_id: UserId,
    pub kind: ChangeKind,
    /// New row contents; absent for deletes.
    pub record: Option<UserProfile>,
}

/// Callback invoked by the transport for each pushed change.
///
/// Must not block; implementations typically enqueue the change.
pub type ProfileChangeHandler = Arc<dyn Fn(ProfileChange) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("Realtime connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),
}

impl From<RealtimeError> for AuthError {
    fn from(err: RealtimeError) -> Self {
        AuthError::RemoteFailure(err.to_string())
    }
}

/// Push-subscription transport.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Opens a channel delivering changes to the given user's profile row.
    async fn subscribe_to_user_updates(
        &self,
        user_id: &UserId,
        handler: ProfileChangeHandler,
    ) -> Result<ChannelId, RealtimeError>;

    /// Closes a channel.
    async fn unsubscribe(&self, channel: ChannelId) -> Result<(), RealtimeError>;
}
