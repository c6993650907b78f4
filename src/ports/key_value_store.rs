//! Durable local key/value store port.
//!
//! Used only for the AI context cache, so that a cold start can read the
//! context before the profile has been fetched.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::auth::AuthError;

/// Errors that can occur during key/value storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::RemoteFailure(err.to_string())
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns the value under `key`, or `None` if absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
