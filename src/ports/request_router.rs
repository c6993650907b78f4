//! Generic request router port.
//!
//! Every backend call (profile reads/writes, analytics) goes through one
//! routed request/response function with JSON payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::auth::AuthError;
use crate::domain::foundation::UserId;
use crate::domain::profile::ProfileUpdate;

/// Backend routes used by the auth core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    GetProfile,
    CreateProfile,
    UpdateProfile,
    TrackEvent,
}

impl Route {
    /// Route identifier understood by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::GetProfile => "profiles.get",
            Route::CreateProfile => "profiles.create",
            Route::UpdateProfile => "profiles.update",
            Route::TrackEvent => "analytics.track",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of `profiles.get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLookup {
    pub user_id: UserId,
}

/// Payload of `profiles.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub user_id: UserId,
    pub fields: ProfileUpdate,
}

/// Payload of `analytics.track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event: String,
    #[serde(default)]
    pub properties: Value,
}

/// Errors surfaced by routed requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate key on create.
    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::InvalidPayload(err.to_string())
    }
}

impl From<RouterError> for AuthError {
    fn from(err: RouterError) -> Self {
        AuthError::RemoteFailure(err.to_string())
    }
}

/// Routed request function used for all backend calls.
///
/// # Contract
///
/// - `profiles.get` takes a `ProfileLookup` and returns a `UserProfile`,
///   or `RouterError::NotFound`
/// - `profiles.create` takes a `UserProfile`; it must be atomic per user id
///   and report a duplicate with `RouterError::Conflict`
/// - `profiles.update` takes a `ProfilePatch` and returns the canonical
///   `UserProfile`
/// - `analytics.track` takes an `AnalyticsEvent`
///
/// Failures surface as `Err`, never as panics.
#[async_trait]
pub trait RequestRouter: Send + Sync {
    async fn request(&self, route: Route, payload: Value) -> Result<Value, RouterError>;
}
