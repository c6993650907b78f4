//! Identity provider port.
//!
//! The identity provider verifies credentials, issues sessions, dispatches
//! verification and password-reset emails, and pushes lifecycle events.
//! The auth core consumes it only through this trait.
//!
//! # Contract
//!
//! Implementations must:
//! - Return `IdentityError::InvalidCredentials` for a wrong email/password pair
//! - Return `IdentityError::ServiceUnavailable` for transient errors
//! - Deliver lifecycle events on every receiver handed out by
//!   `on_auth_state_change`, in the order they occur

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::auth::{AuthError, AuthLifecycleEvent, AuthUser, Credentials, EmailAddress, Session};

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email address not confirmed")]
    EmailNotConfirmed,

    #[error("User already registered")]
    UserAlreadyRegistered,

    #[error("No active session")]
    SessionMissing,

    #[error("Identity service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Identity request rejected: {0}")]
    Rejected(String),
}

impl IdentityError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityError::ServiceUnavailable(_))
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        AuthError::RemoteFailure(err.to_string())
    }
}

/// Options for account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOptions {
    /// Where the verification email's link sends the user.
    pub email_redirect_to: String,
}

/// Options for password reset emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPasswordOptions {
    /// Where the reset email's link sends the user.
    pub redirect_to: String,
}

/// Result of an account creation request.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    /// Present when the provider signs the user in immediately; absent while
    /// email confirmation is pending.
    pub session: Option<Session>,
}

impl SignUpOutcome {
    pub fn confirmation_pending(&self) -> bool {
        self.session.is_none()
    }
}

/// Identity provider operations consumed by the auth core.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the session persisted by the provider, if any.
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Returns the identity record of the signed-in user, if any.
    async fn get_user(&self) -> Result<Option<AuthUser>, IdentityError>;

    /// Verifies credentials and issues a session.
    ///
    /// On success the provider also emits `AuthLifecycleEvent::SignedIn`.
    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, IdentityError>;

    /// Requests account creation.
    async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
    ) -> Result<SignUpOutcome, IdentityError>;

    /// Ends the remote session. Emits `AuthLifecycleEvent::SignedOut` on success.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Dispatches a password-reset email.
    async fn reset_password_for_email(
        &self,
        email: &EmailAddress,
        options: &ResetPasswordOptions,
    ) -> Result<(), IdentityError>;

    /// Exchanges the refresh token for a new session.
    async fn refresh_session(&self) -> Result<Session, IdentityError>;

    /// Returns a stream of lifecycle events emitted from now on.
    fn on_auth_state_change(&self) -> mpsc::UnboundedReceiver<AuthLifecycleEvent>;
}
