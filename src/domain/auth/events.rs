//! Lifecycle events pushed by the identity provider.

use super::Session;

/// One of the four lifecycle events an identity provider can emit.
///
/// The set is closed; the state machine matches it exhaustively.
#[derive(Debug, Clone)]
pub enum AuthLifecycleEvent {
    /// A user signed in and a session was issued.
    SignedIn(Session),

    /// The session ended.
    SignedOut,

    /// The provider issued a fresh token for the current session.
    TokenRefreshed(Session),

    /// The user's identity record changed (email, metadata).
    UserUpdated(Option<Session>),
}

impl AuthLifecycleEvent {
    /// Event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            AuthLifecycleEvent::SignedIn(_) => "signed_in",
            AuthLifecycleEvent::SignedOut => "signed_out",
            AuthLifecycleEvent::TokenRefreshed(_) => "token_refreshed",
            AuthLifecycleEvent::UserUpdated(_) => "user_updated",
        }
    }

    /// Session payload carried by the event, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthLifecycleEvent::SignedIn(session) | AuthLifecycleEvent::TokenRefreshed(session) => {
                Some(session)
            }
            AuthLifecycleEvent::UserUpdated(session) => session.as_ref(),
            AuthLifecycleEvent::SignedOut => None,
        }
    }
}
