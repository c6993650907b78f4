//! Auth domain - identity, sessions, lifecycle events and the canonical
//! `AuthState` snapshot.

mod errors;
mod events;
mod identity;
mod state;

pub use errors::{AuthError, AuthResult};
pub use events::AuthLifecycleEvent;
pub use identity::{AuthUser, Credentials, EmailAddress, Session};
pub use state::{AuthPhase, AuthState};
