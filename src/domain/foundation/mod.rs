//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and the
//! validation error type that the auth and profile domains build on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ChannelId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
