//! Application layer - the auth lifecycle components.
//!
//! `AuthStateMachine` is the entry point; the other components are owned by
//! it and exposed for hosts that want to compose them differently.

mod analytics;
mod auth_machine;
mod listener_registry;
mod profile_store;
mod session_clock;
mod subscription_bridge;

pub use analytics::AnalyticsTracker;
pub use auth_machine::{AuthDependencies, AuthStateMachine};
pub use listener_registry::{AuthStateListener, ListenerId, ListenerRegistry, Subscription};
pub use profile_store::ProfileStore;
pub use session_clock::{ArmOutcome, RenewalCallback, SessionClock};
pub use subscription_bridge::{ProfileCallback, SubscriptionBridge};
