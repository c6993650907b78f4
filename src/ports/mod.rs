//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the auth core and the outside world. Adapters implement these ports.
//!
//! - `IdentityProvider` - credential verification, sessions, lifecycle events
//! - `RequestRouter` - routed backend calls (profiles, analytics)
//! - `RealtimeTransport` - server-pushed profile changes
//! - `KeyValueStore` - durable local cache for the AI context
//! - `Clock` - wall clock used for expiry arithmetic

mod clock;
mod identity_provider;
mod key_value_store;
mod realtime_transport;
mod request_router;

pub use clock::Clock;
pub use identity_provider::{
    IdentityError, IdentityProvider, ResetPasswordOptions, SignUpOptions, SignUpOutcome,
};
pub use key_value_store::{KeyValueStore, StorageError};
pub use realtime_transport::{
    ChangeKind, ProfileChange, ProfileChangeHandler, RealtimeError, RealtimeTransport,
};
pub use request_router::{
    AnalyticsEvent, ProfileLookup, ProfilePatch, RequestRouter, Route, RouterError,
};
