//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the auth core to external systems:
//! - `auth` - Identity provider implementations (mock)
//! - `clock` - System and manual clocks
//! - `realtime` - Realtime transport implementations (in-memory)
//! - `router` - Request router implementations (HTTP, in-memory)
//! - `storage` - Key/value stores (filesystem, in-memory)

pub mod auth;
pub mod clock;
pub mod realtime;
pub mod router;
pub mod storage;

pub use auth::MockIdentityProvider;
pub use clock::{ManualClock, SystemClock};
pub use realtime::InMemoryRealtimeTransport;
pub use router::{HttpRequestRouter, InMemoryRequestRouter};
pub use storage::{FsKeyValueStore, InMemoryKeyValueStore};
