//! Identity provider adapters.
//!
//! - `mock` - In-process identity provider for tests and local development

mod mock;

pub use mock::MockIdentityProvider;
