//! Clock port - the source of "now" for expiry arithmetic.

use crate::domain::foundation::Timestamp;

/// Wall clock. Injected so tests can control time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
