//! Request router adapters.

mod http;
mod in_memory;

pub use http::HttpRequestRouter;
pub use in_memory::InMemoryRequestRouter;
