//! Key/value storage adapters.
//!
//! Implementations of the `KeyValueStore` port used for the AI context cache.
//!
//! ## Available Adapters
//!
//! - **FsKeyValueStore** - One JSON file per key under a base directory
//! - **InMemoryKeyValueStore** - Process memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use rapport_core::adapters::storage::{FsKeyValueStore, InMemoryKeyValueStore};
//!
//! // Production: file-based storage
//! let storage = FsKeyValueStore::new("./data/cache");
//!
//! // Testing: in-memory storage
//! let storage = InMemoryKeyValueStore::new();
//! ```

mod filesystem;
mod in_memory;

pub use filesystem::FsKeyValueStore;
pub use in_memory::InMemoryKeyValueStore;
