//! CoordStore - namespaced key-value store for cooperating agent channels
//!
//! Channels that run concurrently for the same user never talk to each other
//! directly. They read and write small JSON records under well-known keys in a
//! shared namespace, and this crate is the only thing they share.
//!
//! # Architecture
//!
//! ```text
//! <store_path>/
//! └── {user}/
//!     └── {feature}/
//!         ├── main_status.json
//!         ├── secondary_status.json
//!         └── threads/
//!             └── thread-{id}.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use coordstore::{CoordinationStore, MemoryStore, Namespace};
//!
//! let store = MemoryStore::new();
//! let ns = Namespace::new(["demo_user", "tools_updates"])?;
//! store.put(&ns, "main_status", serde_json::json!({"processing": true})).await?;
//! let items = store.search(&ns).await?;
//! ```

pub mod cli;
pub mod config;
mod error;
mod file;
mod memory;
mod namespace;
mod store;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use namespace::{Namespace, sanitize_segment, validate_key};
pub use store::{CoordinationStore, Item, StoreRef};

/// Default namespace feature segment used by the coordinator
pub const DEFAULT_FEATURE: &str = "tools_updates";
