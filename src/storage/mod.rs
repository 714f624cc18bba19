//! Storage Engine Module
//!
//! The concurrency-safe key-value store with TTL support: entry table,
//! expiry index, glob scan, and the background expiry reaper.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Store                     │
//! │   RwLock< entries: HashMap<String, Entry>    │
//! │           expiry:  BTreeSet<(when, key)> >   │
//! └──────────────────────────────────────────────┘
//!                        ▲
//!                        │
//!          ┌─────────────┴─────────────┐
//!          │          Reaper           │
//!          │  (background tokio task)  │
//!          └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use snapkv::storage::Store;
//! use bytes::Bytes;
//!
//! let store = Store::new();
//!
//! store.set("name", Bytes::from("nigel"), None).unwrap();
//! assert_eq!(store.get("name").unwrap(), Bytes::from("nigel"));
//!
//! // Keys with a TTL expire automatically
//! store.set("session", Bytes::from("token123"), Some(3600)).unwrap();
//! assert!(store.ttl("session").unwrap().is_some());
//! ```

pub mod engine;
pub mod expiry;
pub mod pattern;

// Re-export commonly used types
pub use engine::{Entry, Store, StoreError, StoreStats};
pub use expiry::{start_reaper, Reaper, ReaperConfig};
pub use pattern::GlobPattern;
