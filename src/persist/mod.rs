//! Persistence Module
//!
//! Durable snapshots for the store: a versioned snapshot codec with
//! atomic-replace writes, startup loading that tolerates missing or corrupt
//! files, and a background auto-save task with a final save on shutdown.
//!
//! ```text
//!  Store ──export()──> [(key, Entry)] ──serialize──> <path>.tmp ──rename──> <path>
//!                                                                             │
//!  Store <──import()── [(key, Entry)] <──deserialize──────────────────────────┘
//! ```

pub mod autosave;
pub mod snapshot;

// Re-export commonly used types
pub use autosave::{AutoSaveConfig, AutoSaver};
pub use snapshot::{read_snapshot, write_snapshot, PersistError, SNAPSHOT_VERSION};
