//! # SnapKV - An In-Memory Key-Value Store with Snapshots
//!
//! SnapKV is a small in-memory key-value store with per-key TTL expiration,
//! glob key scans, and periodic snapshot persistence. It is driven through
//! an interactive command shell.
//!
//! ## Features
//!
//! - **Concurrent access**: a single RwLock guards the key table and the
//!   expiration index together, so readers share and every observer sees a
//!   consistent view
//! - **TTL support**: keys can carry absolute expiration deadlines, enforced
//!   lazily on access and actively by a background reaper
//! - **Glob scans**: `KEYS pattern` with `*`, `?` and `\` escapes, matched
//!   iteratively so hostile patterns cannot blow the stack or the clock
//! - **Snapshots**: versioned JSON snapshots written atomically (temp file +
//!   rename), saved periodically and once more on graceful shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           SnapKV                             │
//! │                                                              │
//! │  ┌───────────┐    ┌─────────────┐    ┌───────────────────┐  │
//! │  │  stdin    │───>│  Command    │───>│      Store        │  │
//! │  │  shell    │    │  Handler    │    │  RwLock<Inner>    │  │
//! │  └───────────┘    └─────────────┘    │  table + expiry   │  │
//! │                                      │  index            │  │
//! │                                      └───┬───────────┬───┘  │
//! │                                          │           │      │
//! │                              ┌───────────▼──┐  ┌─────▼────┐ │
//! │                              │   Reaper     │  │AutoSaver │ │
//! │                              │ (background  │  │(snapshot │ │
//! │                              │  tokio task) │  │ to disk) │ │
//! │                              └──────────────┘  └──────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use snapkv::commands::{Command, CommandHandler};
//! use snapkv::persist::{AutoSaveConfig, AutoSaver};
//! use snapkv::storage::{start_reaper, Store};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(Store::new());
//!
//!     // Background expiry and periodic snapshots
//!     let reaper = start_reaper(Arc::clone(&store));
//!     let saver = AutoSaver::start(
//!         Arc::clone(&store),
//!         AutoSaveConfig::new("snapkv.snapshot"),
//!     );
//!
//!     let handler = CommandHandler::new(Arc::clone(&store), "snapkv.snapshot");
//!     let reply = handler.execute(Command::parse("SET name nigel").unwrap());
//!
//!     // Graceful shutdown: final snapshot included
//!     reaper.stop();
//!     saver.stop().await;
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the store itself, the glob matcher, and the expiry reaper
//! - [`persist`]: snapshot codec, atomic writes, and the auto-save task
//! - [`commands`]: command parsing and dispatch for the interactive shell

pub mod commands;
pub mod persist;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandHandler, ParseError, Reply};
pub use persist::{read_snapshot, write_snapshot, AutoSaveConfig, AutoSaver, PersistError};
pub use storage::{start_reaper, Reaper, ReaperConfig, Store, StoreError};

/// The default snapshot file path
pub const DEFAULT_SNAPSHOT_PATH: &str = "snapkv.snapshot";

/// The default interval between automatic snapshots, in seconds
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 60;

/// The default interval between expiry sweeps, in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 100;

/// Version of SnapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
