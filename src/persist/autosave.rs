//! Background Auto-Saver
//!
//! Periodically writes a snapshot of the store to disk so data survives a
//! restart, and performs one final save on graceful shutdown.
//!
//! Each cycle takes a point-in-time copy of the live entries (holding the
//! store's read lock only for the copy) and then serializes and writes on a
//! blocking worker thread, so a slow disk never stalls store operations.
//! A failed save is logged and retried on the next cycle; it never stops
//! the task or the process.

use crate::persist::snapshot;
use crate::storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the auto-saver.
#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    /// Interval between saves (default: 60s).
    pub interval: Duration,
    /// Snapshot file path.
    pub path: PathBuf,
}

impl AutoSaveConfig {
    /// Default interval with the given snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            interval: Duration::from_secs(60),
            path: path.into(),
        }
    }
}

/// A handle to the running auto-save task.
///
/// Call [`AutoSaver::stop`] for a graceful shutdown that includes a final
/// save. Dropping the handle also signals the task to stop, but cannot wait
/// for the final save to finish.
#[derive(Debug)]
pub struct AutoSaver {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Starts the auto-saver as a background task.
    pub fn start(store: Arc<Store>, config: AutoSaveConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(autosave_loop(store, config, shutdown_rx));

        info!("auto-save task started");

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signals shutdown and waits for the final save to complete.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("auto-save task stopped");
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The save loop: sleep, snapshot, repeat; one last snapshot on shutdown.
async fn autosave_loop(
    store: Arc<Store>,
    config: AutoSaveConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let stopping = tokio::select! {
            _ = tokio::time::sleep(config.interval) => false,
            result = shutdown_rx.changed() => {
                result.is_err() || *shutdown_rx.borrow()
            }
        };

        match save_once(&store, &config.path).await {
            Ok(saved) => debug!(entries = saved, path = %config.path.display(), "snapshot saved"),
            Err(e) => warn!(path = %config.path.display(), error = %e, "snapshot save failed"),
        }

        if stopping {
            debug!("auto-save task received shutdown signal");
            return;
        }
    }
}

/// Copies the live entries, then serializes and writes off the async runtime.
async fn save_once(store: &Arc<Store>, path: &std::path::Path) -> anyhow::Result<usize> {
    let entries = store.export();
    let count = entries.len();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || snapshot::write_snapshot(&entries, &path)).await??;
    Ok(count)
}
