//! Background Expiry Reaper
//!
//! Lazy expiry (checking on access) keeps expired keys invisible, but a key
//! that is never read again would sit in memory forever. The reaper is a
//! background task that periodically drains due entries from the store's
//! expiry index.
//!
//! The reaper is best-effort cleanup: correctness of "expired keys are
//! never observable" is already guaranteed by the lazy checks in the store,
//! so a delayed sweep only costs memory, never correctness.

use crate::storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Configuration for the expiry reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Interval between sweeps (default: 100ms).
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
        }
    }
}

/// A handle to the running reaper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Reaper {
    shutdown_tx: watch::Sender<bool>,
}

impl Reaper {
    /// Starts the reaper as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use snapkv::storage::{Store, Reaper, ReaperConfig};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(Store::new());
    /// let reaper = Reaper::start(Arc::clone(&store), ReaperConfig::default());
    ///
    /// // ... runs until dropped or stopped
    /// drop(reaper);
    /// ```
    pub fn start(store: Arc<Store>, config: ReaperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reaper_loop(store, config, shutdown_rx));

        info!("expiry reaper started");

        Self { shutdown_tx }
    }

    /// Stops the reaper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("expiry reaper stopped");
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The sweep loop: sleep, drain due entries, repeat.
async fn reaper_loop(store: Arc<Store>, config: ReaperConfig, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry reaper received shutdown signal");
                    return;
                }
            }
        }

        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "reaped expired keys");
        }
    }
}

/// Starts the reaper with default configuration.
pub fn start_reaper(store: Arc<Store>) -> Reaper {
    Reaper::start(store, ReaperConfig::default())
}
