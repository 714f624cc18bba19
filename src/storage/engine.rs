//! Thread-Safe Store with Expiry Support
//!
//! This module implements the core of snapkv: a concurrent map from string
//! keys to byte values, each with an optional absolute expiration time.
//!
//! ## Design Decisions
//!
//! 1. **Single Lock**: The entry table and the expiry index form one unit of
//!    mutual exclusion. A single `RwLock` guards both, so they can never be
//!    observed out of sync.
//! 2. **Expiry Index**: A `BTreeSet<(SystemTime, String)>` orders keys by
//!    deadline, so the reaper only touches entries that are actually due
//!    instead of scanning the whole table.
//! 3. **Lazy Expiry**: Expired entries are invisible to every read, whether
//!    or not the background reaper has removed them yet. Read paths take the
//!    read lock and escalate to the write lock only to remove a dead entry.
//! 4. **SystemTime Deadlines**: Expirations are absolute wall-clock instants
//!    so they can be serialized into snapshots and survive restarts.
//!
//! ## Concurrency Model
//!
//! ```text
//! callers ──┐
//! reaper  ──┼──> RwLock< entries: HashMap<String, Entry>
//! saver   ──┘            expiry:  BTreeSet<(SystemTime, String)> >
//! ```
//!
//! Operations on the same key are linearizable because every mutation goes
//! through the one write lock.

use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::storage::pattern::GlobPattern;

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key does not exist, or exists but has expired.
    #[error("key not found")]
    KeyNotFound,

    /// A TTL of zero or a negative number of seconds was supplied.
    #[error("invalid TTL: must be a positive number of seconds")]
    InvalidTtl,

    /// The scan pattern is malformed (a trailing, unescaped backslash).
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// A stored value with an optional expiration time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The value bytes.
    pub value: Bytes,
    /// Absolute instant after which the entry is dead (None = never expires).
    pub expires_at: Option<SystemTime>,
}

impl Entry {
    /// Creates an entry without an expiration.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates an entry that expires at the given instant.
    pub fn with_deadline(value: Bytes, deadline: SystemTime) -> Self {
        Self {
            value,
            expires_at: Some(deadline),
        }
    }

    /// The single definition of "logically expired", shared by the read
    /// paths, the reaper, and snapshot load.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// The entry table and its expiry index. Guarded by one lock; every key in
/// `expiry` exists in `entries` with a matching `expires_at`.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    expiry: BTreeSet<(SystemTime, String)>,
}

impl Inner {
    /// Inserts or overwrites an entry, keeping the index consistent.
    fn insert(&mut self, key: String, entry: Entry) {
        if let Some(old) = self.entries.get(&key) {
            if let Some(deadline) = old.expires_at {
                self.expiry.remove(&(deadline, key.clone()));
            }
        }
        if let Some(deadline) = entry.expires_at {
            self.expiry.insert((deadline, key.clone()));
        }
        self.entries.insert(key, entry);
    }

    /// Removes an entry and its index record, if present.
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        if let Some(deadline) = entry.expires_at {
            self.expiry.remove(&(deadline, key.to_string()));
        }
        Some(entry)
    }
}

/// Counters for store activity. All counters use relaxed ordering; they are
/// informational, not synchronization points.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Total GET operations.
    pub gets: u64,
    /// Total SET operations.
    pub sets: u64,
    /// Total DEL operations.
    pub deletes: u64,
    /// GETs that found a live key.
    pub hits: u64,
    /// GETs that found nothing.
    pub misses: u64,
    /// Entries removed because they expired (lazily or by the reaper).
    pub expired: u64,
}

/// The concurrent key-value store at the heart of snapkv.
///
/// Designed to be wrapped in an `Arc` and shared between caller threads, the
/// expiry reaper, and the auto-saver. All operations are thread-safe and
/// complete synchronously; none perform I/O.
///
/// # Example
///
/// ```
/// use snapkv::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
///
/// store.set("name", Bytes::from("nigel"), None).unwrap();
/// assert_eq!(store.get("name").unwrap(), Bytes::from("nigel"));
///
/// // With a 60 second TTL
/// store.set("session", Bytes::from("abc123"), Some(60)).unwrap();
/// assert!(store.ttl("session").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<Inner>,

    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    expired_count: AtomicU64,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or overwrites a key.
    ///
    /// With `ttl_secs`, the entry expires `ttl_secs` seconds from now; a
    /// zero or negative TTL is rejected with [`StoreError::InvalidTtl`]
    /// before anything is mutated. Without it, any previous expiration on
    /// the key is cleared. The prior value and TTL are always replaced
    /// wholesale.
    pub fn set(&self, key: &str, value: Bytes, ttl_secs: Option<i64>) -> Result<(), StoreError> {
        let entry = match ttl_secs {
            Some(secs) if secs <= 0 => return Err(StoreError::InvalidTtl),
            Some(secs) => {
                let deadline = SystemTime::now() + Duration::from_secs(secs as u64);
                Entry::with_deadline(value, deadline)
            }
            None => Entry::new(value),
        };

        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.write().unwrap();
        inner.insert(key.to_string(), entry);
        Ok(())
    }

    /// Returns the value for a key, or [`StoreError::KeyNotFound`] if the
    /// key is absent or logically expired. An expired entry found here is
    /// removed as a side effect (lazy expiry).
    pub fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now();

        // Fast path: read lock only.
        {
            let inner = self.inner.read().unwrap();
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value.clone());
                }
                Some(_) => {} // expired, fall through to remove it
                None => {
                    self.miss_count.fetch_add(1, Ordering::Relaxed);
                    return Err(StoreError::KeyNotFound);
                }
            }
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        self.expire_now(key, now);
        Err(StoreError::KeyNotFound)
    }

    /// Removes a key. Idempotent: returns `true` only if a live entry was
    /// actually removed.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now();

        let mut inner = self.inner.write().unwrap();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                inner.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(_) => {
                inner.remove(key);
                true
            }
            None => false,
        }
    }

    /// Returns whether a key exists and is live, with the same lazy-expiry
    /// side effect as [`Store::get`].
    pub fn exists(&self, key: &str) -> bool {
        let now = SystemTime::now();

        {
            let inner = self.inner.read().unwrap();
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return true,
                Some(_) => {}
                None => return false,
            }
        }

        self.expire_now(key, now);
        false
    }

    /// Remaining time-to-live for a key.
    ///
    /// `Ok(Some(seconds))` for an expiring key, `Ok(None)` for a key with no
    /// expiration, `Err(KeyNotFound)` for an absent or expired key.
    pub fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = SystemTime::now();

        {
            let inner = self.inner.read().unwrap();
            match inner.entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    return Ok(entry.expires_at.map(|deadline| {
                        deadline
                            .duration_since(now)
                            .map(|d| d.as_secs())
                            .unwrap_or(0)
                    }));
                }
                Some(_) => {}
                None => return Err(StoreError::KeyNotFound),
            }
        }

        self.expire_now(key, now);
        Err(StoreError::KeyNotFound)
    }

    /// Sets or overwrites the expiration of an existing key without touching
    /// its value. Fails with [`StoreError::InvalidTtl`] on a non-positive
    /// TTL and [`StoreError::KeyNotFound`] if the key is absent or already
    /// expired.
    pub fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), StoreError> {
        if ttl_secs <= 0 {
            return Err(StoreError::InvalidTtl);
        }
        let now = SystemTime::now();
        let deadline = now + Duration::from_secs(ttl_secs as u64);

        let mut inner = self.inner.write().unwrap();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                inner.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                Err(StoreError::KeyNotFound)
            }
            Some(entry) => {
                let mut entry = entry.clone();
                entry.expires_at = Some(deadline);
                inner.insert(key.to_string(), entry);
                Ok(())
            }
            None => Err(StoreError::KeyNotFound),
        }
    }

    /// Returns the keys of all live entries matching the glob `pattern`.
    ///
    /// `*` matches any run of characters, `?` exactly one, `\` escapes the
    /// next character, everything else is literal. Matching is anchored and
    /// case-sensitive; an empty pattern matches only the empty key. The
    /// result is a best-effort point-in-time scan with no ordering
    /// guarantee.
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let pattern = GlobPattern::compile(pattern)?;
        let now = SystemTime::now();

        let inner = self.inner.read().unwrap();
        Ok(inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Atomically empties the table and the expiry index.
    pub fn flush_all(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.expiry.clear();
    }

    /// Number of entries in the table. May include expired entries the
    /// reaper has not removed yet.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the activity counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            gets: self.get_count.load(Ordering::Relaxed),
            sets: self.set_count.load(Ordering::Relaxed),
            deletes: self.del_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Physically removes every entry whose deadline has passed. Called by
    /// the background reaper; walks the expiry index from the earliest
    /// deadline and stops at the first one still in the future.
    ///
    /// Each candidate is re-checked against the table under the write lock,
    /// so a concurrent overwrite between sweeps can never lead to removing
    /// a key that was given a new value or a new deadline.
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> u64 {
        let now = SystemTime::now();
        let mut removed = 0u64;

        let mut inner = self.inner.write().unwrap();
        loop {
            let due = match inner.expiry.iter().next() {
                Some((deadline, key)) if *deadline <= now => (*deadline, key.clone()),
                _ => break,
            };
            inner.expiry.remove(&due);

            let (deadline, key) = due;
            // Only act on the index record if the live entry still carries
            // this exact deadline.
            if let Some(entry) = inner.entries.get(&key) {
                if entry.expires_at == Some(deadline) {
                    inner.entries.remove(&key);
                    removed += 1;
                }
            }
        }
        drop(inner);

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Point-in-time copy of all live entries, for snapshotting. Holds the
    /// read lock only while cloning; serialization happens elsewhere.
    pub fn export(&self) -> Vec<(String, Entry)> {
        let now = SystemTime::now();
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Replaces the store contents with the given entries, rebuilding the
    /// expiry index and dropping anything that has already expired. Used
    /// when loading a snapshot at startup.
    ///
    /// Returns the number of entries kept.
    pub fn import(&self, entries: impl IntoIterator<Item = (String, Entry)>) -> usize {
        let now = SystemTime::now();
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.expiry.clear();
        for (key, entry) in entries {
            if !entry.is_expired_at(now) {
                inner.insert(key, entry);
            }
        }
        inner.entries.len()
    }

    /// Removes `key` if it is still expired as of `now`. Re-checks under
    /// the write lock: a concurrent SET may have replaced the entry since
    /// the caller observed it.
    fn expire_now(&self, key: &str, now: SystemTime) {
        let mut inner = self.inner.write().unwrap();
        let still_expired = inner
            .entries
            .get(key)
            .map(|e| e.is_expired_at(now))
            .unwrap_or(false);
        if still_expired {
            inner.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_and_get() {
        let store = Store::new();

        store.set("key", b("value"), None).unwrap();
        assert_eq!(store.get("key").unwrap(), b("value"));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = Store::new();
        assert_eq!(store.get("nonexistent"), Err(StoreError::KeyNotFound));
    }

    #[test]
    fn test_overwrite_replaces_value_and_ttl() {
        let store = Store::new();

        store.set("key", b("v1"), Some(100)).unwrap();
        store.set("key", b("v2"), None).unwrap();

        assert_eq!(store.get("key").unwrap(), b("v2"));
        // TTL cleared by the second set
        assert_eq!(store.ttl("key").unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let store = Store::new();

        store.set("key", b("value"), None).unwrap();
        assert!(store.delete("key"));
        assert_eq!(store.get("key"), Err(StoreError::KeyNotFound));
        assert!(!store.delete("key")); // already gone
    }

    #[test]
    fn test_exists() {
        let store = Store::new();

        assert!(!store.exists("key"));
        store.set("key", b("value"), None).unwrap();
        assert!(store.exists("key"));
    }

    #[test]
    fn test_invalid_ttl_rejected_without_mutation() {
        let store = Store::new();

        assert_eq!(
            store.set("key", b("v"), Some(0)),
            Err(StoreError::InvalidTtl)
        );
        assert_eq!(
            store.set("key", b("v"), Some(-5)),
            Err(StoreError::InvalidTtl)
        );
        assert!(!store.exists("key"));

        store.set("key", b("v"), None).unwrap();
        assert_eq!(store.expire("key", -1), Err(StoreError::InvalidTtl));
        assert_eq!(store.expire("key", 0), Err(StoreError::InvalidTtl));
        // unchanged: still no expiration
        assert_eq!(store.ttl("key").unwrap(), None);
    }

    #[test]
    fn test_lazy_expiry_on_read() {
        let store = Store::new();

        store.set("key", b("value"), Some(1)).unwrap();
        assert_eq!(store.get("key").unwrap(), b("value"));

        std::thread::sleep(Duration::from_millis(1100));

        // No reaper running; the read itself must hide and remove the entry.
        assert_eq!(store.get("key"), Err(StoreError::KeyNotFound));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_exists_lazy_expiry() {
        let store = Store::new();

        store.set("key", b("value"), Some(1)).unwrap();
        std::thread::sleep(Duration::from_millis(1100));

        assert!(!store.exists("key"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_ttl_reporting() {
        let store = Store::new();

        assert_eq!(store.ttl("missing"), Err(StoreError::KeyNotFound));

        store.set("forever", b("v"), None).unwrap();
        assert_eq!(store.ttl("forever").unwrap(), None);

        store.set("mortal", b("v"), Some(100)).unwrap();
        let remaining = store.ttl("mortal").unwrap().unwrap();
        assert!(remaining > 0 && remaining <= 100);
    }

    #[test]
    fn test_expire_existing_key() {
        let store = Store::new();

        store.set("key", b("v"), None).unwrap();
        store.expire("key", 60).unwrap();
        assert!(store.ttl("key").unwrap().unwrap() > 0);

        assert_eq!(store.expire("missing", 60), Err(StoreError::KeyNotFound));
    }

    #[test]
    fn test_expire_on_expired_key_is_not_found() {
        let store = Store::new();

        store.set("key", b("v"), Some(1)).unwrap();
        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(store.expire("key", 60), Err(StoreError::KeyNotFound));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_keys_glob() {
        let store = Store::new();

        store.set("user:1", b("a"), None).unwrap();
        store.set("user:42", b("b"), None).unwrap();
        store.set("order:1", b("c"), None).unwrap();
        store.set("user", b("d"), None).unwrap();

        let mut matched = store.keys("user:*").unwrap();
        matched.sort();
        assert_eq!(matched, vec!["user:1", "user:42"]);

        let all = store.keys("*").unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_keys_excludes_expired() {
        let store = Store::new();

        store.set("live", b("a"), None).unwrap();
        store.set("dead", b("b"), Some(1)).unwrap();
        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(store.keys("*").unwrap(), vec!["live".to_string()]);
    }

    #[test]
    fn test_keys_invalid_pattern() {
        let store = Store::new();
        assert!(matches!(
            store.keys("trailing\\"),
            Err(StoreError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_flush_all() {
        let store = Store::new();

        store.set("a", b("1"), None).unwrap();
        store.set("b", b("2"), Some(100)).unwrap();
        assert_eq!(store.len(), 2);

        store.flush_all();
        assert!(store.is_empty());
        // index cleared too: the reaper has nothing left to sweep
        assert_eq!(store.remove_expired(), 0);
    }

    #[test]
    fn test_remove_expired() {
        let store = Store::new();

        store.set("k1", b("v"), Some(1)).unwrap();
        store.set("k2", b("v"), Some(1)).unwrap();
        store.set("k3", b("v"), None).unwrap();

        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(store.remove_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.exists("k3"));

        // a second sweep finds nothing
        assert_eq!(store.remove_expired(), 0);
    }

    #[test]
    fn test_overwrite_does_not_confuse_reaper() {
        let store = Store::new();

        store.set("key", b("v1"), Some(1)).unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        // Replaced after its first deadline passed; the replacement must not
        // be swept on account of the old deadline.
        store.set("key", b("v2"), Some(100)).unwrap();

        assert_eq!(store.remove_expired(), 0);
        assert_eq!(store.get("key").unwrap(), b("v2"));
    }

    #[test]
    fn test_export_excludes_expired() {
        let store = Store::new();

        store.set("live", b("a"), Some(100)).unwrap();
        store.set("dead", b("b"), Some(1)).unwrap();
        store.set("forever", b("c"), None).unwrap();

        std::thread::sleep(Duration::from_millis(1100));

        let mut exported: Vec<String> = store.export().into_iter().map(|(k, _)| k).collect();
        exported.sort();
        assert_eq!(exported, vec!["forever", "live"]);
    }

    #[test]
    fn test_import_rebuilds_index_and_drops_expired() {
        let store = Store::new();

        let past = SystemTime::now() - Duration::from_secs(10);
        let future = SystemTime::now() + Duration::from_secs(1);

        let kept = store.import(vec![
            ("gone".to_string(), Entry::with_deadline(b("x"), past)),
            ("soon".to_string(), Entry::with_deadline(b("y"), future)),
            ("keep".to_string(), Entry::new(b("z"))),
        ]);
        assert_eq!(kept, 2);
        assert!(!store.exists("gone"));
        assert!(store.exists("soon"));

        // the rebuilt index drives the reaper
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(store.remove_expired(), 1);
        assert!(store.exists("keep"));
    }

    #[test]
    fn test_stats_counters() {
        let store = Store::new();

        store.set("a", b("1"), None).unwrap();
        let _ = store.get("a");
        let _ = store.get("missing");
        store.delete("a");

        let stats = store.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(&key, Bytes::from("value"), None).unwrap();
                    store.get(&key).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_concurrent_set_and_delete_same_key() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new());

        for _ in 0..100 {
            let writer = {
                let store = Arc::clone(&store);
                thread::spawn(move || store.set("contested", Bytes::from("v1"), None).unwrap())
            };
            let remover = {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.delete("contested");
                })
            };
            writer.join().unwrap();
            remover.join().unwrap();

            // Exactly one of the two well-defined end states.
            match store.get("contested") {
                Ok(v) => assert_eq!(v, Bytes::from("v1")),
                Err(StoreError::KeyNotFound) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
            store.delete("contested");
        }
    }
}
