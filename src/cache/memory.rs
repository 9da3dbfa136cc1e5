//! In-Memory Driver Module
//!
//! Reference storage driver: a HashMap of records with lazy expiry on access
//! and a sweep for the background cleanup task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, Payload, StorageDriver};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

// == Memory Driver ==
/// Thread-safe in-memory storage driver.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    inner: RwLock<Inner>,
    /// When set, every mutating call reports failure
    failing: AtomicBool,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    // == Failure Injection ==
    /// Makes store/delete/clear report failure, emulating a broken backend.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }

    // == Inspection ==
    /// Returns a copy of the live record under `key`, without touching stats.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let inner = self.inner.read();
        inner.entries.get(key).filter(|e| !e.is_expired()).cloned()
    }

    /// Returns the stored keys, live or not.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().entries.keys().cloned().collect()
    }

    // == Stats ==
    /// Returns current driver statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();

        // Acquire write lock and drop everything past its expiry
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - inner.entries.len();

        // Update statistics
        let total = inner.entries.len();
        inner.stats.record_expirations(removed);
        inner.stats.set_total_entries(total);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl StorageDriver for MemoryDriver {
    fn fetch(&self, key: &str) -> Option<Payload> {
        let mut inner = self.inner.write();
        let found = inner
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(), entry.payload.clone()));

        match found {
            None => {
                inner.stats.record_miss();
                None
            }
            Some((false, payload)) => {
                inner.stats.record_hit();
                Some(payload)
            }
            Some((true, _)) => {
                inner.entries.remove(key);
                let total = inner.entries.len();
                inner.stats.record_expirations(1);
                inner.stats.record_miss();
                inner.stats.set_total_entries(total);
                debug!("Dropped expired record {}", key);
                None
            }
        }
    }

    fn store(&self, key: &str, payload: Payload, ttl_seconds: u64) -> bool {
        if self.is_failing() {
            warn!("Memory driver refused store of {}", key);
            return false;
        }
        let mut inner = self.inner.write();
        inner
            .entries
            .insert(key.to_string(), CacheEntry::new(payload, ttl_seconds));
        let total = inner.entries.len();
        inner.stats.set_total_entries(total);
        true
    }

    fn delete(&self, key: &str) -> bool {
        if self.is_failing() {
            return false;
        }
        let mut inner = self.inner.write();
        let removed = inner.entries.remove(key).is_some();
        let total = inner.entries.len();
        inner.stats.set_total_entries(total);
        removed
    }

    fn has(&self, key: &str) -> bool {
        self.inner
            .read()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    fn clear(&self, prefix: &str) -> bool {
        if self.is_failing() {
            return false;
        }
        let mut inner = self.inner.write();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        let total = inner.entries.len();
        inner.stats.set_total_entries(total);
        true
    }

    fn clear_all(&self) -> bool {
        if self.is_failing() {
            return false;
        }
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.stats.set_total_entries(0);
        true
    }
}
