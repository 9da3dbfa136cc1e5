//! Storage Driver Module
//!
//! The capability a cache backend provides to the facade.

use crate::cache::Payload;

// == Storage Driver ==
/// A backend that physically holds cache records.
///
/// Keys are already-derived internal keys. Expiry enforcement, retries and
/// timeouts belong to the implementation. Failures are reported as `false`.
pub trait StorageDriver: Send + Sync {
    /// Fetches a live record, or None on a miss.
    fn fetch(&self, key: &str) -> Option<Payload>;

    /// Stores a record. `ttl_seconds == 0` means the backend default.
    fn store(&self, key: &str, payload: Payload, ttl_seconds: u64) -> bool;

    /// Removes a record.
    fn delete(&self, key: &str) -> bool;

    /// Advisory presence check; racy with respect to concurrent writers.
    fn has(&self, key: &str) -> bool;

    /// Removes every record whose key starts with `prefix`.
    fn clear(&self, prefix: &str) -> bool;

    /// Removes every record.
    fn clear_all(&self) -> bool;
}

impl<D: StorageDriver + ?Sized> StorageDriver for std::sync::Arc<D> {
    fn fetch(&self, key: &str) -> Option<Payload> {
        (**self).fetch(key)
    }

    fn store(&self, key: &str, payload: Payload, ttl_seconds: u64) -> bool {
        (**self).store(key, payload, ttl_seconds)
    }

    fn delete(&self, key: &str) -> bool {
        (**self).delete(key)
    }

    fn has(&self, key: &str) -> bool {
        (**self).has(key)
    }

    fn clear(&self, prefix: &str) -> bool {
        (**self).clear(prefix)
    }

    fn clear_all(&self) -> bool {
        (**self).clear_all()
    }
}
