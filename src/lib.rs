//! Sealed Cache - a backend-agnostic cache facade
//!
//! Validates and hashes keys, normalizes TTLs, optionally seals values with
//! AES-256-GCM or ChaCha20-Poly1305, and delegates storage to a pluggable
//! driver. Ships an in-memory driver and a small HTTP front.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cipher, MemoryDriver, SimpleCache, StorageDriver, TtlSpec};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
