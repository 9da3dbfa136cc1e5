//! Cache Module
//!
//! Backend-agnostic cache facade: key derivation, TTL normalization, optional
//! authenticated encryption, and an in-memory reference driver.

mod crypto;
mod driver;
mod entry;
mod facade;
mod key;
mod memory;
mod payload;
mod stats;
pub mod ttl;


// Re-export public types
pub use crypto::{Cipher, CryptoEnvelope, SecretKey, KEY_LEN};
pub use driver::StorageDriver;
pub use entry::CacheEntry;
pub use facade::SimpleCache;
pub use key::{
    derive_key, CacheKey, KeyPrefix, Salt, DEFAULT_PREFIX, DEFAULT_SALT, MAX_KEY_LENGTH,
    MIN_SALT_LENGTH, RESERVED_KEY_CHARS,
};
pub use memory::MemoryDriver;
pub use payload::{Envelope, Payload, NONCE_LEN, TAG_LEN};
pub use stats::CacheStats;
pub use ttl::TtlSpec;
