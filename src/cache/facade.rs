//! Cache Facade Module
//!
//! Validates keys, normalizes TTLs, optionally seals values, and delegates the
//! physical operation to a [`StorageDriver`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::key::{derive_key, CacheKey};
use crate::cache::payload::{self, Payload};
use crate::cache::ttl::{self, TtlSpec};
use crate::cache::{Cipher, CryptoEnvelope, StorageDriver};
use crate::config::CacheConfig;
use crate::error::Result;

// == Simple Cache ==
/// Cache facade over a storage driver.
///
/// Keys are validated on every call, including while the facade is disabled.
/// While disabled, mutators return `false` and reads miss without touching the
/// driver.
#[derive(Debug)]
pub struct SimpleCache<D> {
    driver: Option<D>,
    config: CacheConfig,
    envelope: Option<CryptoEnvelope>,
    enabled: AtomicBool,
    default_ttl: AtomicU64,
}

impl<D: StorageDriver> SimpleCache<D> {
    // == Constructors ==
    /// Creates an enabled facade. Encryption is on when `config` carries a
    /// secret key, using the cipher probed for this process.
    pub fn new(driver: D, config: CacheConfig) -> Result<Self> {
        Self::build(Some(driver), config, None)
    }

    /// Like [`SimpleCache::new`] with an explicit cipher.
    pub fn with_cipher(driver: D, config: CacheConfig, cipher: Cipher) -> Result<Self> {
        Self::build(Some(driver), config, Some(cipher))
    }

    /// Creates a facade with no driver. It stays disabled.
    pub fn disabled(config: CacheConfig) -> Result<Self> {
        Self::build(None, config, None)
    }

    fn build(driver: Option<D>, config: CacheConfig, cipher: Option<Cipher>) -> Result<Self> {
        let envelope = match (config.secret_key(), cipher) {
            (Some(key), Some(cipher)) => Some(CryptoEnvelope::with_cipher(key, cipher)?),
            (Some(key), None) => Some(CryptoEnvelope::new(key)?),
            (None, _) => None,
        };
        match &envelope {
            Some(envelope) => info!(
                "Cache values sealed with {} under prefix {}",
                envelope.cipher().name(),
                config.prefix().as_str()
            ),
            None => info!(
                "Cache values stored unencrypted under prefix {}",
                config.prefix().as_str()
            ),
        }

        Ok(Self {
            enabled: AtomicBool::new(driver.is_some()),
            default_ttl: AtomicU64::new(config.default_ttl()),
            driver,
            config,
            envelope,
        })
    }

    // == Switches And Settings ==
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turns the facade on or off. A facade without a driver cannot be
    /// enabled. Returns the resulting state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let enabled = enabled && self.driver.is_some();
        self.enabled.store(enabled, Ordering::SeqCst);
        enabled
    }

    pub fn is_encrypted(&self) -> bool {
        self.envelope.is_some()
    }

    pub fn cipher(&self) -> Option<Cipher> {
        self.envelope.as_ref().map(CryptoEnvelope::cipher)
    }

    /// Whether loosely typed keys and TTLs are rejected at the JSON boundary.
    pub fn is_strict(&self) -> bool {
        self.config.strict_typing()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl.load(Ordering::SeqCst)
    }

    /// Sets the default TTL in seconds; negative values are rejected.
    pub fn set_default_ttl(&self, seconds: i64) -> Result<()> {
        let seconds = ttl::default_from_seconds(seconds)?;
        self.default_ttl.store(seconds, Ordering::SeqCst);
        Ok(())
    }

    /// Sets the default TTL from an interval; negative intervals are rejected.
    pub fn set_default_interval(&self, interval: Duration) -> Result<()> {
        let seconds = ttl::default_from_interval(interval)?;
        self.default_ttl.store(seconds, Ordering::SeqCst);
        Ok(())
    }

    // == Key And TTL Resolution ==
    /// Returns the internal key the driver sees for `key`.
    pub fn real_key(&self, key: &str) -> Result<String> {
        derive_key(&CacheKey::parse(key)?, &self.config)
    }

    /// Resolves a TTL spec into the seconds handed to the driver.
    pub fn ttl_seconds(&self, ttl: &TtlSpec) -> Result<u64> {
        ttl::normalize(ttl, Utc::now().timestamp(), self.default_ttl())
    }

    fn real_keys<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<(String, String)>> {
        keys.into_iter()
            .map(|key| {
                let key = key.as_ref();
                Ok((key.to_string(), self.real_key(key)?))
            })
            .collect()
    }

    fn active_driver(&self) -> Option<&D> {
        if self.is_enabled() {
            self.driver.as_ref()
        } else {
            None
        }
    }

    // == Payload Handling ==
    fn wrap<T: Serialize + ?Sized>(&self, value: &T) -> Result<Payload> {
        match &self.envelope {
            Some(envelope) => Ok(Payload::Sealed(envelope.seal(value)?)),
            None => Ok(Payload::Plain(payload::encode(value)?)),
        }
    }

    fn unwrap_payload<T: DeserializeOwned>(&self, payload: Payload) -> Option<T> {
        match (&self.envelope, payload) {
            (Some(envelope), Payload::Sealed(sealed)) => envelope.open_value(&sealed),
            (None, Payload::Plain(bytes)) => payload::decode(&bytes),
            (Some(_), Payload::Plain(_)) => {
                warn!("Ignoring unsealed payload while encryption is enabled");
                None
            }
            (None, Payload::Sealed(_)) => {
                warn!("Ignoring sealed payload while encryption is disabled");
                None
            }
        }
    }

    fn fetch<T: DeserializeOwned>(&self, real_key: &str) -> Option<T> {
        let driver = self.active_driver()?;
        let payload = driver.fetch(real_key)?;
        self.unwrap_payload(payload)
    }

    fn store(&self, driver: &D, real_key: &str, payload: Payload, ttl_seconds: u64) -> bool {
        let stored = driver.store(real_key, payload, ttl_seconds);
        if !stored {
            warn!("Driver failed to store {}", real_key);
        }
        stored
    }

    // == Get ==
    /// Fetches a value. Misses, disabled facades, and payloads that fail to
    /// open or deserialize all yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let real_key = self.real_key(key)?;
        let value = self.fetch(&real_key);
        debug!("get {} -> {}", real_key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    /// Fetches a value, returning `default` on a miss.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    // == Set ==
    /// Stores a value. Returns `false` when disabled or when the driver fails.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: impl Into<TtlSpec>,
    ) -> Result<bool> {
        let real_key = self.real_key(key)?;
        let ttl_seconds = self.ttl_seconds(&ttl.into())?;
        let Some(driver) = self.active_driver() else {
            return Ok(false);
        };
        let payload = self.wrap(value)?;
        debug!("set {} ttl={}s", real_key, ttl_seconds);
        Ok(self.store(driver, &real_key, payload, ttl_seconds))
    }

    // == Delete ==
    /// Deletes a value. Returns the driver's verdict, or `false` when disabled.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let real_key = self.real_key(key)?;
        let Some(driver) = self.active_driver() else {
            return Ok(false);
        };
        debug!("delete {}", real_key);
        Ok(driver.delete(&real_key))
    }

    // == Has ==
    /// Advisory presence check. Racy: never use it to guard get-or-create.
    pub fn has(&self, key: &str) -> Result<bool> {
        let real_key = self.real_key(key)?;
        Ok(self.active_driver().is_some_and(|driver| driver.has(&real_key)))
    }

    // == Clear ==
    /// Removes every record under this facade's prefix.
    pub fn clear(&self) -> bool {
        let Some(driver) = self.active_driver() else {
            return false;
        };
        info!("Clearing records under {}", self.config.prefix().as_str());
        driver.clear(self.config.prefix().as_str())
    }

    /// Removes every record in the driver, whatever its prefix.
    pub fn clear_all(&self) -> bool {
        let Some(driver) = self.active_driver() else {
            return false;
        };
        info!("Clearing all records");
        driver.clear_all()
    }

    // == Batch Operations ==
    /// Fetches several values keyed by the user keys supplied. Every key is
    /// validated before the driver is consulted; misses map to `default`.
    pub fn get_multiple<T, K>(
        &self,
        keys: impl IntoIterator<Item = K>,
        default: T,
    ) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned + Clone,
        K: AsRef<str>,
    {
        let resolved = self.real_keys(keys)?;
        Ok(resolved
            .into_iter()
            .map(|(key, real_key)| {
                let value = self.fetch(&real_key).unwrap_or_else(|| default.clone());
                (key, value)
            })
            .collect())
    }

    /// Stores several values with one TTL. Stops at the first driver failure
    /// and returns `false`; earlier pairs stay stored.
    pub fn set_multiple<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
        ttl: impl Into<TtlSpec>,
    ) -> Result<bool>
    where
        K: AsRef<str>,
        V: Serialize,
    {
        let mut resolved = Vec::new();
        for (key, value) in pairs {
            resolved.push((self.real_key(key.as_ref())?, value));
        }
        let ttl_seconds = self.ttl_seconds(&ttl.into())?;
        let Some(driver) = self.active_driver() else {
            return Ok(false);
        };

        for (real_key, value) in resolved {
            let payload = self.wrap(&value)?;
            if !self.store(driver, &real_key, payload, ttl_seconds) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Deletes several values. Attempts every key; `false` if any deletion failed.
    pub fn delete_multiple<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> Result<bool> {
        let resolved = self.real_keys(keys)?;
        let Some(driver) = self.active_driver() else {
            return Ok(false);
        };
        Ok(resolved
            .iter()
            .fold(true, |all, (_, real_key)| driver.delete(real_key) && all))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryDriver, SecretKey};
    use crate::error::CacheError;

    const TEST_SECRET: &str = "c2060408cf4602ec2013c6aa77654b6ed1ad41cd0fcdce97ab067f4e971a7605";

    fn sealed_config() -> CacheConfig {
        CacheConfig::default().with_secret_key(SecretKey::parse(TEST_SECRET.as_bytes()).unwrap())
    }

    #[test]
    fn test_disabled_facade_never_enables() {
        let cache = SimpleCache::<MemoryDriver>::disabled(CacheConfig::default()).unwrap();
        assert!(!cache.is_enabled());
        assert!(!cache.set_enabled(true));
        assert!(!cache.set("key", "value", None::<i64>).unwrap());
        assert_eq!(cache.get::<String>("key").unwrap(), None);
        assert!(!cache.clear());
    }

    #[test]
    fn test_switched_off_facade_leaves_driver_alone() {
        let cache = SimpleCache::new(MemoryDriver::new(), CacheConfig::default()).unwrap();
        assert!(cache.set("key", "value", 0).unwrap());
        assert!(!cache.set_enabled(false));

        assert_eq!(cache.get_or("key", "default".to_string()).unwrap(), "default");
        assert!(!cache.delete("key").unwrap());
        assert!(!cache.has("key").unwrap());
        assert_eq!(cache.driver().unwrap().len(), 1);
        assert_eq!(cache.driver().unwrap().stats().hits, 0);

        assert!(cache.set_enabled(true));
        assert_eq!(cache.get::<String>("key").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_disabled_facade_still_validates_keys() {
        let cache = SimpleCache::<MemoryDriver>::disabled(CacheConfig::default()).unwrap();
        assert!(matches!(cache.get::<String>("bad{key}"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.delete(""), Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_unsealed_payload_reads_as_miss_when_encrypted() {
        let cache = SimpleCache::new(MemoryDriver::new(), sealed_config()).unwrap();
        let real_key = cache.real_key("planted").unwrap();
        let driver = cache.driver().unwrap();
        driver.store(&real_key, Payload::Plain(payload::encode("plain").unwrap()), 0);

        assert_eq!(cache.get::<String>("planted").unwrap(), None);
    }

    #[test]
    fn test_sealed_payload_reads_as_miss_when_unencrypted() {
        let sealed = SimpleCache::new(MemoryDriver::new(), sealed_config()).unwrap();
        let envelope = sealed.wrap("sealed").unwrap();

        let cache = SimpleCache::new(MemoryDriver::new(), CacheConfig::default()).unwrap();
        let real_key = cache.real_key("planted").unwrap();
        cache.driver().unwrap().store(&real_key, envelope, 0);

        assert_eq!(cache.get::<String>("planted").unwrap(), None);
    }

    #[test]
    fn test_default_ttl_setters() {
        let cache = SimpleCache::new(MemoryDriver::new(), CacheConfig::default()).unwrap();
        assert_eq!(cache.default_ttl(), 0);

        cache.set_default_ttl(90).unwrap();
        assert_eq!(cache.default_ttl(), 90);
        assert!(cache.set_default_ttl(-1).is_err());
        assert_eq!(cache.default_ttl(), 90);

        cache.set_default_interval(Duration::hours(2)).unwrap();
        assert_eq!(cache.default_ttl(), 7_200);

        assert!(cache.set("key", "value", None::<i64>).unwrap());
        let real_key = cache.real_key("key").unwrap();
        assert_eq!(cache.driver().unwrap().entry(&real_key).unwrap().ttl_seconds, 7_200);
    }

    #[test]
    fn test_reports_cipher() {
        let plain = SimpleCache::new(MemoryDriver::new(), CacheConfig::default()).unwrap();
        assert!(!plain.is_encrypted());
        assert_eq!(plain.cipher(), None);

        let sealed =
            SimpleCache::with_cipher(MemoryDriver::new(), sealed_config(), Cipher::ChaCha20Poly1305)
                .unwrap();
        assert!(sealed.is_encrypted());
        assert_eq!(sealed.cipher(), Some(Cipher::ChaCha20Poly1305));
    }
}
