//! Configuration Module
//!
//! Loads raw settings from environment variables or a JSON file and validates
//! them into the [`CacheConfig`] the facade runs with.

use std::env;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use zeroize::Zeroize;

use crate::cache::{
    ttl, KeyPrefix, Salt, SecretKey, DEFAULT_PREFIX, DEFAULT_SALT,
};
use crate::error::{CacheError, Result};

/// Environment variable naming a JSON configuration file
pub const CONFIG_FILE_VAR: &str = "CACHE_CONFIG_FILE";

/// Raw server and cache settings.
///
/// All values can be configured via environment variables or a JSON file.
/// Missing fields fall back to defaults.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Salt mixed into key hashes (at least 8 characters)
    pub salt: String,
    /// Internal key namespace (3-32 alphanumeric characters)
    pub prefix: String,
    /// Default TTL in seconds; 0 leaves expiry to the driver
    pub default_ttl: i64,
    /// Reject loosely typed keys and TTLs at the JSON boundary
    pub strict_typing: bool,
    /// 64 hex characters (or 32 raw bytes) enabling encryption
    pub secret_key: Option<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SALT` - Key hash salt (default: built-in salt)
    /// - `CACHE_PREFIX` - Internal key prefix (default: DEFAULT)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 0)
    /// - `STRICT_TYPING` - `true`/`false` (default: false)
    /// - `CACHE_SECRET_KEY` - Secret key; encryption is off when unset
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            salt: env::var("CACHE_SALT").unwrap_or(defaults.salt),
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            strict_typing: env::var("STRICT_TYPING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strict_typing),
            secret_key: env::var("CACHE_SECRET_KEY").ok().filter(|v| !v.is_empty()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    /// `Setup` when the file is missing, unreadable, or not valid JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CacheError::Setup(format!(
                "The specified configuration file {} could not be found.",
                path.display()
            )));
        }
        let mut json = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Setup(format!(
                "The specified configuration file {} could not be read: {}",
                path.display(),
                e
            ))
        })?;
        let parsed = serde_json::from_str(&json).map_err(|e| {
            CacheError::Setup(format!(
                "The file {} did not contain valid JSON data: {}",
                path.display(),
                e
            ))
        });
        json.zeroize();
        parsed
    }

    /// Loads from the file named by `CACHE_CONFIG_FILE`, else from the environment.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_FILE_VAR) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::from_env()),
        }
    }

    /// Validates the cache settings.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = CacheConfig::default()
            .with_salt(Salt::new(&self.salt)?)
            .with_prefix(KeyPrefix::new(&self.prefix)?)
            .with_default_ttl(ttl::default_from_seconds(self.default_ttl)?)
            .with_strict_typing(self.strict_typing);
        if let Some(secret) = &self.secret_key {
            config = config.with_secret_key(SecretKey::parse(secret.as_bytes())?);
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: 0,
            strict_typing: false,
            secret_key: None,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("salt", &"<redacted>")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .field("strict_typing", &self.strict_typing)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("server_port", &self.server_port)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

// == Cache Config ==
/// Validated settings the facade runs with.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    salt: Salt,
    prefix: KeyPrefix,
    default_ttl: u64,
    strict_typing: bool,
    secret_key: Option<SecretKey>,
}

impl CacheConfig {
    pub fn with_salt(mut self, salt: Salt) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_prefix(mut self, prefix: KeyPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    pub fn with_strict_typing(mut self, strict: bool) -> Self {
        self.strict_typing = strict;
        self
    }

    pub fn with_secret_key(mut self, key: SecretKey) -> Self {
        self.secret_key = Some(key);
        self
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn strict_typing(&self) -> bool {
        self.strict_typing
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }
}
