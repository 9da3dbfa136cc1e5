//! Key Derivation Module
//!
//! Validates user supplied cache keys and obfuscates them into fixed-shape
//! internal keys of the form `PREFIX_<hex>`.

use std::fmt;

use blake2::{
    digest::{consts::U16, Mac},
    Blake2bMac,
};
use ripemd::{Digest, Ripemd160};
use serde_json::Value;

use crate::cache::SecretKey;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Constants ==
/// Maximum user key length in bytes, after trimming
pub const MAX_KEY_LENGTH: usize = 255;

/// Characters a user key may never contain
pub const RESERVED_KEY_CHARS: [char; 10] = ['[', ']', '{', '}', '(', ')', '/', '\\', '@', ':'];

/// Characters stripped from both ends of keys, salts and prefixes
pub const TRIMMED_CHARS: [char; 6] = [' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Minimum salt length in bytes, after trimming
pub const MIN_SALT_LENGTH: usize = 8;

/// Salt used when none is configured
pub const DEFAULT_SALT: &str = "6Dxypt3ePw2SM2zYzEVAFkDBQpxbk16z1";

/// Prefix used when none is configured
pub const DEFAULT_PREFIX: &str = "DEFAULT";

fn trim(raw: &str) -> &str {
    raw.trim_matches(&TRIMMED_CHARS[..])
}

// Hex windows taken from the digests. Both are at least 64 bits wide.
const PLAIN_WINDOW: (usize, usize) = (17, 16);
const KEYED_WINDOW: (usize, usize) = (6, 20);

// == Cache Key ==
/// A trimmed, validated user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates a user key.
    ///
    /// # Errors
    /// `InvalidArgument` when the trimmed key is empty, longer than
    /// [`MAX_KEY_LENGTH`] bytes, or contains a reserved character.
    pub fn parse(raw: &str) -> Result<Self> {
        let key = trim(raw);
        if key.is_empty() {
            return Err(CacheError::empty_key());
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::key_too_long(key.len()));
        }
        if key.contains(&RESERVED_KEY_CHARS[..]) {
            return Err(CacheError::invalid_key_character(key));
        }
        Ok(Self(key.to_string()))
    }

    /// Coerces a JSON value into a key.
    ///
    /// Strings are always accepted. Numbers are stringified unless `strict`
    /// is set. Anything else is a type error.
    pub fn from_json(value: &Value, strict: bool) -> Result<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) if !strict => Self::parse(&n.to_string()),
            other => Err(CacheError::TypeError(format!(
                "The cache key must be a string. You supplied type {}.",
                json_type_name(other)
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Salt ==
/// Salt mixed into every key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(String);

impl Salt {
    pub fn new(raw: &str) -> Result<Self> {
        let salt = trim(raw);
        if salt.len() < MIN_SALT_LENGTH {
            return Err(CacheError::InvalidArgument(format!(
                "The internal key salt must be at least {} characters. You supplied a {} character salt.",
                MIN_SALT_LENGTH,
                salt.len()
            )));
        }
        Ok(Self(salt.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for Salt {
    fn default() -> Self {
        Self(DEFAULT_SALT.to_string())
    }
}

// == Key Prefix ==
/// Namespace prepended to internal keys. Stored with its trailing `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Trims and upper-cases `raw`, then requires 3 to 32 `[A-Z0-9]` characters.
    pub fn new(raw: &str) -> Result<Self> {
        let prefix = trim(raw).to_uppercase();
        if prefix.len() < 3 {
            return Err(CacheError::InvalidArgument(format!(
                "The key prefix must be at least 3 characters. You supplied \"{}\".",
                prefix
            )));
        }
        if prefix.len() > 32 {
            return Err(CacheError::InvalidArgument(format!(
                "The key prefix must not have more than 32 characters. You supplied {}.",
                prefix.len()
            )));
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(CacheError::InvalidArgument(format!(
                "The key prefix can only contain A-Z letters and 0-9 numbers. You supplied: {}",
                prefix
            )));
        }
        Ok(Self(format!("{}_", prefix)))
    }

    /// Prefix including the trailing separator, e.g. `DEFAULT_`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self(format!("{}_", DEFAULT_PREFIX))
    }
}

// == Derivation ==
/// Derives the internal key for `key` under `config`.
///
/// Without a secret the hash is RIPEMD-160 over `salt || key`; with a secret it
/// is a 16-byte keyed BLAKE2b over `key || salt`. A fixed hex window of the
/// digest is appended to the prefix.
pub fn derive_key(key: &CacheKey, config: &CacheConfig) -> Result<String> {
    let hash = weak_hash(key.as_str(), config.salt(), config.secret_key())?;
    Ok(format!("{}{}", config.prefix().as_str(), hash))
}

fn weak_hash(key: &str, salt: &Salt, secret: Option<&SecretKey>) -> Result<String> {
    match secret {
        None => {
            let mut hasher = Ripemd160::new();
            Digest::update(&mut hasher, salt.as_bytes());
            Digest::update(&mut hasher, key.as_bytes());
            let digest_hex = hex::encode(hasher.finalize());
            Ok(window(&digest_hex, PLAIN_WINDOW))
        }
        Some(secret) => {
            let mut mac = Blake2bMac::<U16>::new_with_salt_and_personal(secret.as_bytes(), &[], &[])
                .map_err(|e| CacheError::Setup(format!("keyed hash rejected the secret: {}", e)))?;
            Mac::update(&mut mac, key.as_bytes());
            Mac::update(&mut mac, salt.as_bytes());
            let digest_hex = hex::encode(mac.finalize().into_bytes());
            Ok(window(&digest_hex, KEYED_WINDOW))
        }
    }
}

fn window(hex: &str, (offset, len): (usize, usize)) -> String {
    hex[offset..offset + len].to_string()
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
