//! Request DTOs for the cache server API
//!
//! Keys and TTLs are kept as raw JSON so the facade's typing rules decide
//! what is accepted.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::cache::{CacheKey, TtlSpec};
use crate::error::Result;

/// Request body for PUT /set
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key (string, or number outside strict mode)
    pub key: Value,
    /// Any JSON value
    pub value: Value,
    /// Seconds, timestamp or date string; null/absent uses the default TTL
    #[serde(default)]
    pub ttl: Value,
}

impl SetRequest {
    /// Validates key and TTL under the given typing mode.
    pub fn parse(&self, strict: bool) -> Result<(CacheKey, TtlSpec)> {
        let key = CacheKey::from_json(&self.key, strict)?;
        let ttl = TtlSpec::from_json(&self.ttl, strict)?;
        Ok((key, ttl))
    }
}

/// Request body for POST /get_multiple and POST /delete_multiple
#[derive(Debug, Clone, Deserialize)]
pub struct KeysRequest {
    pub keys: Vec<Value>,
}

impl KeysRequest {
    pub fn parse(&self, strict: bool) -> Result<Vec<CacheKey>> {
        self.keys
            .iter()
            .map(|key| CacheKey::from_json(key, strict))
            .collect()
    }
}

/// Request body for PUT /set_multiple
#[derive(Debug, Clone, Deserialize)]
pub struct SetMultipleRequest {
    /// Key/value pairs; JSON object keys are always strings
    pub pairs: Map<String, Value>,
    #[serde(default)]
    pub ttl: Value,
}

impl SetMultipleRequest {
    pub fn ttl(&self, strict: bool) -> Result<TtlSpec> {
        TtlSpec::from_json(&self.ttl, strict)
    }
}
