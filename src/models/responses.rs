//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, Cipher};

/// Response body for GET /get/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /del/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /has/:key
#[derive(Debug, Clone, Serialize)]
pub struct HasResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for POST /get_multiple; misses are `null`
#[derive(Debug, Clone, Serialize)]
pub struct GetMultipleResponse {
    pub values: HashMap<String, Value>,
}

/// Response body for PUT /set_multiple
#[derive(Debug, Clone, Serialize)]
pub struct SetMultipleResponse {
    pub stored: bool,
}

/// Response body for POST /delete_multiple
#[derive(Debug, Clone, Serialize)]
pub struct DeleteMultipleResponse {
    pub deleted: bool,
}

/// Response body for POST /clear and POST /clear_all
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of driver fetches that found a live record
    pub hits: u64,
    /// Number of driver fetches that found nothing
    pub misses: u64,
    /// Number of records dropped on expiry
    pub expirations: u64,
    /// Current number of records in the driver
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Whether values are sealed before storage
    pub encrypted: bool,
    /// AEAD cipher in use, if any
    pub cipher: Option<Cipher>,
    /// Default TTL in seconds
    pub default_ttl: u64,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, cipher: Option<Cipher>, default_ttl: u64) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            encrypted: cipher.is_some(),
            cipher,
            default_ttl,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Whether the facade is switched on
    pub enabled: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(enabled: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            enabled,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
