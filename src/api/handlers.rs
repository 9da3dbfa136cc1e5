//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. The facade is
//! synchronous and in-memory, so handlers call it directly.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{MemoryDriver, SimpleCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteMultipleResponse, DeleteResponse, GetMultipleResponse, GetResponse,
    HasResponse, HealthResponse, KeysRequest, SetMultipleRequest, SetMultipleResponse,
    SetRequest, SetResponse, StatsResponse,
};

/// Facade type served over HTTP.
pub type ServerCache = SimpleCache<Arc<MemoryDriver>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache facade
    pub cache: Arc<ServerCache>,
    /// The driver behind the facade, shared with the cleanup task
    pub driver: Arc<MemoryDriver>,
}

impl AppState {
    /// Wraps `driver` in a facade configured by `config`.
    pub fn new(driver: Arc<MemoryDriver>, config: CacheConfig) -> Result<Self> {
        let cache = SimpleCache::new(Arc::clone(&driver), config)?;
        Ok(Self {
            cache: Arc::new(cache),
            driver,
        })
    }

    /// Creates a state over a fresh in-memory driver.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryDriver::new()), config)
    }
}

/// Handler for PUT /set
///
/// Stores any JSON value under the key with an optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Coerce key and TTL under the facade's typing mode
    let (key, ttl) = req.parse(state.cache.is_strict())?;

    // A driver refusal surfaces as 503, not as a client error
    if !state.cache.set(key.as_str(), &req.value, ttl)? {
        return Err(CacheError::Unavailable(format!(
            "Key '{}' could not be stored",
            key
        )));
    }

    Ok(Json(SetResponse::new(key.as_str())))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<Value>(&key)? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key)? {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HasResponse>> {
    let exists = state.cache.has(&key)?;
    Ok(Json(HasResponse { key, exists }))
}

/// Handler for POST /get_multiple
pub async fn get_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<GetMultipleResponse>> {
    // Every key is validated before the driver is touched
    let keys = req.parse(state.cache.is_strict())?;
    let values: HashMap<String, Value> = state
        .cache
        .get_multiple(keys.iter().map(|key| key.as_str()), Value::Null)?;

    Ok(Json(GetMultipleResponse { values }))
}

/// Handler for PUT /set_multiple
pub async fn set_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<SetMultipleRequest>,
) -> Result<Json<SetMultipleResponse>> {
    let ttl = req.ttl(state.cache.is_strict())?;
    let stored = state.cache.set_multiple(req.pairs.iter(), ttl)?;

    Ok(Json(SetMultipleResponse { stored }))
}

/// Handler for POST /delete_multiple
pub async fn delete_multiple_handler(
    State(state): State<AppState>,
    Json(req): Json<KeysRequest>,
) -> Result<Json<DeleteMultipleResponse>> {
    let keys = req.parse(state.cache.is_strict())?;
    let deleted = state
        .cache
        .delete_multiple(keys.iter().map(|key| key.as_str()))?;

    Ok(Json(DeleteMultipleResponse { deleted }))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse {
        cleared: state.cache.clear(),
    })
}

/// Handler for POST /clear_all
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse {
        cleared: state.cache.clear_all(),
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    // Driver counters plus the facade's own settings
    let stats = state.driver.stats();
    Json(StatsResponse::new(
        &stats,
        state.cache.cipher(),
        state.cache.default_ttl(),
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.is_enabled()))
}
