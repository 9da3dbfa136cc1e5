//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache facade and its HTTP front.
///
/// Decryption failures are deliberately absent: a payload that cannot be
/// opened is reported to the caller as a cache miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Input has the wrong shape (non-string key, float TTL, ...)
    #[error("Type error: {0}")]
    TypeError(String),

    /// Input has the right shape but an unacceptable value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Value could not be serialized for storage
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Broken deployment: configuration, cipher or key setup
    #[error("Invalid setup: {0}")]
    Setup(String),

    /// The nonce counter failed to advance
    #[error("The nonce failed to increment; refusing to encrypt")]
    NonceReuse,

    /// Key not present in the cache (HTTP front only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The storage driver reported a failure (HTTP front only)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    pub(crate) fn empty_key() -> Self {
        Self::InvalidArgument(
            "The cache key you supplied was an empty string. It must contain at least one character."
                .to_string(),
        )
    }

    pub(crate) fn key_too_long(len: usize) -> Self {
        Self::InvalidArgument(format!(
            "Cache keys may not be longer than 255 characters. Your key is {} characters long.",
            len
        ))
    }

    pub(crate) fn invalid_key_character(key: &str) -> Self {
        Self::InvalidArgument(format!(
            "Cache keys may not contain any of the following characters: \"[]{{}}()/\\@:\" but your key \"{}\" does.",
            key
        ))
    }

    pub(crate) fn negative_ttl(seconds: i64) -> Self {
        Self::InvalidArgument(format!(
            "The TTL can not be a negative number. You supplied {}.",
            seconds
        ))
    }

    pub(crate) fn date_in_past(input: &str) -> Self {
        Self::InvalidArgument(format!(
            "The cache expiration can not be in the past. You supplied {}.",
            input
        ))
    }

    pub(crate) fn interval_in_past() -> Self {
        Self::InvalidArgument("The cache expiration can not be in the past.".to_string())
    }

    pub(crate) fn invalid_ttl(input: &str) -> Self {
        Self::InvalidArgument(format!(
            "The cache expiration must be a TTL in seconds, seconds from UNIX epoch, \
             an interval, or an expiration date string. You supplied: {}",
            input
        ))
    }

    /// Returns true for errors that signal a broken deployment rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::Setup(_) | CacheError::NonceReuse)
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::TypeError(_)
            | CacheError::InvalidArgument(_)
            | CacheError::Serialization(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Setup(_) | CacheError::NonceReuse => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache facade.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CacheError::NonceReuse.is_fatal());
        assert!(CacheError::Setup("x".into()).is_fatal());
        assert!(!CacheError::empty_key().is_fatal());
        assert!(!CacheError::TypeError("x".into()).is_fatal());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::invalid_ttl("soon"), StatusCode::BAD_REQUEST),
            (CacheError::TypeError("float".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::Unavailable("k".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::NonceReuse, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_reserved_character_message_lists_set() {
        let msg = CacheError::invalid_key_character("bad{key}").to_string();
        assert!(msg.contains("[]{}()/\\@:"));
        assert!(msg.contains("bad{key}"));
    }
}
