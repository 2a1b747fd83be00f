//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or exceeds the maximum key length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A single entry is larger than the whole memory tier
    #[error("Entry too large: '{key}' is {size} bytes, memory tier holds at most {max_size}")]
    EntryTooLarge {
        key: String,
        size: usize,
        max_size: usize,
    },

    /// The durable store failed or is unreachable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The caller-supplied fetcher returned an error
    #[error("Fetch failed for '{key}': {reason}")]
    FetchFailed { key: String, reason: String },

    /// Payload could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request data (e.g. missing fetcher)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in any tier
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::StorageUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::StorageUnavailable(format!("storage task failed: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::InvalidKey("".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (
                CacheError::EntryTooLarge {
                    key: "k".into(),
                    size: 10,
                    max_size: 5,
                },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                CacheError::FetchFailed {
                    key: "k".into(),
                    reason: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::StorageUnavailable("disk".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_entry_too_large_message() {
        let err = CacheError::EntryTooLarge {
            key: "big".into(),
            size: 200,
            max_size: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("big"));
        assert!(msg.contains("200"));
        assert!(msg.contains("100"));
    }
}
