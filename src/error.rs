//! Error types for the cache provider
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
/// Unified error type for the cache provider.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent, or present but expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Required setup value missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any failure reported by the backing store
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds the not-found error for a key in a table.
    pub fn missing_key(key: &str, table: &str) -> Self {
        CacheError::NotFound(format!("key [{}] does not exist in table [{}]", key, table))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Transport(_) => StatusCode::BAD_GATEWAY,
            CacheError::Configuration(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache provider.
pub type Result<T> = std::result::Result<T, CacheError>;
