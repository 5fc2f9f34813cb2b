//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Maximum accepted key length, in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Request body for the SET operation (PUT /set)
///
/// `idle` and `until` are in milliseconds. Either one makes the entry expire.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: serde_json::Value,
    #[serde(default)]
    pub idle: Option<i64>,
    #[serde(default)]
    pub until: Option<i64>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Query string for the enumeration endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrefixQuery {
    /// Only keys starting with this prefix are returned
    #[serde(default)]
    pub prefix: Option<String>,
}
