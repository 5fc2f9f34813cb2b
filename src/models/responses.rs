//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheEntry;
use crate::codec::HostValue;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: HostValue,
    /// Decoded size of the stored value
    pub size: u64,
    /// RFC 3339, when recorded
    pub created: Option<String>,
    pub last_modified: Option<String>,
}

impl GetResponse {
    pub fn from_entry(entry: CacheEntry) -> Self {
        Self {
            key: entry.key().to_string(),
            size: entry.size(),
            created: entry.created().map(|t| t.to_rfc3339()),
            last_modified: entry.last_modified().map(|t| t.to_rfc3339()),
            value: entry.into_value(),
        }
    }
}

/// Response body for the SET operation (PUT /set)
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

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
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

/// Response body for GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for GET /values
#[derive(Debug, Clone, Serialize)]
pub struct ValuesResponse {
    pub count: usize,
    pub values: Vec<HostValue>,
}

impl ValuesResponse {
    pub fn new(values: Vec<HostValue>) -> Self {
        Self {
            count: values.len(),
            values,
        }
    }
}

/// Response body for GET /entries
///
/// Each entry is rendered as its info view.
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<HostValue>,
}

impl EntriesResponse {
    pub fn new(entries: &[CacheEntry]) -> Self {
        Self {
            count: entries.len(),
            entries: entries
                .iter()
                .map(|e| HostValue::Map(e.custom_info()))
                .collect(),
        }
    }
}

/// Response body for DELETE /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AttributeValue, Item};

    #[test]
    fn test_get_response_from_entry() {
        let item = Item::from([
            ("value".to_string(), AttributeValue::string("hello")),
            ("createdTime".to_string(), AttributeValue::number(0)),
        ]);
        let resp = GetResponse::from_entry(CacheEntry::new("k", item));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "k");
        assert_eq!(json["value"], "hello");
        assert_eq!(json["size"], 5);
        assert_eq!(json["created"], "1970-01-01T00:00:00+00:00");
        assert!(json["last_modified"].is_null());
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_keys_response_counts() {
        let resp = KeysResponse::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(resp.count, 2);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
