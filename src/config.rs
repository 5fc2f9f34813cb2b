//! Configuration Module
//!
//! Loads cache configuration from the host engine's argument map or from
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::error::{CacheError, Result};
use crate::pool::{ClientSettings, DEFAULT_LIVE_TIMEOUT_MS};

/// Table used when none is configured in the environment.
pub const DEFAULT_TABLE_NAME: &str = "dynamo-cache";

// == Backend ==
/// Which item store the binary talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    DynamoDb,
    /// Process-local store, for development and tests
    Memory,
}

impl FromStr for Backend {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(Backend::DynamoDb),
            "memory" => Ok(Backend::Memory),
            other => Err(CacheError::Configuration(format!("unknown backend [{}]", other))),
        }
    }
}

/// Cache configuration parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Table holding the cache items
    pub table_name: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint host, e.g. a local DynamoDB
    pub host: Option<String>,
    pub region: Option<String>,
    /// Lifetime of a pooled client in milliseconds
    pub live_timeout_ms: i64,
    pub backend: Backend,
    /// HTTP server port
    pub server_port: u16,
}

impl CacheConfig {
    /// Creates a config from cache arguments.
    ///
    /// Keys are matched case-insensitively and several aliases are accepted
    /// per setting; the first non-blank alias wins:
    /// - table: `tableName`, `table`
    /// - access key: `accessKeyId`, `accessKey`, `awsAccessKeyId`
    /// - secret: `secretKey`, `awsSecretKey`
    /// - region: `region`, `location`
    /// - host: `host`, `server`, `endpoint`
    /// - `liveTimeout` in milliseconds; unparsable values fall back to one hour
    pub fn from_arguments(arguments: &HashMap<String, String>) -> Result<Self> {
        let lookup: HashMap<String, &str> = arguments
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let first = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| lookup.get(&alias.to_ascii_lowercase()))
                .map(|v| v.to_string())
        };

        let table_name = first(&["tableName", "table"]).ok_or_else(|| {
            CacheError::Configuration(
                "missing table name, define [tableName] in the cache arguments".to_string(),
            )
        })?;

        let live_timeout_ms = match first(&["liveTimeout"]) {
            Some(v) => v.parse().unwrap_or_else(|_| {
                warn!(
                    "Invalid liveTimeout [{}], using {}ms",
                    v, DEFAULT_LIVE_TIMEOUT_MS
                );
                DEFAULT_LIVE_TIMEOUT_MS
            }),
            None => DEFAULT_LIVE_TIMEOUT_MS,
        };

        Ok(Self {
            table_name,
            access_key_id: first(&["accessKeyId", "accessKey", "awsAccessKeyId"]),
            secret_access_key: first(&["secretKey", "awsSecretKey"]),
            host: first(&["host", "server", "endpoint"]),
            region: first(&["region", "location"]),
            live_timeout_ms,
            ..Self::default()
        })
    }

    /// Creates a new config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DYNAMO_TABLE` - Table name (default: dynamo-cache)
    /// - `DYNAMO_ACCESS_KEY_ID` / `DYNAMO_SECRET_KEY` - Static credentials
    /// - `DYNAMO_HOST` - Custom endpoint host
    /// - `DYNAMO_REGION` - Region (default: us-east-1)
    /// - `DYNAMO_LIVE_TIMEOUT` - Client lifetime in milliseconds (default: 3600000)
    /// - `DYNAMO_BACKEND` - `dynamodb` or `memory` (default: dynamodb)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            table_name: non_blank_var("DYNAMO_TABLE").unwrap_or(defaults.table_name),
            access_key_id: non_blank_var("DYNAMO_ACCESS_KEY_ID"),
            secret_access_key: non_blank_var("DYNAMO_SECRET_KEY"),
            host: non_blank_var("DYNAMO_HOST"),
            region: non_blank_var("DYNAMO_REGION"),
            live_timeout_ms: env::var("DYNAMO_LIVE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.live_timeout_ms),
            backend: env::var("DYNAMO_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Settings the client pool keys and builds clients from.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            access_key_id: self.access_key_id.clone(),
            secret_key: self.secret_access_key.clone(),
            host: self.host.clone(),
            region: self.region.clone(),
            live_timeout_ms: self.live_timeout_ms,
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            access_key_id: None,
            secret_access_key: None,
            host: None,
            region: None,
            live_timeout_ms: DEFAULT_LIVE_TIMEOUT_MS,
            backend: Backend::default(),
            server_port: 3000,
        }
    }
}
