//! Table Bootstrap
//!
//! Makes sure the cache table exists before first use and resolves the
//! name of its hash key attribute.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_KEY_ATTRIBUTE, TTL_ATTRIBUTE};
use crate::error::{CacheError, Result};
use crate::store::{ItemStore, TableStatus};

/// How long to wait for a freshly created table to become active.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapOptions {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

/// Returns the table's hash key attribute, creating the table if missing.
///
/// A created table is keyed by [`DEFAULT_KEY_ATTRIBUTE`] with on-demand
/// billing. Storage-level TTL is then enabled on `ttl`, best-effort.
pub async fn ensure_table(store: &dyn ItemStore, table: &str, options: BootstrapOptions) -> Result<String> {
    if let Some(description) = store.describe_table(table).await? {
        debug!("Table '{}' already exists", table);
        let key = description.hash_key().unwrap_or(DEFAULT_KEY_ATTRIBUTE);
        return Ok(key.to_string());
    }

    info!("Table '{}' does not exist, creating...", table);
    store.create_table(table, DEFAULT_KEY_ATTRIBUTE).await?;
    info!("Table '{}' created successfully", table);

    wait_for_active(store, table, options).await?;

    match store.enable_time_to_live(table, TTL_ATTRIBUTE).await {
        Ok(()) => info!("TTL enabled on table '{}'", table),
        Err(e) => warn!("Could not enable TTL on table '{}': {}", table, e),
    }

    Ok(DEFAULT_KEY_ATTRIBUTE.to_string())
}

async fn wait_for_active(store: &dyn ItemStore, table: &str, options: BootstrapOptions) -> Result<()> {
    for attempt in 1..=options.attempts {
        let status = store.describe_table(table).await?.map(|d| d.status);
        if status == Some(TableStatus::Active) {
            debug!("Table '{}' is now active", table);
            return Ok(());
        }
        debug!(
            "Table '{}' not active yet ({:?}), attempt {}/{}",
            table, status, attempt, options.attempts
        );
        tokio::time::sleep(options.interval).await;
    }

    Err(CacheError::Configuration(format!(
        "Timeout waiting for table '{}' to become active",
        table
    )))
}
