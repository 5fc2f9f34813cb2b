//! Cache Module
//!
//! The cache provider over a DynamoDB-style table: read-side entries,
//! client-side TTL evaluation, paged enumeration and table bootstrap.

mod bootstrap;
mod entry;
pub mod expiry;
mod provider;
mod scan;


// Re-export public types
pub use bootstrap::{ensure_table, BootstrapOptions};
pub use entry::CacheEntry;
pub use provider::DynamoCache;
pub use scan::{EntryFilter, KeyFilter, ScanFilter, ScanPaginator};

// == Item Attributes ==
/// Codec-encoded cached value
pub const VALUE_ATTRIBUTE: &str = "value";

/// Epoch millis, written once
pub const CREATED_TIME_ATTRIBUTE: &str = "createdTime";

/// Epoch millis, overwritten on every put
pub const UPDATED_TIME_ATTRIBUTE: &str = "updatedTime";

/// Epoch seconds after which the item is expired
pub const TTL_ATTRIBUTE: &str = "ttl";

/// Configured idle timeout, stored verbatim
pub const IDLE_ATTRIBUTE: &str = "idle";

/// Configured live time, stored verbatim
pub const UNTIL_ATTRIBUTE: &str = "until";

/// Hash key name used when the table has to be created
pub const DEFAULT_KEY_ATTRIBUTE: &str = "cacheKey";
