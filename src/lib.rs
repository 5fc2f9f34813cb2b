//! Dynamo Cache - A DynamoDB-backed cache provider
//!
//! Stores cache entries as table items with client-side TTL evaluation,
//! paged enumeration and a process-wide pool of store clients.

pub mod api;
pub mod cache;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod store;

pub use api::AppState;
pub use cache::{CacheEntry, DynamoCache};
pub use config::{Backend, CacheConfig};
pub use error::{CacheError, Result};
pub use pool::{ClientPool, ClientSettings};
