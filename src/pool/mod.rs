//! Client Pool Module
//!
//! Process-wide reuse of live store clients, keyed by credentials and
//! location. A client is rebuilt once it outlives its live timeout.
//!
//! Construction is single-flight per key: callers that find no live client
//! take that key's lock, re-check, and only then build. Unrelated keys never
//! share a lock.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::expiry::current_timestamp_ms;
use crate::error::Result;
use crate::store::StoreHandle;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// The public endpoint; configuring it is the same as configuring no host.
pub const DEFAULT_HOST: &str = "dynamodb.amazonaws.com";

/// Default client lifetime: one hour.
pub const DEFAULT_LIVE_TIMEOUT_MS: i64 = 3_600_000;

// == Client Settings ==
/// Everything needed to build (or find) a client.
#[derive(Clone, Default)]
pub struct ClientSettings {
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
    pub host: Option<String>,
    pub region: Option<String>,
    pub live_timeout_ms: i64,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("region", &self.region)
            .field("live_timeout_ms", &self.live_timeout_ms)
            .finish()
    }
}

impl ClientSettings {
    pub fn pool_key(&self) -> PoolKey {
        PoolKey {
            access_key_id: self.access_key_id.clone().unwrap_or_default(),
            secret_key: self.secret_key.clone().unwrap_or_default(),
            host: self.host.clone().unwrap_or_default(),
            region: self.region.clone().unwrap_or_default(),
        }
    }

    /// The configured region trimmed, or [`DEFAULT_REGION`] when blank.
    pub fn effective_region(&self) -> String {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string()
    }

    /// A custom endpoint URL, when a non-default host is configured.
    ///
    /// Hosts without a scheme get `https://`.
    pub fn endpoint_override(&self) -> Option<String> {
        let host = self.host.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        if host.eq_ignore_ascii_case(DEFAULT_HOST) {
            return None;
        }
        if host.starts_with("http://") || host.starts_with("https://") {
            Some(host.to_string())
        } else {
            Some(format!("https://{}", host))
        }
    }
}

// == Pool Key ==
/// Identity of a pooled client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    access_key_id: String,
    secret_key: String,
    host: String,
    region: String,
}

impl fmt::Debug for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:<redacted>:{}:{}", self.access_key_id, self.host, self.region)
    }
}

// == Client Factory ==
/// Builds a new client for a set of settings.
pub trait ClientFactory: Send + Sync {
    fn create(&self, settings: &ClientSettings) -> Result<StoreHandle>;
}

#[derive(Clone)]
struct PooledClient {
    client: StoreHandle,
    /// Epoch milliseconds
    created_at: i64,
    live_timeout_ms: i64,
}

impl PooledClient {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.created_at + self.live_timeout_ms < now_ms
    }
}

// == Client Pool ==
/// Keyed cache of live clients, shared by every cache instance in a process.
///
/// Replaced or evicted clients are only dropped from the pool. Callers still
/// holding a handle keep a working client until they drop it.
pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    clients: DashMap<PoolKey, PooledClient>,
    locks: DashMap<PoolKey, Arc<Mutex<()>>>,
}

impl ClientPool {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    // == Acquire ==
    /// Returns a live client for the settings, building one if needed.
    pub fn acquire(&self, settings: &ClientSettings) -> Result<StoreHandle> {
        self.acquire_at(settings, current_timestamp_ms())
    }

    /// Same as [`Self::acquire`] with an explicit current time (epoch millis).
    pub fn acquire_at(&self, settings: &ClientSettings, now_ms: i64) -> Result<StoreHandle> {
        let key = settings.pool_key();
        debug!(
            "Requesting client for region: {:?}, host: {:?}",
            settings.region, settings.host
        );

        if let Some(client) = self.live_client(&key, now_ms) {
            debug!("Reusing existing client for region: {:?}", settings.region);
            return Ok(client);
        }

        let lock = self.locks.entry(key.clone()).or_default().clone();
        let _guard = lock.lock();

        // another caller may have built it while we waited
        if let Some(client) = self.live_client(&key, now_ms) {
            return Ok(client);
        }

        if self.clients.contains_key(&key) {
            info!(
                "Existing client expired, creating new one for region: {}",
                settings.effective_region()
            );
        } else {
            info!("Creating new client for region: {}", settings.effective_region());
        }

        let client = self.factory.create(settings)?;
        self.clients.insert(
            key,
            PooledClient {
                client: client.clone(),
                created_at: now_ms,
                live_timeout_ms: settings.live_timeout_ms,
            },
        );
        Ok(client)
    }

    fn live_client(&self, key: &PoolKey, now_ms: i64) -> Option<StoreHandle> {
        self.clients
            .get(key)
            .filter(|pooled| !pooled.is_expired(now_ms))
            .map(|pooled| pooled.client.clone())
    }

    // == Release ==
    /// Removes the client for the settings, returning it if one was pooled.
    pub fn evict(&self, settings: &ClientSettings) -> Option<StoreHandle> {
        let evicted = self.clients.remove(&settings.pool_key()).map(|(_, p)| p.client);
        if evicted.is_some() {
            debug!("Releasing client for region: {}", settings.effective_region());
        }
        evicted
    }

    /// Drops every pooled client. Returns how many were released.
    pub fn close_all(&self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        info!("Released {} pooled clients", count);
        count
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
