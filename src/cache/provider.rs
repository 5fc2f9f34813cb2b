//! Cache Provider
//!
//! The cache operations over one table. Every call acquires its client from
//! the shared pool, so an expired client is replaced transparently.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::bootstrap::{ensure_table, BootstrapOptions};
use crate::cache::expiry::{compute_expiration, current_timestamp_ms, is_valid};
use crate::cache::scan::{EntryFilter, KeyFilter, ScanFilter, ScanPaginator};
use crate::cache::{
    CacheEntry, CREATED_TIME_ATTRIBUTE, IDLE_ATTRIBUTE, TTL_ATTRIBUTE, UNTIL_ATTRIBUTE,
    UPDATED_TIME_ATTRIBUTE, VALUE_ATTRIBUTE,
};
use crate::codec::{encode, encode_object, AttributeValue, HostMap, HostValue, Item};
use crate::command;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::pool::{ClientPool, ClientSettings};
use crate::store::{ItemUpdate, ReturnValues, StoreHandle};

// == Dynamo Cache ==
/// A cache backed by one DynamoDB table.
pub struct DynamoCache {
    table: String,
    key_attribute: String,
    settings: ClientSettings,
    pool: Arc<ClientPool>,
}

impl DynamoCache {
    // == Constructor ==
    /// Validates the configuration and bootstraps the table.
    pub async fn init(config: &CacheConfig, pool: Arc<ClientPool>) -> Result<Self> {
        Self::init_with(config, pool, BootstrapOptions::default()).await
    }

    /// Same as [`Self::init`] with explicit bootstrap polling.
    pub async fn init_with(config: &CacheConfig, pool: Arc<ClientPool>, options: BootstrapOptions) -> Result<Self> {
        let table = config.table_name.trim();
        if table.is_empty() {
            return Err(CacheError::Configuration(
                "missing table name, define [tableName] in the cache arguments".to_string(),
            ));
        }

        let settings = config.client_settings();
        let client = pool.acquire(&settings)?;
        let key_attribute = ensure_table(client.as_ref(), table, options).await?;
        info!(
            "Cache ready on table '{}' (key attribute '{}', region {})",
            table,
            key_attribute,
            settings.effective_region()
        );

        Ok(Self {
            table: table.to_string(),
            key_attribute,
            settings,
            pool,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of the table's hash key attribute.
    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    fn client(&self) -> Result<StoreHandle> {
        self.pool.acquire(&self.settings)
    }

    fn key_item(&self, key: &str) -> Item {
        Item::from([(self.key_attribute.clone(), AttributeValue::string(key))])
    }

    // == Get ==
    /// Fetches a live entry. Absent and expired keys are both `NotFound`.
    pub async fn get_entry(&self, key: &str) -> Result<CacheEntry> {
        let client = self.client()?;
        match client.get_item(&self.table, self.key_item(key), None).await? {
            Some(item) if is_valid(&item) => Ok(CacheEntry::new(key, item)),
            _ => Err(CacheError::missing_key(key, &self.table)),
        }
    }

    /// Like [`Self::get_entry`], returning `default` on any failure.
    pub async fn get_entry_or(&self, key: &str, default: Option<CacheEntry>) -> Option<CacheEntry> {
        match self.get_entry(key).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Returning default for key '{}': {}", key, e);
                default
            }
        }
    }

    pub async fn get_value(&self, key: &str) -> Result<HostValue> {
        self.get_entry(key).await.map(CacheEntry::into_value)
    }

    pub async fn get_value_or(&self, key: &str, default: HostValue) -> HostValue {
        match self.get_value(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Returning default for key '{}': {}", key, e);
                default
            }
        }
    }

    /// No statistics are kept, so a quiet read is a plain read.
    pub async fn get_quiet(&self, key: &str) -> Result<CacheEntry> {
        self.get_entry(key).await
    }

    pub async fn get_quiet_or(&self, key: &str, default: Option<CacheEntry>) -> Option<CacheEntry> {
        self.get_entry_or(key, default).await
    }

    // == Put ==
    /// Stores a value, keeping the original creation time of an existing key.
    ///
    /// `idle_ms` and `until_ms` are recorded verbatim when positive and
    /// determine the item's `ttl`.
    pub async fn put(&self, key: &str, value: &HostValue, idle_ms: Option<i64>, until_ms: Option<i64>) -> Result<()> {
        self.put_attribute(key, encode(value), idle_ms, until_ms).await
    }

    /// Stores any serializable value as a structured document.
    pub async fn put_object<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        idle_ms: Option<i64>,
        until_ms: Option<i64>,
    ) -> Result<()> {
        let encoded = encode_object(value)?;
        self.put_attribute(key, encoded, idle_ms, until_ms).await
    }

    async fn put_attribute(
        &self,
        key: &str,
        value: AttributeValue,
        idle_ms: Option<i64>,
        until_ms: Option<i64>,
    ) -> Result<()> {
        let now = current_timestamp_ms();
        let mut set = Item::from([
            (VALUE_ATTRIBUTE.to_string(), value),
            (UPDATED_TIME_ATTRIBUTE.to_string(), AttributeValue::number(now)),
        ]);

        if let Some(ttl) = compute_expiration(now, idle_ms, until_ms) {
            set.insert(TTL_ATTRIBUTE.to_string(), AttributeValue::number(ttl));
        }
        if let Some(idle) = idle_ms.filter(|i| *i > 0) {
            set.insert(IDLE_ATTRIBUTE.to_string(), AttributeValue::number(idle));
        }
        if let Some(until) = until_ms.filter(|u| *u > 0) {
            set.insert(UNTIL_ATTRIBUTE.to_string(), AttributeValue::number(until));
        }

        let update = ItemUpdate::Assign {
            set,
            set_if_absent: Item::from([(
                CREATED_TIME_ATTRIBUTE.to_string(),
                AttributeValue::number(now),
            )]),
        };

        self.client()?
            .update_item(&self.table, self.key_item(key), update, ReturnValues::None)
            .await?;
        debug!("Stored key '{}' in table '{}'", key, self.table);
        Ok(())
    }

    // == Contains / Remove ==
    /// Checks for a live key, fetching only the key and `ttl` attributes.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        let projection = [self.key_attribute.as_str(), TTL_ATTRIBUTE];
        let item = self
            .client()?
            .get_item(&self.table, self.key_item(key), Some(&projection[..]))
            .await?;
        Ok(item.is_some_and(|item| is_valid(&item)))
    }

    /// Deletes a key. Returns true only if a live item was removed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let old = self
            .client()?
            .delete_item(&self.table, self.key_item(key), ReturnValues::AllOld)
            .await?;
        Ok(old.is_some_and(|item| is_valid(&item)))
    }

    /// Deletes every live key accepted by the filter. Returns how many were removed.
    pub async fn remove_matching_keys(&self, filter: KeyFilter<'_>) -> Result<usize> {
        let keys = self.paginator_keys(ScanFilter::Key(filter)).await?;
        self.remove_all(keys).await
    }

    pub async fn remove_matching_entries(&self, filter: EntryFilter<'_>) -> Result<usize> {
        let keys = self.paginator_keys(ScanFilter::Entry(filter)).await?;
        self.remove_all(keys).await
    }

    /// Deletes every live key.
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.paginator_keys(ScanFilter::All).await?;
        self.remove_all(keys).await
    }

    async fn remove_all(&self, keys: Vec<String>) -> Result<usize> {
        let client = self.client()?;
        let mut removed = 0;
        for key in keys {
            client
                .delete_item(&self.table, self.key_item(&key), ReturnValues::None)
                .await?;
            removed += 1;
        }
        info!("Removed {} keys from table '{}'", removed, self.table);
        Ok(removed)
    }

    // == Enumeration ==
    async fn paginator_keys(&self, filter: ScanFilter<'_>) -> Result<Vec<String>> {
        let client = self.client()?;
        ScanPaginator::new(client.as_ref(), &self.table, &self.key_attribute)
            .keys(filter)
            .await
    }

    async fn paginator_entries(&self, filter: ScanFilter<'_>) -> Result<Vec<CacheEntry>> {
        let client = self.client()?;
        ScanPaginator::new(client.as_ref(), &self.table, &self.key_attribute)
            .entries(filter)
            .await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.paginator_keys(ScanFilter::All).await
    }

    pub async fn keys_matching(&self, filter: KeyFilter<'_>) -> Result<Vec<String>> {
        self.paginator_keys(ScanFilter::Key(filter)).await
    }

    pub async fn keys_matching_entries(&self, filter: EntryFilter<'_>) -> Result<Vec<String>> {
        self.paginator_keys(ScanFilter::Entry(filter)).await
    }

    pub async fn values(&self) -> Result<Vec<HostValue>> {
        self.projected_values(ScanFilter::All).await
    }

    pub async fn values_matching(&self, filter: KeyFilter<'_>) -> Result<Vec<HostValue>> {
        self.projected_values(ScanFilter::Key(filter)).await
    }

    pub async fn values_matching_entries(&self, filter: EntryFilter<'_>) -> Result<Vec<HostValue>> {
        self.projected_values(ScanFilter::Entry(filter)).await
    }

    async fn projected_values(&self, filter: ScanFilter<'_>) -> Result<Vec<HostValue>> {
        let entries = self.paginator_entries(filter).await?;
        Ok(entries.into_iter().map(CacheEntry::into_value).collect())
    }

    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        self.paginator_entries(ScanFilter::All).await
    }

    pub async fn entries_matching(&self, filter: KeyFilter<'_>) -> Result<Vec<CacheEntry>> {
        self.paginator_entries(ScanFilter::Key(filter)).await
    }

    pub async fn entries_matching_entries(&self, filter: EntryFilter<'_>) -> Result<Vec<CacheEntry>> {
        self.paginator_entries(ScanFilter::Entry(filter)).await
    }

    // == Statistics ==
    /// Hits are not tracked.
    pub fn hit_count(&self) -> u64 {
        0
    }

    /// Misses are not tracked.
    pub fn miss_count(&self) -> u64 {
        0
    }

    // == Custom Info ==
    /// Connection settings plus the table's metadata.
    ///
    /// TTL settings are included when the store reports them.
    pub async fn custom_info(&self) -> Result<HostMap> {
        let mut info = HostMap::new();
        info.insert("table".to_string(), HostValue::from(self.table.as_str()));
        info.insert("region".to_string(), HostValue::from(self.settings.effective_region()));
        info.insert("liveTimeout".to_string(), HostValue::from(self.settings.live_timeout_ms));
        if let Some(host) = &self.settings.host {
            info.insert("host".to_string(), HostValue::from(host.as_str()));
        }

        let client = self.client()?;
        let table = client.describe_table(&self.table).await?.ok_or_else(|| {
            CacheError::Transport(format!("Requested resource not found: table [{}]", self.table))
        })?;

        info.insert("itemCount".to_string(), optional_number(table.item_count));
        info.insert("tableSizeBytes".to_string(), optional_number(table.size_bytes));
        info.insert("tableStatus".to_string(), HostValue::from(table.status.as_str()));
        info.insert(
            "creationDateTime".to_string(),
            table
                .created_at
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map_or(HostValue::Null, |t| HostValue::String(t.to_rfc3339())),
        );

        let key_schema: HostMap = table
            .key_schema
            .iter()
            .map(|k| (k.attribute_name.clone(), HostValue::from(k.key_type.as_str())))
            .collect();
        info.insert("keySchema".to_string(), HostValue::Map(key_schema));

        if let Some(mode) = &table.billing_mode {
            info.insert("billingMode".to_string(), HostValue::from(mode.as_str()));
        }
        if let Some((read, write)) = table.provisioned_throughput {
            let throughput = HostMap::from([
                ("readCapacityUnits".to_string(), HostValue::from(read)),
                ("writeCapacityUnits".to_string(), HostValue::from(write)),
            ]);
            info.insert("provisionedThroughput".to_string(), HostValue::Map(throughput));
        }

        match client.describe_time_to_live(&self.table).await {
            Ok(Some(ttl)) => {
                let mut ttl_info = HostMap::new();
                ttl_info.insert("status".to_string(), HostValue::from(ttl.status));
                if let Some(name) = ttl.attribute_name {
                    ttl_info.insert("attributeName".to_string(), HostValue::from(name));
                }
                info.insert("ttl".to_string(), HostValue::Map(ttl_info));
            }
            Ok(None) => {}
            Err(e) => warn!("Could not retrieve TTL info for '{}': {}", self.table, e),
        }

        if !table.global_secondary_indexes.is_empty() {
            let indexes = table
                .global_secondary_indexes
                .iter()
                .map(|gsi| {
                    HostValue::Map(HostMap::from([
                        ("name".to_string(), gsi.name.clone().map_or(HostValue::Null, HostValue::from)),
                        ("status".to_string(), gsi.status.clone().map_or(HostValue::Null, HostValue::from)),
                        ("itemCount".to_string(), optional_number(gsi.item_count)),
                        ("sizeBytes".to_string(), optional_number(gsi.size_bytes)),
                    ]))
                })
                .collect::<Vec<_>>();
            info.insert("globalSecondaryIndexes".to_string(), HostValue::from(indexes));
        }

        Ok(info)
    }

    // == Command ==
    /// Runs a raw item action against this cache's table.
    pub async fn command(&self, action: &str, args: &HostValue) -> Result<HostValue> {
        let client = self.client()?;
        command::execute(client.as_ref(), &self.table, action, args).await
    }
}

fn optional_number(value: Option<i64>) -> HostValue {
    value.map_or(HostValue::Null, HostValue::from)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_KEY_ATTRIBUTE;
    use crate::config::Backend;
    use crate::store::{ItemStore, MemoryClientFactory, MemoryStore};

    async fn cache() -> (Arc<MemoryStore>, DynamoCache) {
        let store = Arc::new(MemoryStore::with_page_size(2));
        let pool = Arc::new(ClientPool::new(Arc::new(MemoryClientFactory::new(store.clone()))));
        let config = CacheConfig {
            table_name: "cache".to_string(),
            backend: Backend::Memory,
            ..CacheConfig::default()
        };
        let cache = DynamoCache::init(&config, pool).await.unwrap();
        (store, cache)
    }

    async fn insert_expired(store: &MemoryStore, key: &str) {
        let item = Item::from([
            (DEFAULT_KEY_ATTRIBUTE.to_string(), AttributeValue::string(key)),
            (VALUE_ATTRIBUTE.to_string(), AttributeValue::string("stale")),
            (TTL_ATTRIBUTE.to_string(), AttributeValue::number(1)),
        ]);
        store.put_item("cache", item, ReturnValues::None).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_, cache) = cache().await;

        cache.put("k", &HostValue::from("v"), None, None).await.unwrap();
        let entry = cache.get_entry("k").await.unwrap();

        assert_eq!(entry.value(), &HostValue::from("v"));
        assert!(entry.created().is_some());
        assert_eq!(entry.created(), entry.last_modified());
    }

    #[tokio::test]
    async fn test_put_keeps_created_time() {
        let (store, cache) = cache().await;

        cache.put("k", &HostValue::from(1), None, None).await.unwrap();
        let mut item = store
            .get_item("cache", cache.key_item("k"), None)
            .await
            .unwrap()
            .unwrap();
        item.insert(CREATED_TIME_ATTRIBUTE.to_string(), AttributeValue::number(5));
        store.put_item("cache", item, ReturnValues::None).await.unwrap();

        cache.put("k", &HostValue::from(2), None, None).await.unwrap();
        let entry = cache.get_entry("k").await.unwrap();
        assert_eq!(entry.created().unwrap().timestamp_millis(), 5);
        assert_eq!(entry.value(), &HostValue::from(2));
    }

    #[tokio::test]
    async fn test_put_records_idle_and_until() {
        let (_, cache) = cache().await;

        cache
            .put("k", &HostValue::from("v"), Some(60_000), Some(120_000))
            .await
            .unwrap();
        let entry = cache.get_entry("k").await.unwrap();

        assert_eq!(entry.idle_time_span(), 60_000);
        assert_eq!(entry.live_time_span(), 120_000);
        assert!(entry.item().contains_key(TTL_ATTRIBUTE));
    }

    #[tokio::test]
    async fn test_expired_key_is_not_found() {
        let (store, cache) = cache().await;
        insert_expired(&store, "old").await;

        assert!(matches!(cache.get_entry("old").await, Err(CacheError::NotFound(_))));
        assert!(!cache.contains("old").await.unwrap());
        assert_eq!(cache.get_value_or("old", HostValue::from("d")).await, HostValue::from("d"));
        assert!(!cache.remove("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_reports_live_item() {
        let (_, cache) = cache().await;
        cache.put("k", &HostValue::from("v"), None, None).await.unwrap();

        assert!(cache.contains("k").await.unwrap());
        assert!(cache.remove("k").await.unwrap());
        assert!(!cache.remove("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_enumeration_skips_expired() {
        let (store, cache) = cache().await;
        for key in ["a1", "a2", "b1"] {
            cache.put(key, &HostValue::from(key), None, None).await.unwrap();
        }
        insert_expired(&store, "a3").await;

        let mut keys = cache.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a1", "a2", "b1"]);

        let a_keys = cache.keys_matching(&|k: &str| k.starts_with('a')).await.unwrap();
        assert_eq!(a_keys.len(), 2);

        let values = cache.values_matching(&|k: &str| k == "b1").await.unwrap();
        assert_eq!(values, vec![HostValue::from("b1")]);

        let entries = cache
            .entries_matching_entries(&|e: &CacheEntry| e.value() == &HostValue::from("a2"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key(), "a2");
    }

    #[tokio::test]
    async fn test_remove_matching_and_clear() {
        let (_, cache) = cache().await;
        for key in ["a1", "a2", "b1"] {
            cache.put(key, &HostValue::from(key), None, None).await.unwrap();
        }

        assert_eq!(cache.remove_matching_keys(&|k: &str| k.starts_with('a')).await.unwrap(), 2);
        assert_eq!(cache.keys().await.unwrap(), vec!["b1"]);
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_object_decodes_as_map() {
        #[derive(Serialize)]
        struct Profile {
            name: String,
            age: i64,
        }

        let (_, cache) = cache().await;
        let profile = Profile {
            name: "ada".to_string(),
            age: 36,
        };
        cache.put_object("p", &profile, None, None).await.unwrap();

        let value = cache.get_value("p").await.unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&HostValue::from("ada")));
        assert_eq!(map.get("age"), Some(&HostValue::from(36)));
    }

    #[tokio::test]
    async fn test_put_object_sequence_keeps_its_shape() {
        let (_, cache) = cache().await;
        cache.put_object("ids", &vec![1, 2, 3], None, None).await.unwrap();

        let value = cache.get_value("ids").await.unwrap();
        assert_eq!(
            value,
            HostValue::List(vec![HostValue::from(1), HostValue::from(2), HostValue::from(3)])
        );
    }

    #[tokio::test]
    async fn test_quiet_reads_match_plain_reads() {
        let (store, cache) = cache().await;
        cache.put("k", &HostValue::from("v"), None, None).await.unwrap();
        insert_expired(&store, "old").await;

        assert_eq!(cache.get_quiet("k").await.unwrap().value(), &HostValue::from("v"));
        assert!(matches!(cache.get_quiet("old").await, Err(CacheError::NotFound(_))));

        let fallback = CacheEntry::new("fallback", Item::new());
        let entry = cache.get_quiet_or("missing", Some(fallback)).await.unwrap();
        assert_eq!(entry.key(), "fallback");
        assert!(cache.get_quiet_or("old", None).await.is_none());
        assert_eq!(cache.get_quiet_or("k", None).await.unwrap().key(), "k");
    }

    #[tokio::test]
    async fn test_entry_filter_projections() {
        let (store, cache) = cache().await;
        cache.put("a", &HostValue::from(1), None, None).await.unwrap();
        cache.put("b", &HostValue::from(20), None, None).await.unwrap();
        cache.put("c", &HostValue::from(30), Some(60_000), None).await.unwrap();
        insert_expired(&store, "d").await;

        let large = |e: &CacheEntry| e.value() != &HostValue::from(1);
        let mut keys = cache.keys_matching_entries(&large).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["b", "c"]);

        let idle = |e: &CacheEntry| e.idle_time_span() > 0;
        let values = cache.values_matching_entries(&idle).await.unwrap();
        assert_eq!(values, vec![HostValue::from(30)]);

        let everything = |_: &CacheEntry| true;
        assert_eq!(cache.values_matching_entries(&everything).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_matching_entries_counts_removed() {
        let (store, cache) = cache().await;
        for (key, n) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            cache.put(key, &HostValue::from(n), None, None).await.unwrap();
        }
        insert_expired(&store, "stale").await;

        let even = |e: &CacheEntry| match e.value() {
            HostValue::Number(n) => n.as_i64().is_some_and(|i| i % 2 == 0),
            _ => false,
        };
        assert_eq!(cache.remove_matching_entries(&even).await.unwrap(), 2);

        let mut keys = cache.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(cache.remove_matching_entries(&even).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_table_is_configuration_error() {
        let pool = Arc::new(ClientPool::new(Arc::new(MemoryClientFactory::default())));
        let config = CacheConfig {
            table_name: "  ".to_string(),
            ..CacheConfig::default()
        };

        let result = DynamoCache::init(&config, pool).await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_custom_info_includes_table_metadata() {
        let (_, cache) = cache().await;
        let info = cache.custom_info().await.unwrap();

        assert_eq!(info.get("table"), Some(&HostValue::from("cache")));
        assert_eq!(info.get("tableStatus"), Some(&HostValue::from("ACTIVE")));
        assert_eq!(info.get("region"), Some(&HostValue::from("us-east-1")));
        let ttl = info.get("ttl").and_then(HostValue::as_map).unwrap();
        assert_eq!(ttl.get("attributeName"), Some(&HostValue::from("ttl")));
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.miss_count(), 0);
    }
}
