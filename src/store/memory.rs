//! In-memory item store.
//!
//! Tables are ordered by key so scans page deterministically. Expressions
//! are not evaluated; requests carrying one are rejected.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::codec::{AttributeValue, Item};
use crate::error::{CacheError, Result};
use crate::pool::{ClientFactory, ClientSettings};
use crate::store::{
    ItemPage, ItemStore, ItemUpdate, KeySchemaElement, QueryRequest, ReturnValues, ScanRequest,
    StoreHandle, TableDescription, TableStatus, TimeToLiveDescription,
};

/// Default number of items per scan page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug)]
struct MemoryTable {
    key_attribute: String,
    items: BTreeMap<String, Item>,
    ttl_attribute: Option<String>,
    created_at: i64,
}

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a store whose scans return at most `page_size` items per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Number of items currently held in a table, expired ones included.
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.items.len())
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&MemoryTable) -> Result<T>) -> Result<T> {
        let tables = self.tables.read();
        let t = tables.get(table).ok_or_else(|| missing_table(table))?;
        f(t)
    }

    fn with_table_mut<T>(&self, table: &str, f: impl FnOnce(&mut MemoryTable) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write();
        let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        f(t)
    }
}

fn missing_table(table: &str) -> CacheError {
    CacheError::Transport(format!("Requested resource not found: table [{}]", table))
}

fn unsupported(what: &str) -> CacheError {
    CacheError::InvalidRequest(format!("{} is not supported by the in-memory store", what))
}

impl MemoryTable {
    /// Extracts the primary key string from a key or full item.
    fn key_of(&self, item: &Item) -> Result<String> {
        match item.get(&self.key_attribute) {
            Some(AttributeValue::S(s)) => Ok(s.clone()),
            Some(AttributeValue::N(n)) => Ok(n.clone()),
            _ => Err(CacheError::InvalidRequest(format!(
                "missing key attribute [{}]",
                self.key_attribute
            ))),
        }
    }

    fn cursor_key(&self, key: &str) -> Item {
        Item::from([(self.key_attribute.clone(), AttributeValue::S(key.to_string()))])
    }

    fn page(&self, start: Option<&Item>, limit: usize) -> Result<ItemPage> {
        let lower = match start {
            Some(cursor) => Bound::Excluded(self.key_of(cursor)?),
            None => Bound::Unbounded,
        };

        let mut range = self.items.range((lower, Bound::Unbounded));
        let items: Vec<Item> = range.by_ref().take(limit).map(|(_, v)| v.clone()).collect();
        let last_evaluated_key = match range.next() {
            Some(_) => items.last().map(|last| self.key_of(last)).transpose()?.map(|k| self.cursor_key(&k)),
            None => None,
        };

        Ok(ItemPage {
            items,
            last_evaluated_key,
        })
    }
}

fn project(item: &Item, projection: Option<&[&str]>) -> Item {
    match projection {
        Some(names) => item
            .iter()
            .filter(|(k, _)| names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => item.clone(),
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_item(&self, table: &str, key: Item, projection: Option<&[&str]>) -> Result<Option<Item>> {
        self.with_table(table, |t| {
            let k = t.key_of(&key)?;
            Ok(t.items.get(&k).map(|item| project(item, projection)))
        })
    }

    async fn put_item(&self, table: &str, item: Item, return_values: ReturnValues) -> Result<Option<Item>> {
        self.with_table_mut(table, |t| {
            let k = t.key_of(&item)?;
            let old = t.items.insert(k, item);
            Ok(old.filter(|_| return_values == ReturnValues::AllOld))
        })
    }

    async fn update_item(
        &self,
        table: &str,
        key: Item,
        update: ItemUpdate,
        return_values: ReturnValues,
    ) -> Result<Option<Item>> {
        let (set, set_if_absent) = match update {
            ItemUpdate::Assign { set, set_if_absent } => (set, set_if_absent),
            ItemUpdate::Expression { .. } => return Err(unsupported("an update expression")),
        };

        self.with_table_mut(table, |t| {
            let k = t.key_of(&key)?;
            let old = t.items.get(&k).cloned();
            let item = t.items.entry(k).or_insert_with(|| key.clone());

            for (name, value) in set_if_absent {
                item.entry(name).or_insert(value);
            }
            item.extend(set);

            Ok(match return_values {
                ReturnValues::AllOld | ReturnValues::UpdatedOld => old,
                ReturnValues::AllNew | ReturnValues::UpdatedNew => Some(item.clone()),
                ReturnValues::None => None,
            })
        })
    }

    async fn delete_item(&self, table: &str, key: Item, return_values: ReturnValues) -> Result<Option<Item>> {
        self.with_table_mut(table, |t| {
            let k = t.key_of(&key)?;
            let old = t.items.remove(&k);
            Ok(old.filter(|_| return_values == ReturnValues::AllOld))
        })
    }

    async fn scan(&self, table: &str, request: ScanRequest) -> Result<ItemPage> {
        if request.filter_expression.is_some() {
            return Err(unsupported("a filter expression"));
        }
        if request.index_name.is_some() {
            return Err(unsupported("scanning an index"));
        }

        let limit = request
            .limit
            .map_or(self.page_size, |l| (l.max(1) as usize).min(self.page_size));
        self.with_table(table, |t| t.page(request.exclusive_start_key.as_ref(), limit))
    }

    async fn query(&self, _table: &str, _request: QueryRequest) -> Result<ItemPage> {
        Err(unsupported("query"))
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
        Ok(self.tables.read().get(table).map(|t| TableDescription {
            status: TableStatus::Active,
            key_schema: vec![KeySchemaElement {
                attribute_name: t.key_attribute.clone(),
                key_type: "HASH".to_string(),
            }],
            item_count: Some(t.items.len() as i64),
            size_bytes: None,
            created_at: Some(t.created_at),
            billing_mode: Some("PAY_PER_REQUEST".to_string()),
            provisioned_throughput: None,
            global_secondary_indexes: vec![],
        }))
    }

    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(CacheError::Transport(format!("Table already exists: {}", table)));
        }
        debug!("Creating in-memory table '{}' keyed by '{}'", table, key_attribute);
        tables.insert(
            table.to_string(),
            MemoryTable {
                key_attribute: key_attribute.to_string(),
                items: BTreeMap::new(),
                ttl_attribute: None,
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        );
        Ok(())
    }

    async fn describe_time_to_live(&self, table: &str) -> Result<Option<TimeToLiveDescription>> {
        self.with_table(table, |t| {
            Ok(Some(TimeToLiveDescription {
                status: if t.ttl_attribute.is_some() { "ENABLED" } else { "DISABLED" }.to_string(),
                attribute_name: t.ttl_attribute.clone(),
            }))
        })
    }

    async fn enable_time_to_live(&self, table: &str, attribute: &str) -> Result<()> {
        self.with_table_mut(table, |t| {
            t.ttl_attribute = Some(attribute.to_string());
            Ok(())
        })
    }
}

// == Memory Client Factory ==
/// Hands out the same in-memory store for every pool key.
#[derive(Debug, Clone, Default)]
pub struct MemoryClientFactory {
    store: Arc<MemoryStore>,
}

impl MemoryClientFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(&self, _settings: &ClientSettings) -> Result<StoreHandle> {
        Ok(self.store.clone())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> Item {
        Item::from([("id".to_string(), AttributeValue::string(k))])
    }

    async fn store_with(keys: &[&str], page_size: usize) -> MemoryStore {
        let store = MemoryStore::with_page_size(page_size);
        store.create_table("t", "id").await.unwrap();
        for k in keys {
            store.put_item("t", key(k), ReturnValues::None).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_scan_pages_follow_cursor() {
        let store = store_with(&["a", "b", "c", "d", "e"], 2).await;

        let first = store.scan("t", ScanRequest::default()).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let second = store
            .scan("t", ScanRequest::starting_at(first.next_cursor().cloned()))
            .await
            .unwrap();
        assert_eq!(second.items[0], key("c"));
        let third = store
            .scan("t", ScanRequest::starting_at(second.next_cursor().cloned()))
            .await
            .unwrap();
        assert_eq!(third.items, vec![key("e")]);
        assert!(third.next_cursor().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_absent_only_attributes() {
        let store = store_with(&[], 10).await;
        let assign = |n: i64| ItemUpdate::Assign {
            set: Item::from([("updated".to_string(), AttributeValue::number(n))]),
            set_if_absent: Item::from([("created".to_string(), AttributeValue::number(n))]),
        };

        store.update_item("t", key("k"), assign(1), ReturnValues::None).await.unwrap();
        let item = store
            .update_item("t", key("k"), assign(2), ReturnValues::AllNew)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.get("created"), Some(&AttributeValue::number(1)));
        assert_eq!(item.get("updated"), Some(&AttributeValue::number(2)));
    }

    #[tokio::test]
    async fn test_delete_returns_old_item() {
        let store = store_with(&["k"], 10).await;

        let old = store.delete_item("t", key("k"), ReturnValues::AllOld).await.unwrap();
        assert_eq!(old, Some(key("k")));
        assert!(store.is_empty("t"));
    }

    #[tokio::test]
    async fn test_missing_table_is_transport_error() {
        let store = MemoryStore::new();
        let result = store.get_item("nope", key("k"), None).await;
        assert!(matches!(result, Err(CacheError::Transport(_))));
    }

    #[tokio::test]
    async fn test_projection_limits_attributes() {
        let store = store_with(&[], 10).await;
        let mut item = key("k");
        item.insert("value".to_string(), AttributeValue::string("v"));
        item.insert("ttl".to_string(), AttributeValue::number(5));
        store.put_item("t", item, ReturnValues::None).await.unwrap();

        let fetched = store
            .get_item("t", key("k"), Some(&["id", "ttl"][..]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(!fetched.contains_key("value"));
    }
}
