//! Integration Tests for table enumeration and bootstrap
//!
//! Drives the paginator against a store that replays scripted scan pages.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dynamo_cache::cache::{ensure_table, BootstrapOptions, CacheEntry, ScanFilter, ScanPaginator};
use dynamo_cache::codec::{AttributeValue, HostValue, Item};
use dynamo_cache::error::{CacheError, Result};
use dynamo_cache::store::{
    ItemPage, ItemStore, ItemUpdate, QueryRequest, ReturnValues, ScanRequest, TableDescription,
    TableStatus, TimeToLiveDescription,
};
use parking_lot::Mutex;

const KEY: &str = "cacheKey";

// == Scripted Store ==

/// Replays fixed pages and records the cursor each scan was started with.
#[derive(Default)]
struct ScriptedStore {
    pages: Mutex<VecDeque<ItemPage>>,
    cursors: Mutex<Vec<Option<Item>>>,
    describes: AtomicUsize,
}

impl ScriptedStore {
    fn with_pages(pages: Vec<ItemPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    fn cursors(&self) -> Vec<Option<Item>> {
        self.cursors.lock().clone()
    }
}

#[async_trait]
impl ItemStore for ScriptedStore {
    async fn get_item(&self, _table: &str, _key: Item, _projection: Option<&[&str]>) -> Result<Option<Item>> {
        Ok(None)
    }

    async fn put_item(&self, _table: &str, _item: Item, _rv: ReturnValues) -> Result<Option<Item>> {
        Ok(None)
    }

    async fn update_item(
        &self,
        _table: &str,
        _key: Item,
        _update: ItemUpdate,
        _rv: ReturnValues,
    ) -> Result<Option<Item>> {
        Ok(None)
    }

    async fn delete_item(&self, _table: &str, _key: Item, _rv: ReturnValues) -> Result<Option<Item>> {
        Ok(None)
    }

    async fn scan(&self, _table: &str, request: ScanRequest) -> Result<ItemPage> {
        self.cursors.lock().push(request.exclusive_start_key);
        self.pages
            .lock()
            .pop_front()
            .ok_or_else(|| CacheError::Internal("scan past the last page".to_string()))
    }

    async fn query(&self, _table: &str, _request: QueryRequest) -> Result<ItemPage> {
        Ok(ItemPage::default())
    }

    /// Missing on the first call, stuck in CREATING afterwards.
    async fn describe_table(&self, _table: &str) -> Result<Option<TableDescription>> {
        if self.describes.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(None);
        }
        Ok(Some(TableDescription {
            status: TableStatus::Creating,
            key_schema: Vec::new(),
            item_count: None,
            size_bytes: None,
            created_at: None,
            billing_mode: None,
            provisioned_throughput: None,
            global_secondary_indexes: Vec::new(),
        }))
    }

    async fn create_table(&self, _table: &str, _key_attribute: &str) -> Result<()> {
        Ok(())
    }

    async fn describe_time_to_live(&self, _table: &str) -> Result<Option<TimeToLiveDescription>> {
        Ok(None)
    }

    async fn enable_time_to_live(&self, _table: &str, _attribute: &str) -> Result<()> {
        Ok(())
    }
}

// == Helper Functions ==

fn live(key: &str, value: &str) -> Item {
    Item::from([
        (KEY.to_string(), AttributeValue::string(key)),
        ("value".to_string(), AttributeValue::string(value)),
    ])
}

fn expired(key: &str) -> Item {
    let mut item = live(key, "stale");
    item.insert("ttl".to_string(), AttributeValue::number(1));
    item
}

fn cursor(key: &str) -> Option<Item> {
    Some(Item::from([(KEY.to_string(), AttributeValue::string(key))]))
}

fn page(items: Vec<Item>, next: Option<Item>) -> ItemPage {
    ItemPage {
        items,
        last_evaluated_key: next,
    }
}

// == Pagination Tests ==

#[tokio::test]
async fn test_follows_cursor_across_pages() {
    let store = ScriptedStore::with_pages(vec![
        page(vec![live("a", "1"), live("b", "2")], cursor("b")),
        page(vec![live("c", "3"), live("d", "4")], cursor("d")),
        page(vec![live("e", "5")], None),
    ]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator.keys(ScanFilter::All).await.unwrap();

    assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(store.cursors(), vec![None, cursor("b"), cursor("d")]);
}

#[tokio::test]
async fn test_expired_items_are_skipped() {
    let store = ScriptedStore::with_pages(vec![
        page(vec![live("a", "1"), expired("b")], cursor("b")),
        page(vec![expired("c"), live("d", "4"), live("e", "5")], None),
    ]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let entries = paginator.entries(ScanFilter::All).await.unwrap();

    let keys: Vec<&str> = entries.iter().map(|e| e.key()).collect();
    assert_eq!(keys, vec!["a", "d", "e"]);
}

#[tokio::test]
async fn test_empty_page_with_cursor_is_followed() {
    let store = ScriptedStore::with_pages(vec![
        page(Vec::new(), cursor("x")),
        page(vec![live("a", "1")], None),
    ]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator.keys(ScanFilter::All).await.unwrap();

    assert_eq!(keys, vec!["a"]);
    assert_eq!(store.cursors().len(), 2);
}

#[tokio::test]
async fn test_empty_cursor_ends_enumeration() {
    let store = ScriptedStore::with_pages(vec![page(vec![live("a", "1")], Some(Item::new()))]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator.keys(ScanFilter::All).await.unwrap();

    assert_eq!(keys, vec!["a"]);
    assert_eq!(store.cursors().len(), 1);
}

#[tokio::test]
async fn test_key_filter() {
    let store = ScriptedStore::with_pages(vec![
        page(vec![live("user:1", "ada"), live("order:1", "x")], cursor("order:1")),
        page(vec![live("order:2", "y")], None),
    ]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator
        .keys(ScanFilter::Key(&|k: &str| k.starts_with("user:")))
        .await
        .unwrap();

    assert_eq!(keys, vec!["user:1"]);
}

#[tokio::test]
async fn test_entry_filter_sees_decoded_values() {
    let store = ScriptedStore::with_pages(vec![
        page(vec![live("a", "keep"), live("b", "drop")], cursor("b")),
        page(vec![live("c", "keep")], None),
    ]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator
        .keys(ScanFilter::Entry(&|e: &CacheEntry| {
            e.value() == &HostValue::from("keep")
        }))
        .await
        .unwrap();

    assert_eq!(keys, vec!["a", "c"]);
}

#[tokio::test]
async fn test_items_without_string_key_are_skipped() {
    let mut numeric = live("ignored", "1");
    numeric.insert(KEY.to_string(), AttributeValue::number(7));
    let store = ScriptedStore::with_pages(vec![page(vec![numeric, live("a", "1")], None)]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let keys = paginator.keys(ScanFilter::All).await.unwrap();

    assert_eq!(keys, vec!["a"]);
}

#[tokio::test]
async fn test_scan_failure_propagates() {
    let store = ScriptedStore::with_pages(vec![page(vec![live("a", "1")], cursor("a"))]);
    let paginator = ScanPaginator::new(&store, "t", KEY);

    let result = paginator.keys(ScanFilter::All).await;

    assert!(matches!(result, Err(CacheError::Internal(_))));
}

// == Bootstrap Tests ==

#[tokio::test]
async fn test_bootstrap_times_out_when_table_never_activates() {
    let store = ScriptedStore::default();
    let options = BootstrapOptions {
        attempts: 3,
        interval: Duration::from_millis(1),
    };

    let result = ensure_table(&store, "t", options).await;

    assert!(matches!(result, Err(CacheError::Configuration(_))));
    // One existence check plus one per polling attempt
    assert_eq!(store.describes.load(Ordering::SeqCst), 4);
}
