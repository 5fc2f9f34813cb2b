//! Scan Paginator
//!
//! Enumerates a whole table through bounded scan pages, following the
//! continuation cursor until the store reports no further pages. Output
//! shapes (keys, entries, values) are projections of the one pass here.

use tracing::{debug, warn};

use crate::cache::expiry::{current_timestamp_secs, is_valid_at};
use crate::cache::CacheEntry;
use crate::codec::Item;
use crate::error::Result;
use crate::store::{ItemStore, ScanRequest};

/// Predicate over a raw cache key.
pub type KeyFilter<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

/// Predicate over a materialized entry.
pub type EntryFilter<'a> = &'a (dyn Fn(&CacheEntry) -> bool + Send + Sync);

// == Scan Filter ==
/// Selects which live items an enumeration returns.
#[derive(Clone, Copy)]
pub enum ScanFilter<'a> {
    All,
    Key(KeyFilter<'a>),
    /// Entries are always built for this mode, even when rejected.
    Entry(EntryFilter<'a>),
}

impl std::fmt::Debug for ScanFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanFilter::All => f.write_str("All"),
            ScanFilter::Key(_) => f.write_str("Key(..)"),
            ScanFilter::Entry(_) => f.write_str("Entry(..)"),
        }
    }
}

// == Scan Paginator ==
/// Drives full-table enumeration for one table. Holds no state between calls.
pub struct ScanPaginator<'a> {
    store: &'a dyn ItemStore,
    table: &'a str,
    key_attribute: &'a str,
}

impl<'a> ScanPaginator<'a> {
    pub fn new(store: &'a dyn ItemStore, table: &'a str, key_attribute: &'a str) -> Self {
        Self {
            store,
            table,
            key_attribute,
        }
    }

    /// Visits every valid item of the table with its string key, in page order.
    ///
    /// Expired and empty items are skipped, as are items whose key attribute
    /// is missing or not a string.
    pub async fn for_each_valid<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(String, Item) + Send,
    {
        let mut cursor: Option<Item> = None;
        let mut pages = 0usize;
        let mut visited = 0usize;

        loop {
            let page = self
                .store
                .scan(self.table, ScanRequest::starting_at(cursor.take()))
                .await?;
            pages += 1;

            let now = current_timestamp_secs();
            let next = page.next_cursor().cloned();
            for item in page.items {
                if !is_valid_at(&item, now) {
                    continue;
                }
                let key = match item.get(self.key_attribute).and_then(|k| k.as_s()) {
                    Some(k) => k.to_string(),
                    None => {
                        warn!(
                            "Skipping item without a string '{}' attribute in table '{}'",
                            self.key_attribute, self.table
                        );
                        continue;
                    }
                };
                visited += 1;
                visit(key, item);
            }

            match next {
                Some(key) => cursor = Some(key),
                None => break,
            }
        }

        debug!(
            "Scanned table '{}': {} pages, {} valid items",
            self.table, pages, visited
        );
        Ok(())
    }

    // == Projections ==
    /// Keys of all valid items accepted by the filter.
    pub async fn keys(&self, filter: ScanFilter<'_>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.for_each_valid(|key, item| match filter {
            ScanFilter::All => keys.push(key),
            ScanFilter::Key(accept) => {
                if accept(&key) {
                    keys.push(key);
                }
            }
            ScanFilter::Entry(accept) => {
                let entry = CacheEntry::new(key, item);
                if accept(&entry) {
                    keys.push(entry.key().to_string());
                }
            }
        })
        .await?;
        Ok(keys)
    }

    /// Entries of all valid items accepted by the filter.
    pub async fn entries(&self, filter: ScanFilter<'_>) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        self.for_each_valid(|key, item| match filter {
            ScanFilter::All => entries.push(CacheEntry::new(key, item)),
            ScanFilter::Key(accept) => {
                if accept(&key) {
                    entries.push(CacheEntry::new(key, item));
                }
            }
            ScanFilter::Entry(accept) => {
                let entry = CacheEntry::new(key, item);
                if accept(&entry) {
                    entries.push(entry);
                }
            }
        })
        .await?;
        Ok(entries)
    }
}
