//! Expiry Module
//!
//! Client-side TTL evaluation. The store deletes expired items lazily, so a
//! read may still return an item whose `ttl` has passed; such items are
//! treated as absent.
//!
//! `ttl` is epoch seconds. Timestamps (`createdTime`, `updatedTime`, "now")
//! are epoch milliseconds.

use tracing::warn;

use crate::cache::TTL_ATTRIBUTE;
use crate::codec::{AttributeValue, Item};

// == Clock ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Returns current Unix timestamp in seconds.
pub fn current_timestamp_secs() -> i64 {
    current_timestamp_ms().div_euclid(1000)
}

// == Validity ==
/// Checks whether an item is alive right now.
pub fn is_valid(item: &Item) -> bool {
    is_valid_at(item, current_timestamp_secs())
}

/// Checks whether an item is alive at `now_secs` (epoch seconds).
///
/// Empty items are never valid. Items without `ttl` are always valid.
/// Otherwise the item is valid iff `ttl > now_secs`. A `ttl` that is not a
/// number makes the item invalid.
pub fn is_valid_at(item: &Item, now_secs: i64) -> bool {
    if item.is_empty() {
        return false;
    }

    match item.get(TTL_ATTRIBUTE) {
        None => true,
        Some(attr) => match ttl_seconds(attr) {
            Some(ttl) => ttl > now_secs,
            None => {
                warn!("Ignoring item with unreadable ttl attribute: {:?}", attr);
                false
            }
        },
    }
}

/// Reads a `ttl` attribute as epoch seconds.
pub fn ttl_seconds(attr: &AttributeValue) -> Option<i64> {
    let text = attr.as_n()?.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
}

// == Expiration ==
/// Computes the `ttl` (epoch seconds) to write on a put.
///
/// `until` wins over `idle` when positive. Both are offsets in milliseconds
/// added to `now_ms`, including `until`.
pub fn compute_expiration(now_ms: i64, idle_ms: Option<i64>, until_ms: Option<i64>) -> Option<i64> {
    // TODO: `until` is documented as an absolute time but stored data relies
    // on it being added to now; revisit once existing tables are migrated.
    if let Some(until) = until_ms.filter(|u| *u > 0) {
        return Some((now_ms + until).div_euclid(1000));
    }
    if let Some(idle) = idle_ms.filter(|i| *i > 0) {
        return Some((now_ms + idle).div_euclid(1000));
    }
    None
}
