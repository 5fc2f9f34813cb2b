//! Cache Entry Module
//!
//! Read-side view of one stored item. Built fresh from every read, never
//! mutated afterwards, and never re-fetched from the store.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::cache::{
    CREATED_TIME_ATTRIBUTE, IDLE_ATTRIBUTE, UNTIL_ATTRIBUTE, UPDATED_TIME_ATTRIBUTE,
    VALUE_ATTRIBUTE,
};
use crate::codec::{decode, AttributeValue, HostMap, HostValue, Item, ValueSizePair};

/// Attributes with a dedicated accessor, left out of the extra metadata.
const RESERVED_ATTRIBUTES: [&str; 5] = [
    VALUE_ATTRIBUTE,
    IDLE_ATTRIBUTE,
    UNTIL_ATTRIBUTE,
    CREATED_TIME_ATTRIBUTE,
    UPDATED_TIME_ATTRIBUTE,
];

// == Cache Entry ==
/// An immutable snapshot of a cache item.
///
/// The value is decoded on construction; every other field is parsed on
/// first access and then cached.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: String,
    value: HostValue,
    size: u64,
    item: Item,
    created: OnceLock<Option<DateTime<Utc>>>,
    last_modified: OnceLock<Option<DateTime<Utc>>>,
    idle: OnceLock<i64>,
    until: OnceLock<i64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry from a key and the full raw item.
    ///
    /// Missing optional attributes are not an error.
    pub fn new(key: impl Into<String>, item: Item) -> Self {
        let ValueSizePair { value, size } = item
            .get(VALUE_ATTRIBUTE)
            .map(decode)
            .unwrap_or(ValueSizePair::NULL);

        Self {
            key: key.into(),
            value,
            size,
            item,
            created: OnceLock::new(),
            last_modified: OnceLock::new(),
            idle: OnceLock::new(),
            until: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &HostValue {
        &self.value
    }

    /// Consumes the entry, returning the decoded value.
    pub fn into_value(self) -> HostValue {
        self.value
    }

    /// Size of the stored value as decoded.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The raw item this entry was built from.
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Creation time. Falls back to [`Self::last_modified`] when the
    /// attribute is present but unreadable.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        *self.created.get_or_init(|| match self.item.get(CREATED_TIME_ATTRIBUTE) {
            None => None,
            Some(attr) => parse_timestamp(attr).or_else(|| {
                warn!("Unreadable {} on key '{}'", CREATED_TIME_ATTRIBUTE, self.key);
                self.last_modified()
            }),
        })
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        *self.last_modified.get_or_init(|| {
            let attr = self.item.get(UPDATED_TIME_ATTRIBUTE)?;
            let parsed = parse_timestamp(attr);
            if parsed.is_none() {
                warn!("Unreadable {} on key '{}'", UPDATED_TIME_ATTRIBUTE, self.key);
            }
            parsed
        })
    }

    /// Access time is not tracked by the store.
    pub fn last_hit(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Hits are not tracked by the store.
    pub fn hit_count(&self) -> u64 {
        0
    }

    /// Configured idle timeout in milliseconds, 0 when none was recorded.
    pub fn idle_time_span(&self) -> i64 {
        *self.idle.get_or_init(|| parse_span(self.item.get(IDLE_ATTRIBUTE)))
    }

    /// Configured live time in milliseconds, 0 when none was recorded.
    pub fn live_time_span(&self) -> i64 {
        *self.until.get_or_init(|| parse_span(self.item.get(UNTIL_ATTRIBUTE)))
    }

    // == Custom Info ==
    /// Standard entry metadata plus every non-reserved attribute, decoded.
    pub fn custom_info(&self) -> HostMap {
        let mut info = HostMap::new();
        info.insert("key".to_string(), HostValue::from(self.key.as_str()));
        info.insert("created".to_string(), timestamp_value(self.created()));
        info.insert("last_hit".to_string(), timestamp_value(self.last_hit()));
        info.insert("last_modified".to_string(), timestamp_value(self.last_modified()));
        info.insert("hit_count".to_string(), HostValue::from(self.hit_count() as i64));
        info.insert("size".to_string(), HostValue::from(self.size as i64));
        info.insert("idle_time_span".to_string(), span_value(self.idle_time_span()));
        info.insert("live_time_span".to_string(), span_value(self.live_time_span()));

        let mut extra: Vec<_> = self
            .item
            .iter()
            .filter(|(name, _)| !RESERVED_ATTRIBUTES.contains(&name.as_str()))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (name, attr) in extra {
            info.insert(name.clone(), decode(attr).value);
        }
        info
    }
}

fn parse_millis(attr: &AttributeValue) -> Option<i64> {
    let text = attr.as_n()?.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn parse_timestamp(attr: &AttributeValue) -> Option<DateTime<Utc>> {
    parse_millis(attr).and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn parse_span(attr: Option<&AttributeValue>) -> i64 {
    attr.and_then(parse_millis).unwrap_or(0)
}

fn timestamp_value(ts: Option<DateTime<Utc>>) -> HostValue {
    ts.map_or(HostValue::Null, |t| HostValue::String(t.to_rfc3339()))
}

fn span_value(span: i64) -> HostValue {
    if span == 0 {
        HostValue::Null
    } else {
        HostValue::from(span)
    }
}
