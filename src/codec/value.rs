//! Host Value Module
//!
//! The dynamically-typed value callers store in the cache.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::codec::number::format_float;

// == Host Map ==
/// Insertion-ordered mapping used for map values.
///
/// Equality ignores order; the backing store does not keep it either.
pub type HostMap = IndexMap<String, HostValue>;

// == Number ==
/// A decimal number as seen by callers.
#[derive(Debug, Clone)]
pub enum Number {
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Decimal text as read from the store, kept verbatim.
    ///
    /// Used for every stored number that is not an exact `i64`, so values
    /// wider than a float survive a read then write unchanged.
    Decimal(String),
}

impl Number {
    /// Parses a decimal string as transmitted by the store.
    ///
    /// Integral strings that fit an `i64` become `Integer`; any other finite
    /// decimal becomes `Decimal` with the trimmed source text.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(Number::Integer(i));
        }
        let finite = trimmed.parse::<f64>().is_ok_and(f64::is_finite);
        let numeric = trimmed
            .trim_start_matches(['-', '+'])
            .starts_with(|c: char| c.is_ascii_digit() || c == '.');
        (finite && numeric).then(|| Number::Decimal(trimmed.to_string()))
    }

    /// Returns the value as a float, rounding wide decimals.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
            Number::Decimal(text) => text.parse().unwrap_or(f64::NAN),
        }
    }

    /// Returns the value as an integer if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            other => {
                let f = other.as_f64();
                (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
            }
        }
    }

    /// NaN and infinities have no decimal form.
    pub fn is_finite(&self) -> bool {
        self.as_f64().is_finite()
    }

    /// Formats the number as the store's decimal string.
    pub fn to_decimal_string(&self) -> String {
        match self {
            Number::Integer(i) => i.to_string(),
            Number::Float(f) => format_float(*f),
            Number::Decimal(text) => text.clone(),
        }
    }

    /// Normalized digits for exact comparison, when the text is plain decimal.
    fn canonical(&self) -> Option<String> {
        match self {
            Number::Integer(i) => Some(i.to_string()),
            Number::Float(_) => None,
            Number::Decimal(text) => canonical_decimal(text),
        }
    }
}

/// `-007.50` and `-7.5` normalize alike. Exponent forms are not normalized.
fn canonical_decimal(text: &str) -> Option<String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole = whole.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');
    let mut out = String::new();
    if negative && !(whole.is_empty() && fraction.is_empty()) {
        out.push('-');
    }
    out.push_str(if whole.is_empty() { "0" } else { whole });
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    Some(out)
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            _ => match (self.canonical(), other.canonical()) {
                (Some(a), Some(b)) => a == b,
                _ => self.as_f64() == other.as_f64(),
            },
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

// == Host Value ==
/// A cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// No value
    Null,
    /// Text
    String(String),
    /// Boolean
    Bool(bool),
    /// Decimal number
    Number(Number),
    /// Ordered mapping of string keys
    Map(HostMap),
    /// Ordered sequence
    List(Vec<HostValue>),
    /// Raw bytes
    Binary(Vec<u8>),
    /// A serialized object in a foreign runtime format.
    ///
    /// Kept byte-for-byte as read from the store and written back unchanged.
    /// It is never deserialized.
    Opaque(Vec<u8>),
}

impl HostValue {
    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map payload, if any.
    pub fn as_map(&self) -> Option<&HostMap> {
        match self {
            HostValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns true for the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Number(Number::Integer(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(Number::Float(value))
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(value: Vec<HostValue>) -> Self {
        HostValue::List(value)
    }
}

impl From<HostMap> for HostValue {
    fn from(value: HostMap) -> Self {
        HostValue::Map(value)
    }
}

// == JSON Conversion ==
impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => HostValue::Number(Number::Integer(i)),
                (None, Some(u)) => HostValue::Number(Number::Decimal(u.to_string())),
                (None, None) => HostValue::Number(Number::Float(n.as_f64().unwrap_or_default())),
            },
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::List(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(fields) => HostValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HostValue::Null => serializer.serialize_unit(),
            HostValue::String(s) => serializer.serialize_str(s),
            HostValue::Bool(b) => serializer.serialize_bool(*b),
            HostValue::Number(Number::Integer(i)) => serializer.serialize_i64(*i),
            HostValue::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            HostValue::Number(n @ Number::Decimal(text)) => match text.parse::<u64>() {
                Ok(u) => serializer.serialize_u64(u),
                Err(_) => serializer.serialize_f64(n.as_f64()),
            },
            HostValue::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            HostValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            HostValue::Binary(bytes) | HostValue::Opaque(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}
