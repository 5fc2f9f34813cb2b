//! Encoding from host values to attribute values.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::debug;

use crate::codec::{AttributeValue, HostValue};
use crate::error::{CacheError, Result};

// == Encode ==
/// Encodes a host value into the store's attribute model.
///
/// Map key order is not kept; the store's map type is unordered. NaN and
/// infinite numbers have no decimal form and are written as null.
pub fn encode(value: &HostValue) -> AttributeValue {
    match value {
        HostValue::Null => AttributeValue::Null,
        HostValue::String(s) => AttributeValue::S(s.clone()),
        HostValue::Bool(b) => AttributeValue::Bool(*b),
        HostValue::Number(n) if !n.is_finite() => AttributeValue::Null,
        HostValue::Number(n) => AttributeValue::N(n.to_decimal_string()),
        HostValue::Map(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), encode(v)))
                .collect::<HashMap<_, _>>(),
        ),
        HostValue::List(items) => AttributeValue::L(items.iter().map(encode).collect()),
        HostValue::Binary(bytes) | HostValue::Opaque(bytes) => AttributeValue::B(bytes.clone()),
    }
}

// == Encode Object ==
/// Encodes an arbitrary serializable object as a binary attribute.
///
/// The object is written as a BSON document when it serializes to one.
/// Objects that do not (top-level scalars, sequences, unsigned values out of
/// range) are written as gzip-compressed JSON instead.
pub fn encode_object<T: Serialize + ?Sized>(value: &T) -> Result<AttributeValue> {
    match bson::to_document(value) {
        Ok(doc) => {
            let mut bytes = Vec::new();
            doc.to_writer(&mut bytes)
                .map_err(|e| CacheError::Internal(format!("failed to write document: {}", e)))?;
            Ok(AttributeValue::B(bytes))
        }
        Err(e) => {
            debug!("Object is not representable as a document ({}), compressing instead", e);
            compress(value).map(AttributeValue::B)
        }
    }
}

/// Serializes to JSON and gzips the result.
fn compress<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)
        .map_err(|e| CacheError::Internal(format!("failed to serialize object: {}", e)))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .and_then(|_| encoder.finish())
        .map_err(|e| CacheError::Internal(format!("failed to compress object: {}", e)))
}
