//! Decoding from attribute values to host values.
//!
//! Binary attributes carry no format tag; the format is sniffed from the
//! leading bytes. Decoding never fails: content that matches no known format
//! degrades to its UTF-8 string form (or raw bytes when it is not UTF-8).
//! Compressed content that is not a document is also tried as JSON, the
//! form `encode_object` falls back to.

use std::io::Read;

use bson::{Bson, Document};
use flate2::read::GzDecoder;
use tracing::{debug, trace};

use crate::codec::{AttributeValue, HostMap, HostValue, Item, Number};

/// Leading bytes of a gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Leading bytes of a foreign serialized-object stream.
pub const OBJECT_STREAM_MAGIC: [u8; 4] = [0xac, 0xed, 0x00, 0x05];

/// First key of a document in the legacy storage-value layout.
pub const STORAGE_VALUE_KEY: &str = "__storage_value__";

// == Value Size Pair ==
/// A decoded value and its approximate size in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSizePair {
    pub value: HostValue,
    pub size: u64,
}

impl ValueSizePair {
    pub const NULL: ValueSizePair = ValueSizePair {
        value: HostValue::Null,
        size: 0,
    };
    pub const TRUE: ValueSizePair = ValueSizePair {
        value: HostValue::Bool(true),
        size: 4,
    };
    pub const FALSE: ValueSizePair = ValueSizePair {
        value: HostValue::Bool(false),
        size: 5,
    };

    pub fn new(value: HostValue, size: u64) -> Self {
        Self { value, size }
    }
}

// == Decode ==
/// Decodes an attribute value, accumulating sizes through containers.
pub fn decode(attr: &AttributeValue) -> ValueSizePair {
    match attr {
        AttributeValue::Null => ValueSizePair::NULL,
        AttributeValue::S(s) => ValueSizePair::new(HostValue::String(s.clone()), s.chars().count() as u64),
        AttributeValue::Bool(true) => ValueSizePair::TRUE,
        AttributeValue::Bool(false) => ValueSizePair::FALSE,
        AttributeValue::N(n) => {
            let value = match Number::parse(n) {
                Some(number) => HostValue::Number(number),
                None => HostValue::String(n.clone()),
            };
            ValueSizePair::new(value, n.len() as u64)
        }
        AttributeValue::M(fields) => {
            let mut size = 0;
            let mut map = HostMap::with_capacity(fields.len());
            for (k, v) in fields {
                let pair = decode(v);
                size += pair.size;
                map.insert(k.clone(), pair.value);
            }
            ValueSizePair::new(HostValue::Map(map), size)
        }
        AttributeValue::L(items) => {
            let mut size = 0;
            let mut list = Vec::with_capacity(items.len());
            for v in items {
                let pair = decode(v);
                size += pair.size;
                list.push(pair.value);
            }
            ValueSizePair::new(HostValue::List(list), size)
        }
        AttributeValue::B(data) => ValueSizePair::new(decode_binary(data), data.len() as u64),
    }
}

/// Decodes every attribute of an item, dropping sizes.
pub fn decode_item(item: &Item) -> HostMap {
    item.iter()
        .map(|(k, v)| (k.clone(), decode(v).value))
        .collect()
}

// == Binary Pipeline ==
/// Runs the format-sniffing pipeline over a binary attribute.
pub fn decode_binary(data: &[u8]) -> HostValue {
    if is_gzip(data) {
        return match decompress(data) {
            Ok(inflated) => sniff(&inflated, data, true),
            Err(e) => {
                debug!("Binary value has gzip magic but does not inflate: {}", e);
                raw_string(data)
            }
        };
    }
    sniff(data, data, false)
}

/// Picks a format for (possibly inflated) bytes.
///
/// `original` is the blob as stored; foreign object streams keep it verbatim.
fn sniff(bytes: &[u8], original: &[u8], inflated: bool) -> HostValue {
    if is_object_stream(bytes) {
        trace!("Binary value is a foreign object stream, keeping it opaque");
        return HostValue::Opaque(original.to_vec());
    }

    match parse_document(bytes) {
        Some(doc) => from_document(doc),
        None if inflated => parse_json(bytes).unwrap_or_else(|| raw_string(bytes)),
        None => raw_string(bytes),
    }
}

fn parse_json(bytes: &[u8]) -> Option<HostValue> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .map(HostValue::from)
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

pub fn is_object_stream(data: &[u8]) -> bool {
    data.starts_with(&OBJECT_STREAM_MAGIC)
}

fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut inflated = Vec::new();
    GzDecoder::new(data).read_to_end(&mut inflated)?;
    Ok(inflated)
}

/// Parses a BSON document that spans exactly the given bytes.
fn parse_document(bytes: &[u8]) -> Option<Document> {
    let declared = bytes
        .get(..4)
        .map(|prefix| i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]))?;
    if declared < 5 || declared as usize != bytes.len() {
        return None;
    }
    Document::from_reader(&mut &bytes[..]).ok()
}

fn raw_string(bytes: &[u8]) -> HostValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => HostValue::String(s.to_string()),
        Err(_) => HostValue::Binary(bytes.to_vec()),
    }
}

// == Documents ==
fn from_document(doc: Document) -> HostValue {
    let mut fields = doc.into_iter();
    let first = fields.next();

    if let Some((key, Bson::Int64(last_modified))) = &first {
        if key == STORAGE_VALUE_KEY {
            return from_storage_value(*last_modified, fields);
        }
    }

    let map: HostMap = first
        .into_iter()
        .chain(fields)
        .map(|(k, v)| (k, from_bson(v)))
        .collect();
    HostValue::Map(map)
}

/// Legacy layout: the marker holds the last-modified time in epoch millis,
/// the remaining fields are the stored data.
fn from_storage_value(last_modified: i64, rest: impl Iterator<Item = (String, Bson)>) -> HostValue {
    let data: HostMap = rest.map(|(k, v)| (k, from_bson(v))).collect();
    let mut map = HostMap::with_capacity(2);
    map.insert("lastModified".to_string(), HostValue::from(last_modified));
    map.insert("data".to_string(), HostValue::Map(data));
    HostValue::Map(map)
}

fn from_bson(value: Bson) -> HostValue {
    match value {
        Bson::Null | Bson::Undefined => HostValue::Null,
        Bson::String(s) => HostValue::String(s),
        Bson::Boolean(b) => HostValue::Bool(b),
        Bson::Double(f) => HostValue::Number(Number::Float(f)),
        Bson::Int32(i) => HostValue::from(i as i64),
        Bson::Int64(i) => HostValue::from(i),
        Bson::DateTime(dt) => HostValue::from(dt.timestamp_millis()),
        Bson::Document(doc) => from_document(doc),
        Bson::Array(items) => HostValue::List(items.into_iter().map(from_bson).collect()),
        Bson::Binary(binary) => HostValue::Binary(binary.bytes),
        Bson::ObjectId(id) => HostValue::String(id.to_hex()),
        other => HostValue::String(other.to_string()),
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;
    use bson::doc;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::HashMap;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn document_bytes(doc: &Document) -> Vec<u8> {
        let mut bytes = Vec::new();
        doc.to_writer(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(decode(&AttributeValue::Null), ValueSizePair::NULL);
        assert_eq!(decode(&AttributeValue::Bool(true)).size, 4);
        assert_eq!(decode(&AttributeValue::Bool(false)).size, 5);
        assert_eq!(decode(&AttributeValue::S("hello".to_string())).size, 5);
        assert_eq!(decode(&AttributeValue::N("-12.5".to_string())).size, 5);
    }

    #[test]
    fn test_container_size_is_sum_of_children() {
        let attr = AttributeValue::M(HashMap::from([
            ("a".to_string(), AttributeValue::S("xyz".to_string())),
            (
                "b".to_string(),
                AttributeValue::L(vec![AttributeValue::Bool(false), AttributeValue::N("10".to_string())]),
            ),
        ]));
        assert_eq!(decode(&attr).size, 3 + 5 + 2);
    }

    #[test]
    fn test_document_decodes_to_map() {
        let bytes = document_bytes(&doc! { "name": "ada", "age": 36_i64, "tags": ["x", "y"] });
        let pair = decode(&AttributeValue::B(bytes.clone()));

        let map = pair.value.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&HostValue::from("ada")));
        assert_eq!(map.get("age"), Some(&HostValue::from(36)));
        assert_eq!(pair.size, bytes.len() as u64);
    }

    #[test]
    fn test_gzip_document_matches_plain_document() {
        let bytes = document_bytes(&doc! { "k": "v", "n": 1.5 });
        let plain = decode(&AttributeValue::B(bytes.clone())).value;
        let compressed = decode(&AttributeValue::B(gzip(&bytes))).value;
        assert_eq!(plain, compressed);
    }

    #[test]
    fn test_gzipped_json_decodes_structurally() {
        let value = decode_binary(&gzip(br#"{"ids":[1,2,3],"ok":true}"#));
        let map = value.as_map().unwrap();
        assert_eq!(
            map.get("ids"),
            Some(&HostValue::List(vec![HostValue::from(1), HostValue::from(2), HostValue::from(3)]))
        );
        assert_eq!(map.get("ok"), Some(&HostValue::Bool(true)));
    }

    #[test]
    fn test_gzipped_text_stays_text() {
        assert_eq!(decode_binary(&gzip(b"not json at all")), HostValue::from("not json at all"));
    }

    #[test]
    fn test_plain_json_bytes_are_not_parsed() {
        assert_eq!(decode_binary(b"[1,2]"), HostValue::from("[1,2]"));
    }

    #[test]
    fn test_unknown_bytes_degrade_to_string() {
        let pair = decode(&AttributeValue::B(b"just some text".to_vec()));
        assert_eq!(pair.value, HostValue::from("just some text"));
    }

    #[test]
    fn test_invalid_utf8_degrades_to_binary() {
        let bytes = vec![0x00, 0xff, 0xfe, 0x80, 0x7f];
        assert_eq!(decode_binary(&bytes), HostValue::Binary(bytes));
    }

    #[test]
    fn test_broken_gzip_degrades() {
        let bytes = vec![0x1f, 0x8b, b'x', b'y'];
        assert!(matches!(decode_binary(&bytes), HostValue::Binary(_)));
    }

    #[test]
    fn test_object_stream_is_kept_opaque() {
        let bytes = vec![0xac, 0xed, 0x00, 0x05, 0x73, 0x72, 0x00];
        assert_eq!(decode_binary(&bytes), HostValue::Opaque(bytes.clone()));

        let compressed = gzip(&bytes);
        assert_eq!(decode_binary(&compressed), HostValue::Opaque(compressed.clone()));
        assert_eq!(encode(&HostValue::Opaque(compressed.clone())), AttributeValue::B(compressed));
    }

    #[test]
    fn test_legacy_storage_value() {
        let mut legacy = Document::new();
        legacy.insert(STORAGE_VALUE_KEY, 1_700_000_000_000_i64);
        legacy.insert("user", "u1");
        let bytes = document_bytes(&legacy);
        let value = decode_binary(&bytes);
        let map = value.as_map().unwrap();

        assert_eq!(map.get("lastModified"), Some(&HostValue::from(1_700_000_000_000_i64)));
        let data = map.get("data").and_then(HostValue::as_map).unwrap();
        assert_eq!(data.get("user"), Some(&HostValue::from("u1")));
    }

    #[test]
    fn test_marker_without_int64_is_plain_document() {
        let mut legacy = Document::new();
        legacy.insert(STORAGE_VALUE_KEY, "not a timestamp");
        let bytes = document_bytes(&legacy);
        let map = decode_binary(&bytes);
        assert_eq!(
            map.as_map().and_then(|m| m.get(STORAGE_VALUE_KEY)),
            Some(&HostValue::from("not a timestamp"))
        );
    }

    #[test]
    fn test_trailing_garbage_is_not_a_document() {
        let mut bytes = document_bytes(&doc! { "a": 1_i32 });
        bytes.push(b'!');
        assert!(matches!(decode_binary(&bytes), HostValue::String(_) | HostValue::Binary(_)));
    }

    #[test]
    fn test_malformed_number_degrades_to_string() {
        let pair = decode(&AttributeValue::N("12abc".to_string()));
        assert_eq!(pair.value, HostValue::from("12abc"));
    }
}
