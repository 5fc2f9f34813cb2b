//! Property-Based Tests for the Codec
//!
//! Uses proptest to check that encoding then decoding preserves structure.

use proptest::prelude::*;

use crate::codec::{decode, decode_binary, encode, is_gzip, is_object_stream, HostMap, HostValue, Number};

// == Strategies ==
fn scalar_strategy() -> impl Strategy<Value = HostValue> {
    prop_oneof![
        Just(HostValue::Null),
        "\\PC{0,32}".prop_map(HostValue::String),
        any::<bool>().prop_map(HostValue::Bool),
        any::<i64>().prop_map(HostValue::from),
        // quarters are exact in binary and in seven fractional digits
        (-4_000_000i64..4_000_000).prop_map(|q| HostValue::Number(Number::Float(q as f64 / 4.0))),
        prop::collection::vec(any::<u8>(), 0..48)
            .prop_filter("blob must not be readable as another format", |b| stays_binary(b))
            .prop_map(HostValue::Binary),
    ]
}

/// Blobs that match no sniffed format and are not UTF-8 decode as raw bytes.
/// Every other blob is read back as the format it looks like.
fn stays_binary(bytes: &[u8]) -> bool {
    let declares_own_length = bytes.len() >= 5
        && i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize == bytes.len();
    std::str::from_utf8(bytes).is_err()
        && !is_gzip(bytes)
        && !is_object_stream(bytes)
        && !declares_own_length
}

fn value_strategy() -> impl Strategy<Value = HostValue> {
    scalar_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(HostValue::List),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|fields| HostValue::Map(fields.into_iter().collect::<HostMap>())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // decode(encode(v)) == v for every value that has a structural representation
    #[test]
    fn prop_roundtrip(value in value_strategy()) {
        let decoded = decode(&encode(&value)).value;
        prop_assert_eq!(decoded, value);
    }

    // nesting at least two levels deep survives intact
    #[test]
    fn prop_nested_roundtrip(leaf in scalar_strategy(), key in "[a-z]{1,8}") {
        let mut inner = HostMap::new();
        inner.insert(key.clone(), HostValue::List(vec![leaf.clone(), leaf]));
        let mut outer = HostMap::new();
        outer.insert(key, HostValue::Map(inner));
        let value = HostValue::List(vec![HostValue::Map(outer)]);

        prop_assert_eq!(decode(&encode(&value)).value, value);
    }

    // string size is its character count, regardless of content
    #[test]
    fn prop_string_size(text in "\\PC{0,64}") {
        let pair = decode(&encode(&HostValue::String(text.clone())));
        prop_assert_eq!(pair.size, text.chars().count() as u64);
    }

    // UTF-8 blobs outside every sniffed format read back as strings
    #[test]
    fn prop_utf8_blob_reads_as_string(text in "\\PC{0,48}") {
        let decoded = decode(&encode(&HostValue::Binary(text.clone().into_bytes()))).value;
        prop_assert_eq!(decoded, HostValue::String(text));
    }

    // arbitrary bytes never make decoding panic
    #[test]
    fn prop_decode_binary_is_total(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = crate::codec::decode_binary(&bytes);
    }
}

#[test]
fn test_utf8_blob_degrades_to_string() {
    let decoded = decode(&encode(&HostValue::Binary(b"hello".to_vec()))).value;
    assert_eq!(decoded, HostValue::from("hello"));
    assert_eq!(decode_binary(&[0xff, b'h', b'i']), HostValue::Binary(vec![0xff, b'h', b'i']));
}
