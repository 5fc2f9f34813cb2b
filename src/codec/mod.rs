//! Codec Module
//!
//! Bidirectional mapping between cached host values and the store's
//! attribute model, with format sniffing for binary values.

mod attribute;
mod decode;
mod encode;
mod number;
mod value;

#[cfg(test)]
mod property_tests;

pub use attribute::{AttributeValue, Item};
pub use decode::{
    decode, decode_binary, decode_item, is_gzip, is_object_stream, ValueSizePair, GZIP_MAGIC,
    OBJECT_STREAM_MAGIC, STORAGE_VALUE_KEY,
};
pub use encode::{encode, encode_object};
pub use number::format_float;
pub use value::{HostMap, HostValue, Number};

/// Encodes a host map into a store item.
pub fn encode_item(fields: &HostMap) -> Item {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode(v)))
        .collect()
}
