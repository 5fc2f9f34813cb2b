//! Attribute Value Module
//!
//! The backing store's typed attribute model, independent of any SDK types.

use std::collections::HashMap;

// == Item ==
/// A stored item: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;

// == Attribute Value ==
/// One attribute as the backing store transmits it.
///
/// Exactly one variant is populated per value. Numbers travel as decimal
/// strings so no precision is lost on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Explicit null
    Null,
    /// UTF-8 string
    S(String),
    /// Boolean
    Bool(bool),
    /// Decimal number in string form
    N(String),
    /// Binary blob
    B(Vec<u8>),
    /// Ordered list
    L(Vec<AttributeValue>),
    /// Unordered string-keyed map
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Returns the string payload if this is a string attribute.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number payload if this is a number attribute.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Builds a number attribute from an integer.
    pub fn number(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }

    /// Builds a string attribute.
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }
}
