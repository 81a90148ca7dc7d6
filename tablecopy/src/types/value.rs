use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A typed attribute value as stored by the remote table service.
///
/// Numbers travel as strings to preserve the service's arbitrary precision;
/// the pipeline never interprets them. The serde representation matches the
/// service's wire shape (`{"S": "abc"}`, `{"N": "42"}`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value, kept in its textual form.
    N(String),
    /// Binary value.
    B(Vec<u8>),
    /// Boolean value.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null marker.
    #[serde(rename = "NULL")]
    Null(bool),
    /// Ordered list of values.
    L(Vec<AttributeValue>),
    /// Nested attribute map.
    M(HashMap<String, AttributeValue>),
    /// Set of strings.
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    /// Set of numbers, kept in their textual form.
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    /// Set of binary values.
    #[serde(rename = "BS")]
    BinarySet(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Creates a string value.
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    /// Creates a number value from its textual form.
    pub fn number(value: impl Into<String>) -> Self {
        AttributeValue::N(value.into())
    }

    /// Returns the contained string, if this is a string value.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::S(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the value as a key string, if the value is of a key-eligible
    /// type (string, number or binary).
    pub fn as_key_string(&self) -> Option<String> {
        match self {
            AttributeValue::S(value) => Some(value.clone()),
            AttributeValue::N(value) => Some(value.clone()),
            AttributeValue::B(bytes) => Some(
                bytes
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<String>(),
            ),
            _ => None,
        }
    }
}
