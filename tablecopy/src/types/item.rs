use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::AttributeValue;

/// One table record: an opaque mapping of attribute name to typed value.
///
/// The pipeline moves items without interpreting them; the only structural
/// expectation is that an item carries its table's primary key attribute(s),
/// which the clients rely on for cursors and storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item {
    attributes: HashMap<String, AttributeValue>,
}

impl Item {
    /// Creates an empty item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing attribute map.
    pub fn from_attributes(attributes: HashMap<String, AttributeValue>) -> Self {
        Self { attributes }
    }

    /// Adds an attribute, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Inserts an attribute, replacing any previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    /// Returns the value of an attribute, if present.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Renders the named attribute as a key string, if it exists and is of a
    /// key-eligible type.
    pub fn key_string(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(AttributeValue::as_key_string)
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns whether the item has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterates over attribute name/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Consumes the item, returning the underlying attribute map.
    pub fn into_attributes(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }
}
