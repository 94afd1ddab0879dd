//! Per-request evaluation context shared by every expectation.

use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Key/value bag passed through all expectations evaluated for one request.
///
/// Created fresh for each request and discarded afterwards. Matchers use it to
/// hand values to each other, e.g. regex captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: HashMap<String, JsonValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Get a value as a string slice, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(JsonValue::as_str)
    }

    /// Insert a value, returning the previous one under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
