//! Document and write types shared by every store implementation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document as returned by a collection scan or query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The store-assigned key, unique within its collection.
    pub key: String,
    /// Arbitrary nested field data.
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Read a field by dotted path (`"admins.list"`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.fields, path)
    }

    /// Read a string field by dotted path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Read a list of strings by dotted path. Non-string elements are
    /// skipped, matching how the original data is consumed.
    pub fn get_string_list(&self, path: &str) -> Option<Vec<String>> {
        Some(
            self.get(path)?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        )
    }
}

/// A partial update to one document: field paths (dotted for nested fields)
/// mapped to their replacement values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub collection: String,
    pub key: String,
    pub fields: BTreeMap<String, Value>,
}

impl DocumentUpdate {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add one field update. Builder-style so migrations read linearly.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.fields.insert(path.into(), value);
        self
    }

    /// Whether any field updates have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Dotted-path lookup into a document's fields.
pub fn get_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Dotted-path write into a document's fields, creating intermediate
/// objects as needed. A non-object value along the path is replaced.
pub fn set_path(fields: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().expect("field path is never empty");

    let mut current = fields;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry.as_object_mut().expect("just ensured object");
    }
    current.insert(last.to_string(), value);
}
