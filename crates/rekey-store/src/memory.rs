//! In-memory document store for tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::types::set_path;
use crate::{Document, DocumentStore, DocumentUpdate, StoreError};

/// In-memory fake implementing the same contract as the HTTP client.
///
/// Migrations take the store as an injected dependency, so tests run whole
/// migration passes against this without any network or prompt.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Map<String, Value>>>>,
    commits: RwLock<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, replacing any existing one with the same key.
    pub async fn insert(&self, collection: &str, key: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            other => panic!("document fields must be an object, got {other}"),
        };
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), fields);
    }

    /// Fetch one document by key, if present.
    pub async fn get(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)?
            .get(key)
            .map(|fields| Document::new(key, fields.clone()))
    }

    /// Number of commit calls that have been applied.
    pub async fn commit_count(&self) -> usize {
        *self.commits.read().await
    }
}

fn field_matches(fields: &Map<String, Value>, field: &str, values: &[String]) -> bool {
    matches!(
        crate::get_path(fields, field),
        Some(Value::String(s)) if values.iter().any(|v| v == s)
    )
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, fields)| Document::new(key, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError> {
        if values.is_empty() {
            return Err(StoreError::InvalidRequest(
                "query_in requires at least one value".to_string(),
            ));
        }

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| field_matches(fields, field, values))
                    .map(|(key, fields)| Document::new(key, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, writes: Vec<DocumentUpdate>) -> Result<usize, StoreError> {
        if writes.is_empty() {
            return Err(StoreError::InvalidRequest(
                "commit requires at least one write".to_string(),
            ));
        }

        // All-or-nothing: verify every target exists before touching any.
        let mut collections = self.collections.write().await;
        for write in &writes {
            let exists = collections
                .get(&write.collection)
                .is_some_and(|docs| docs.contains_key(&write.key));
            if !exists {
                return Err(StoreError::NotFound(format!(
                    "{}/{}",
                    write.collection, write.key
                )));
            }
        }

        let applied = writes.len();
        for write in writes {
            let fields = collections
                .get_mut(&write.collection)
                .and_then(|docs| docs.get_mut(&write.key))
                .expect("existence checked above");
            for (path, value) in write.fields {
                set_path(fields, &path, value);
            }
        }

        *self.commits.write().await += 1;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_all_returns_inserted_documents() {
        let store = MemoryStore::new();
        store.insert("users", "u1", json!({"id": "legacy1"})).await;
        store.insert("users", "u2", json!({"id": "u2"})).await;

        let documents = store.list_all("users").await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].key, "u1");
    }

    #[tokio::test]
    async fn list_all_of_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.list_all("ghosts").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_in_matches_on_field_value() {
        let store = MemoryStore::new();
        store.insert("cigars", "c1", json!({"id": "c1"})).await;
        store.insert("cigars", "c2", json!({"id": "c2"})).await;
        store.insert("cigars", "c3", json!({"id": "c3"})).await;

        let documents = store
            .query_in("cigars", "id", &["c1".to_string(), "c3".to_string()])
            .await
            .unwrap();
        let keys: Vec<&str> = documents.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn commit_applies_dotted_paths_and_counts() {
        let store = MemoryStore::new();
        store
            .insert("clubs", "club1", json!({"admins": {"list": ["x"], "count": 1}}))
            .await;

        let update = DocumentUpdate::new("clubs", "club1")
            .set("admins.list", json!(["a", "b"]))
            .set("admins.count", json!(2));
        let applied = store.commit(vec![update]).await.unwrap();

        assert_eq!(applied, 1);
        assert_eq!(store.commit_count().await, 1);
        let doc = store.get("clubs", "club1").await.unwrap();
        assert_eq!(doc.get("admins.count"), Some(&json!(2)));
        assert_eq!(
            doc.get_string_list("admins.list"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[tokio::test]
    async fn commit_is_all_or_nothing_on_missing_document() {
        let store = MemoryStore::new();
        store.insert("users", "u1", json!({"id": "old"})).await;

        let writes = vec![
            DocumentUpdate::new("users", "u1").set("id", json!("u1")),
            DocumentUpdate::new("users", "missing").set("id", json!("x")),
        ];
        let result = store.commit(writes).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        // The valid write must not have been applied.
        let doc = store.get("users", "u1").await.unwrap();
        assert_eq!(doc.get_str("id"), Some("old"));
        assert_eq!(store.commit_count().await, 0);
    }
}
