use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::{compare_documents, lookup, Filter, SortKey};
use crate::{DocumentStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    collections: BTreeMap<String, Vec<Value>>,
}

/// Document store kept in memory and, when opened with a path, mirrored to a JSON file
/// after every write.
pub struct JsonDocumentStore {
    path: Option<PathBuf>,
    collections: RwLock<BTreeMap<String, Vec<Value>>>,
}

impl JsonDocumentStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if !path.exists() {
            let bytes = serde_json::to_vec_pretty(&Persisted::default())?;
            fs::write(&path, bytes)?;
        }

        let bytes = fs::read(&path)?;
        let persisted: Persisted = serde_json::from_slice(&bytes)?;
        Ok(Self {
            path: Some(path),
            collections: RwLock::new(persisted.collections),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends documents as-is; used to seed fixtures and by importers. Either every
    /// document is stored or none is.
    pub fn insert_many(
        &self,
        collection: &str,
        documents: impl IntoIterator<Item = Value>,
    ) -> Result<usize, StoreError> {
        let documents: Vec<Value> = documents.into_iter().collect();
        if documents.iter().any(|d| !d.is_object()) {
            return Err(StoreError::InvalidInput(format!(
                "documents must be JSON objects (collection {collection})"
            )));
        }
        let inserted = documents.len();

        let mut locked = self.collections.write();
        let target = locked.entry(collection.to_string()).or_default();
        let before = target.len();
        target.extend(documents);
        if let Err(err) = self.persist(&locked) {
            if let Some(target) = locked.get_mut(collection) {
                target.truncate(before);
            }
            return Err(err);
        }
        Ok(inserted)
    }

    pub fn insert(&self, collection: &str, document: Value) -> Result<(), StoreError> {
        self.insert_many(collection, [document]).map(|_| ())
    }

    fn persist(&self, collections: &BTreeMap<String, Vec<Value>>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&PersistedRef { collections })?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    collections: &'a BTreeMap<String, Vec<Value>>,
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    fn backend_name(&self) -> &'static str {
        if self.path.is_some() {
            "json"
        } else {
            "memory"
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[SortKey],
    ) -> Result<Option<Value>, StoreError> {
        let locked = self.collections.read();
        let Some(documents) = locked.get(collection) else {
            return Ok(None);
        };
        let best = documents
            .iter()
            .filter(|d| filter.matches(d))
            .min_by(|a, b| compare_documents(a, b, sort));
        Ok(best.cloned())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let locked = self.collections.read();
        let count = locked
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut locked = self.collections.write();
        let Some(documents) = locked.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        let removed = before - documents.len();
        if removed > 0 {
            self.persist(&locked)?;
        }
        Ok(removed as u64)
    }

    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        key: &Value,
        mut document: Value,
    ) -> Result<(), StoreError> {
        let Some(object) = document.as_object_mut() else {
            return Err(StoreError::InvalidInput(
                "upsert document must be a JSON object".to_string(),
            ));
        };
        object.insert(key_field.to_string(), key.clone());

        let mut locked = self.collections.write();
        let documents = locked.entry(collection.to_string()).or_default();
        match documents
            .iter_mut()
            .find(|d| lookup(d, key_field) == Some(key))
        {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        self.persist(&locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_replaces_by_key() {
        let store = JsonDocumentStore::in_memory();
        store
            .upsert("call_contexts", "call_id", &json!("c1"), json!({"v": 1}))
            .await
            .expect("insert");
        store
            .upsert("call_contexts", "call_id", &json!("c1"), json!({"v": 2}))
            .await
            .expect("replace");

        let stored = store
            .count("call_contexts", &Filter::All)
            .await
            .expect("count");
        assert_eq!(stored, 1);
        let doc = store
            .find_one("call_contexts", &Filter::eq("call_id", "c1"), &[])
            .await
            .expect("find")
            .expect("present");
        assert_eq!(doc, json!({"v": 2, "call_id": "c1"}));
    }

    #[tokio::test]
    async fn insert_rejects_non_objects_without_partial_writes() {
        let store = JsonDocumentStore::in_memory();
        assert!(store.insert("tickets", json!("INC1")).is_err());

        let batch = [
            json!({"number": "INC1"}),
            json!(["INC2"]),
            json!({"number": "INC3"}),
        ];
        assert!(matches!(
            store.insert_many("tickets", batch),
            Err(StoreError::InvalidInput(_))
        ));
        assert_eq!(
            store.count("tickets", &Filter::All).await.expect("count"),
            0
        );
    }
}
