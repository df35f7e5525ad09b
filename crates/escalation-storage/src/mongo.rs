//! MongoDB backend. Filters and documents cross the boundary as relaxed extended JSON, so
//! `{"$oid": ..}` and `{"$date": ..}` values round-trip as native BSON types.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use serde_json::Value;

use crate::filter::{Direction, Filter, SortKey};
use crate::{DocumentStore, StoreError};

#[derive(Clone)]
pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        // Unreachable clusters must error within seconds.
        let separator = if uri.contains('?') { '&' } else { '?' };
        let timeout_uri =
            format!("{uri}{separator}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000");

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to MongoDB: {e}")))?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {e}")))?;

        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[SortKey],
    ) -> Result<Option<Value>, StoreError> {
        let found = self
            .collection(collection)
            .find_one(filter_document(filter)?)
            .sort(sort_document(sort))
            .await
            .map_err(backend_error)?;
        Ok(found.map(|d| Bson::Document(d).into_relaxed_extjson()))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.collection(collection)
            .count_documents(filter_document(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.db.list_collection_names().await.map_err(backend_error)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .delete_many(filter_document(filter)?)
            .await
            .map_err(backend_error)?;
        Ok(result.deleted_count)
    }

    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        key: &Value,
        document: Value,
    ) -> Result<(), StoreError> {
        let key = to_bson(key)?;
        let mut replacement = match to_bson(&document)? {
            Bson::Document(d) => d,
            _ => {
                return Err(StoreError::InvalidInput(
                    "upsert document must be a JSON object".to_string(),
                ))
            }
        };
        replacement.insert(key_field, key.clone());

        let mut selector = Document::new();
        selector.insert(key_field, key);
        self.collection(collection)
            .replace_one(selector, replacement)
            .upsert(true)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

fn backend_error(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn to_bson(value: &Value) -> Result<Bson, StoreError> {
    Bson::try_from(value.clone())
        .map_err(|e| StoreError::InvalidInput(format!("value is not valid extended JSON: {e}")))
}

fn to_bson_array(values: &[Value]) -> Result<Bson, StoreError> {
    values
        .iter()
        .map(to_bson)
        .collect::<Result<Vec<_>, _>>()
        .map(Bson::Array)
}

fn filter_document(filter: &Filter) -> Result<Document, StoreError> {
    let mut out = Document::new();
    match filter {
        Filter::All => {}
        Filter::Eq(field, value) => {
            out.insert(field.as_str(), to_bson(value)?);
        }
        Filter::In(field, values) => {
            out.insert(field.as_str(), doc! { "$in": to_bson_array(values)? });
        }
        Filter::NotIn(field, values) => {
            out.insert(field.as_str(), doc! { "$nin": to_bson_array(values)? });
        }
        Filter::Lt(field, value) => {
            out.insert(field.as_str(), doc! { "$lt": to_bson(value)? });
        }
        Filter::And(filters) => {
            if !filters.is_empty() {
                let parts = filters
                    .iter()
                    .map(|f| filter_document(f).map(Bson::Document))
                    .collect::<Result<Vec<_>, _>>()?;
                out.insert("$and", parts);
            }
        }
        Filter::Or(filters) => {
            // `$or: []` is rejected by the server; an empty disjunction matches nothing.
            if filters.is_empty() {
                out.insert("$expr", false);
            } else {
                let parts = filters
                    .iter()
                    .map(|f| filter_document(f).map(Bson::Document))
                    .collect::<Result<Vec<_>, _>>()?;
                out.insert("$or", parts);
            }
        }
    }
    Ok(out)
}

fn sort_document(sort: &[SortKey]) -> Document {
    let mut out = Document::new();
    for key in sort {
        let order = match key.direction {
            Direction::Asc => 1,
            Direction::Desc => -1,
        };
        out.insert(key.field.as_str(), order);
    }
    out
}
