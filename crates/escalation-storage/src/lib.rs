pub mod filter;
pub mod json_store;
#[cfg(feature = "mongodb-backend")]
pub mod mongo;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use filter::{Direction, Filter, SortKey};
pub use json_store::JsonDocumentStore;
#[cfg(feature = "mongodb-backend")]
pub use mongo::MongoDocumentStore;

pub const TICKETS: &str = "tickets";
pub const INCIDENTS: &str = "incidents";
pub const PROCESSED_INCIDENTS: &str = "processed_incidents";
pub const USERS: &str = "users";
pub const CALL_CONTEXTS: &str = "call_contexts";
pub const GENERATED_SOPS: &str = "generated_sops";

/// Collections reported by the health probe, in report order.
pub const KNOWN_COLLECTIONS: &[&str] =
    &[PROCESSED_INCIDENTS, TICKETS, INCIDENTS, USERS, GENERATED_SOPS];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// The shared document service. Documents travel as JSON; dates and ids use MongoDB
/// relaxed extended JSON (`{"$date": ..}`, `{"$oid": ..}`) so every backend agrees on them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// First document matching `filter` in `sort` order (insertion order when unsorted).
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[SortKey],
    ) -> Result<Option<Value>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Replaces the document whose `key_field` equals `key`, inserting when absent.
    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        key: &Value,
        document: Value,
    ) -> Result<(), StoreError>;
}
