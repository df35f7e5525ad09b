#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use escalation_core::{CanonicalIncident, NationalPrefixPlan};
use escalation_mcp::protocol::JsonRpcRequest;
use escalation_mcp::McpServer;
use escalation_storage::{DocumentStore, Filter, JsonDocumentStore, SortKey, StoreError};
use escalation_ticketing::{
    LookupPurpose, ScriptExecutionRequest, ScriptExecutionResponse, SimilaritySearch,
    TicketingBackend, TicketingError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Ticketing backend answering from canned data. Anything not scripted fails.
#[derive(Default)]
pub struct ScriptedTicketing {
    pub incidents: Mutex<HashMap<String, CanonicalIncident>>,
    pub lookups_fail: bool,
    pub similar: Option<SimilaritySearch>,
    pub execution: Option<ScriptExecutionResponse>,
    pub lookups: Mutex<Vec<(String, LookupPurpose)>>,
    pub executed: Mutex<Vec<ScriptExecutionRequest>>,
}

impl ScriptedTicketing {
    pub fn with_incident(self, incident: CanonicalIncident) -> Self {
        self.incidents
            .lock()
            .insert(incident.number.clone(), incident);
        self
    }

    pub fn failing() -> Self {
        Self {
            lookups_fail: true,
            ..Self::default()
        }
    }
}

fn unavailable() -> TicketingError {
    TicketingError::InvalidResponse("backend unreachable".to_string())
}

#[async_trait]
impl TicketingBackend for ScriptedTicketing {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search_by_number(
        &self,
        number: &str,
        purpose: LookupPurpose,
    ) -> Result<Vec<CanonicalIncident>, TicketingError> {
        self.lookups.lock().push((number.to_string(), purpose));
        if self.lookups_fail {
            return Err(unavailable());
        }
        let found = self.incidents.lock().get(number).cloned();
        Ok(found.into_iter().collect())
    }

    async fn search_similar(
        &self,
        _description: &str,
        _assignment_group: Option<&str>,
    ) -> Result<SimilaritySearch, TicketingError> {
        self.similar.clone().ok_or_else(unavailable)
    }

    async fn execute_scripts(
        &self,
        request: &ScriptExecutionRequest,
    ) -> Result<ScriptExecutionResponse, TicketingError> {
        self.executed.lock().push(request.clone());
        self.execution.clone().ok_or(TicketingError::Api {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }
}

/// Store whose every call fails, for outage paths.
pub struct DownStore;

fn down() -> StoreError {
    StoreError::Backend("connection refused".to_string())
}

#[async_trait]
impl DocumentStore for DownStore {
    fn backend_name(&self) -> &'static str {
        "down"
    }

    async fn find_one(
        &self,
        _collection: &str,
        _filter: &Filter,
        _sort: &[SortKey],
    ) -> Result<Option<Value>, StoreError> {
        Err(down())
    }

    async fn count(&self, _collection: &str, _filter: &Filter) -> Result<u64, StoreError> {
        Err(down())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Err(down())
    }

    async fn delete_many(&self, _collection: &str, _filter: &Filter) -> Result<u64, StoreError> {
        Err(down())
    }

    async fn upsert(
        &self,
        _collection: &str,
        _key_field: &str,
        _key: &Value,
        _document: Value,
    ) -> Result<(), StoreError> {
        Err(down())
    }
}

/// Store with only some collections down; the rest are served from `inner`.
pub struct PartialOutageStore {
    pub inner: Arc<JsonDocumentStore>,
    pub down: &'static [&'static str],
}

impl PartialOutageStore {
    fn reachable(&self, collection: &str) -> Result<(), StoreError> {
        if self.down.contains(&collection) {
            Err(down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for PartialOutageStore {
    fn backend_name(&self) -> &'static str {
        "partial"
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: &[SortKey],
    ) -> Result<Option<Value>, StoreError> {
        self.reachable(collection)?;
        self.inner.find_one(collection, filter, sort).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.reachable(collection)?;
        self.inner.count(collection, filter).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_collections().await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.reachable(collection)?;
        self.inner.delete_many(collection, filter).await
    }

    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        key: &Value,
        document: Value,
    ) -> Result<(), StoreError> {
        self.reachable(collection)?;
        self.inner.upsert(collection, key_field, key, document).await
    }
}

/// Ticketing backend whose every call panics.
pub struct CrashingTicketing;

#[async_trait]
impl TicketingBackend for CrashingTicketing {
    fn name(&self) -> &'static str {
        "crashing"
    }

    async fn search_by_number(
        &self,
        _number: &str,
        _purpose: LookupPurpose,
    ) -> Result<Vec<CanonicalIncident>, TicketingError> {
        panic!("ticketing backend crashed")
    }

    async fn search_similar(
        &self,
        _description: &str,
        _assignment_group: Option<&str>,
    ) -> Result<SimilaritySearch, TicketingError> {
        panic!("ticketing backend crashed")
    }

    async fn execute_scripts(
        &self,
        _request: &ScriptExecutionRequest,
    ) -> Result<ScriptExecutionResponse, TicketingError> {
        panic!("ticketing backend crashed")
    }
}

pub fn seeded_store(seed: &[(&str, Value)]) -> Arc<JsonDocumentStore> {
    let store = JsonDocumentStore::in_memory();
    for (collection, doc) in seed {
        store
            .insert(collection, doc.clone())
            .expect("seed document");
    }
    Arc::new(store)
}

pub fn server_with(
    store: Arc<dyn DocumentStore>,
    ticketing: Arc<dyn TicketingBackend>,
) -> McpServer {
    McpServer::new(
        store,
        ticketing,
        Arc::new(NationalPrefixPlan::india()),
        "http://backend.test",
    )
}

pub fn request(id: u64, method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(id)),
        method: method.to_string(),
        params,
    }
}

pub async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> String {
    let response = server
        .handle_request(request(
            1,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        ))
        .await
        .expect("tool response");
    assert!(
        response.error.is_none(),
        "tool call errored: {:?}",
        response.error
    );
    response.result.expect("tool result")["content"][0]["text"]
        .as_str()
        .expect("text content")
        .to_string()
}

pub fn ticket(number: &str, priority: &str, state: &str, created_on: &str) -> Value {
    json!({
        "number": number,
        "short_description": format!("{number} outage"),
        "priority": priority,
        "state": state,
        "assignment_group": "Network Team",
        "created_on": created_on,
    })
}
