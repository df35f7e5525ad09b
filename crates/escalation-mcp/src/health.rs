use escalation_core::lenient;
use escalation_storage::{
    Filter, SortKey, StoreError, INCIDENTS, KNOWN_COLLECTIONS, PROCESSED_INCIDENTS, TICKETS, USERS,
};
use serde_json::{json, Map, Value};
use tracing::error;

use crate::server::McpServer;

const SAMPLE_FIELDS: &[(&str, &str)] = &[
    ("hasTicketId", "ticket_id"),
    ("hasId", "id"),
    ("hasObjectId", "_id"),
    ("hasNumber", "number"),
    ("hasDescription", "description"),
    ("hasShortDescription", "short_description"),
    ("hasPriority", "priority"),
    ("hasStatus", "status"),
    ("hasClassification", "classification"),
    ("hasSlaInfo", "sla_info"),
    ("hasAssignedPoc", "assigned_poc"),
    ("hasProcessingTimestamp", "processing_timestamp"),
];

impl McpServer {
    /// Liveness plus store statistics. A store failure is reported in the body, never raised.
    pub async fn health_report(&self) -> Value {
        let mut report = json!({
            "status": "healthy",
            "timestamp": lenient::format_timestamp(chrono::Utc::now()),
            "backend_url": self.backend_url(),
            "store": self.store().backend_name(),
        });
        let (database, tickets, users) = match self.collection_counts().await {
            Ok((collections, counts)) => {
                let get = |name: &str| counts.get(name).and_then(Value::as_u64).unwrap_or(0);
                let tickets = get(TICKETS) + get(INCIDENTS);
                let users = get(USERS);
                (
                    json!({"connected": true, "collections": collections, "counts": counts}),
                    tickets,
                    users,
                )
            }
            Err(err) => {
                error!(error = %err, "health probe could not reach the store");
                (json!({"connected": false, "error": err.to_string()}), 0, 0)
            }
        };
        if let Some(obj) = report.as_object_mut() {
            obj.insert("database".to_string(), database);
            obj.insert("tickets".to_string(), json!(tickets));
            obj.insert("users".to_string(), json!(users));
        }
        report
    }

    async fn collection_counts(&self) -> Result<(Vec<String>, Map<String, Value>), StoreError> {
        let store = self.store();
        let mut counts = Map::new();
        for name in KNOWN_COLLECTIONS {
            let count = store.count(name, &Filter::All).await?;
            counts.insert((*name).to_string(), json!(count));
        }
        let collections = store.list_collections().await?;
        Ok((collections, counts))
    }

    /// Newest processed incident as stored, with a summary of which fields it carries.
    pub async fn debug_incident_sample(&self) -> Result<Option<Value>, StoreError> {
        let Some(sample) = self
            .store()
            .find_one(
                PROCESSED_INCIDENTS,
                &Filter::All,
                &[SortKey::desc("processing_timestamp")],
            )
            .await?
        else {
            return Ok(None);
        };
        let fields: Vec<String> = sample
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        let analysis: Map<String, Value> = SAMPLE_FIELDS
            .iter()
            .map(|(label, field)| {
                let present = sample.get(*field).is_some_and(is_truthy);
                ((*label).to_string(), Value::Bool(present))
            })
            .collect();
        Ok(Some(json!({
            "message": "Sample incident structure from processed_incidents collection",
            "incident": sample,
            "availableFields": fields,
            "structureAnalysis": analysis,
        })))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
