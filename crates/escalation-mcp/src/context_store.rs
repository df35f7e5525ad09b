use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use escalation_core::lenient::{self, date_value};
use escalation_core::{
    retention_cutoff, CallSession, SessionStatus, SourceRecord, SourceSchema, User,
};
use escalation_storage::{DocumentStore, Filter, SortKey, CALL_CONTEXTS};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::session_cache::SessionStore;

/// Durable call-context tier in the shared store, authoritative across processes.
#[derive(Clone)]
pub struct CallContextStore {
    store: Arc<dyn DocumentStore>,
}

impl CallContextStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Replace-or-insert by call id, then drop every context past the retention window.
    /// Failures are logged, never raised.
    pub async fn upsert(&self, session: &CallSession) {
        let key = Value::from(session.call_id.as_str());
        if let Err(err) = self
            .store
            .upsert(CALL_CONTEXTS, "call_id", &key, to_document(session))
            .await
        {
            warn!(call_id = %session.call_id, error = %err, "failed to persist call context");
            return;
        }
        let cutoff = date_value(retention_cutoff(Utc::now()));
        match self
            .store
            .delete_many(CALL_CONTEXTS, &Filter::lt("timestamp", cutoff))
            .await
        {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "expired call contexts collected"),
            Err(err) => warn!(error = %err, "call context cleanup failed"),
        }
    }

    /// Newest active context for `call_id`; anything past retention reads as absent.
    pub async fn get(&self, call_id: &str) -> Option<CallSession> {
        let filter = Filter::And(vec![
            Filter::eq("call_id", call_id),
            Filter::eq("status", SessionStatus::Active.as_str()),
        ]);
        let doc = match self
            .store
            .find_one(CALL_CONTEXTS, &filter, &[SortKey::desc("timestamp")])
            .await
        {
            Ok(found) => found?,
            Err(err) => {
                warn!(call_id, error = %err, "call context lookup failed");
                return None;
            }
        };
        let session = from_document(&doc)?;
        if session.is_expired(Utc::now()) {
            debug!(call_id, "stored call context expired");
            return None;
        }
        Some(session)
    }
}

#[async_trait]
impl SessionStore for CallContextStore {
    async fn get(&self, call_id: &str) -> Option<CallSession> {
        Self::get(self, call_id).await
    }

    async fn put(&self, session: &CallSession) {
        self.upsert(session).await;
    }
}

fn to_document(session: &CallSession) -> Value {
    json!({
        "call_id": session.call_id,
        "caller_number": session.caller_number,
        "user": session.user,
        "incident": session.incident,
        "timestamp": date_value(session.timestamp),
        "status": session.status.as_str(),
    })
}

fn from_document(doc: &Value) -> Option<CallSession> {
    let call_id = doc.get("call_id").and_then(lenient::text)?;
    let Some(timestamp) = doc.get("timestamp").and_then(lenient::timestamp) else {
        warn!(call_id, "call context without a readable timestamp");
        return None;
    };
    let user = doc
        .get("user")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<User>(v.clone()).ok());
    let incident = doc
        .get("incident")
        .filter(|v| v.is_object())
        .and_then(|v| SourceRecord::decode(SourceSchema::Ticket, v.clone()).ok())
        .map(|record| record.into_canonical(None));
    let status = match doc.get("status").and_then(Value::as_str) {
        Some("expired") => SessionStatus::Expired,
        _ => SessionStatus::Active,
    };
    Some(CallSession {
        call_id,
        caller_number: doc.get("caller_number").and_then(lenient::text),
        user,
        incident,
        timestamp,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use escalation_core::CanonicalIncident;
    use escalation_storage::JsonDocumentStore;

    fn session(call_id: &str, age_hours: i64) -> CallSession {
        let mut session = CallSession::new(call_id, Utc::now() - Duration::hours(age_hours));
        session.caller_number = Some("+919999999999".to_string());
        session.incident = Some(CanonicalIncident {
            priority: Some("1 - Critical".to_string()),
            ticket_id: Some("TKT-7".to_string()),
            ..CanonicalIncident::with_number("INC0010001")
        });
        session
    }

    #[tokio::test]
    async fn stored_session_reads_back() {
        let contexts = CallContextStore::new(Arc::new(JsonDocumentStore::in_memory()));
        let original = session("call-1", 0);
        contexts.upsert(&original).await;

        let loaded = contexts.get("call-1").await.expect("session");
        assert_eq!(loaded.caller_number, original.caller_number);
        assert_eq!(loaded.incident, original.incident);
        assert_eq!(
            loaded.timestamp.timestamp_millis(),
            original.timestamp.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn upsert_collects_contexts_older_than_a_day() {
        let store = Arc::new(JsonDocumentStore::in_memory());
        let contexts = CallContextStore::new(store.clone());
        contexts.upsert(&session("stale", 30)).await;
        contexts.upsert(&session("fresh", 1)).await;

        assert!(contexts.get("stale").await.is_none());
        assert!(contexts.get("fresh").await.is_some());
        let remaining = store
            .count(CALL_CONTEXTS, &Filter::All)
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn expired_status_is_not_returned() {
        let contexts = CallContextStore::new(Arc::new(JsonDocumentStore::in_memory()));
        let mut ended = session("call-2", 0);
        ended.status = SessionStatus::Expired;
        contexts.upsert(&ended).await;
        assert!(contexts.get("call-2").await.is_none());
    }
}
