use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use escalation_core::CallSession;
use parking_lot::RwLock;

/// One tier of call-session storage, keyed by call id. Writes replace.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, call_id: &str) -> Option<CallSession>;
    async fn put(&self, session: &CallSession);
}

/// In-process tier. Last writer wins per call id.
#[derive(Debug, Default)]
pub struct VolatileSessions {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl VolatileSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for VolatileSessions {
    async fn get(&self, call_id: &str) -> Option<CallSession> {
        let now = Utc::now();
        self.sessions
            .read()
            .get(call_id)
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    async fn put(&self, session: &CallSession) {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.call_id.clone(), session.clone());
    }
}

/// Volatile tier in front of the durable one. Reads go tier by tier through the
/// resolver; writes go to both.
#[derive(Clone)]
pub struct SessionCache {
    volatile: Arc<dyn SessionStore>,
    durable: Arc<dyn SessionStore>,
}

impl SessionCache {
    pub fn new(volatile: Arc<dyn SessionStore>, durable: Arc<dyn SessionStore>) -> Self {
        Self { volatile, durable }
    }

    pub fn volatile(&self) -> &dyn SessionStore {
        self.volatile.as_ref()
    }

    pub fn durable(&self) -> &dyn SessionStore {
        self.durable.as_ref()
    }

    pub async fn store(&self, session: &CallSession) {
        self.volatile.put(session).await;
        self.durable.put(session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn put_replaces_by_call_id() {
        let tier = VolatileSessions::new();
        let mut session = CallSession::new("call-1", Utc::now());
        session.caller_number = Some("111".to_string());
        tier.put(&session).await;
        session.caller_number = Some("222".to_string());
        tier.put(&session).await;

        assert_eq!(tier.len(), 1);
        let stored = tier.get("call-1").await.expect("session");
        assert_eq!(stored.caller_number.as_deref(), Some("222"));
    }

    #[tokio::test]
    async fn sessions_past_retention_are_invisible_and_collected() {
        let tier = VolatileSessions::new();
        tier.put(&CallSession::new("old", Utc::now() - Duration::hours(25)))
            .await;
        assert!(tier.get("old").await.is_none());

        tier.put(&CallSession::new("new", Utc::now())).await;
        assert_eq!(tier.len(), 1);
    }
}
