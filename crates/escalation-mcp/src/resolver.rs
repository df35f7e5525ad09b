use std::sync::Arc;

use chrono::Utc;
use escalation_core::{normalize_call_id, CanonicalIncident, User};
use tracing::{debug, info};

use crate::repository::IncidentRepository;
use crate::session_cache::SessionCache;

/// How the incident was arrived at. Only changes the phrasing of the rendered context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Escalation,
    LatestIncident,
    ActiveCall,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContext {
    pub call_id: String,
    pub user: Option<User>,
    pub caller_number: Option<String>,
    pub incident: CanonicalIncident,
    pub source_tag: SourceTag,
    /// Incident data was reconciled against a live source during this resolution.
    pub live: bool,
}

#[derive(Clone)]
pub struct IncidentContextResolver {
    repository: IncidentRepository,
    sessions: Arc<SessionCache>,
}

impl IncidentContextResolver {
    pub fn new(repository: IncidentRepository, sessions: Arc<SessionCache>) -> Self {
        Self {
            repository,
            sessions,
        }
    }

    /// Produces the most relevant incident for a call. Never fails: every source that is
    /// down or empty is skipped, and with nothing left an escalation placeholder is used.
    pub async fn resolve(&self, call_id: Option<&str>) -> ResolvedContext {
        let call_id = normalize_call_id(call_id);
        let mut user = None;
        let mut caller_number = None;
        let mut incident = None;

        if let Some(session) = self.sessions.volatile().get(&call_id).await {
            debug!(%call_id, has_incident = session.incident.is_some(), "volatile session hit");
            user = session.user;
            caller_number = session.caller_number;
            incident = session.incident;
        }

        if incident.is_none() {
            if let Some(session) = self.sessions.durable().get(&call_id).await {
                info!(%call_id, "call context restored from store");
                self.sessions.volatile().put(&session).await;
                user = session.user.or(user);
                caller_number = session.caller_number.or(caller_number);
                incident = session.incident;
            }
        }

        let mut discovered = false;
        if incident.is_none() {
            debug!(%call_id, "no call context, discovering latest incident");
            incident = match &user {
                Some(user) => self.repository.fetch_high_priority_open_for_user(user).await,
                None => self.repository.fetch_critical_open().await,
            };
            if incident.is_none() {
                incident = self.repository.fetch_most_recent_any().await;
            }
            discovered = incident.is_some();
        }

        let incident = incident.unwrap_or_else(|| {
            info!(%call_id, "no incident found, using escalation placeholder");
            CanonicalIncident::escalation_placeholder(Utc::now())
        });

        let source_tag = if incident.is_placeholder() {
            SourceTag::Escalation
        } else if discovered || incident.ticket_id.is_some() {
            SourceTag::LatestIncident
        } else {
            SourceTag::ActiveCall
        };

        let (incident, live) = if incident.is_placeholder() {
            (incident, false)
        } else {
            let number = incident.number.clone();
            let refreshed = self.repository.refresh_freshness(&number, incident).await;
            let live = refreshed.is_live();
            (refreshed.incident, live)
        };

        ResolvedContext {
            call_id,
            user,
            caller_number,
            incident,
            source_tag,
            live,
        }
    }
}
