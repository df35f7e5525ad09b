use chrono::Utc;
use escalation_core::lenient::de_text;
use escalation_core::{
    normalize_call_id, CallSession, CallSetupRecord, CanonicalIncident, SourceRecord, User,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::McpServer;

/// Call-setup event pushed by the telephony side before the assistant joins the call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallSetupEvent {
    #[serde(default, deserialize_with = "de_text")]
    pub to_number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub call_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub incident_number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub incident_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub assignment_group: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub created_on: Option<String>,
}

impl CallSetupEvent {
    fn payload_incident(&self) -> CanonicalIncident {
        SourceRecord::CallSetup(CallSetupRecord {
            incident_number: self.incident_number.clone(),
            incident_description: self.incident_description.clone(),
            short_description: self.short_description.clone(),
            priority: self.priority.clone(),
            assignment_group: self.assignment_group.clone(),
            state: self.state.clone(),
            created_on: self.created_on.clone(),
        })
        .into_canonical(None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallSetupOutcome {
    pub status: &'static str,
    pub call_id: String,
    pub incident_number: Option<String>,
    pub user: Option<User>,
    pub incident: Option<CanonicalIncident>,
    /// The incident came from the store or the ticketing backend rather than the payload.
    pub has_live_data: bool,
    pub enhanced: bool,
}

impl McpServer {
    /// Records who is calling and about what, so later tool calls on the same call id
    /// resolve without searching.
    pub async fn register_call(&self, event: CallSetupEvent) -> CallSetupOutcome {
        let call_id = normalize_call_id(event.call_id.as_deref());
        info!(%call_id, incident = ?event.incident_number, "call setup received");

        let user = match event.to_number.as_deref() {
            Some(phone) => self.directory().find_user_by_phone(phone).await,
            None => None,
        };

        let mut has_live_data = false;
        let mut incident = None;
        if let Some(number) = event.incident_number.as_deref() {
            incident = self.repository().fetch_by_number(number).await;
            has_live_data = incident.is_some();
            if incident.is_none() {
                incident = Some(event.payload_incident());
            }
        }
        if incident.is_none() {
            if let Some(user) = &user {
                incident = self
                    .repository()
                    .fetch_high_priority_open_for_user(user)
                    .await;
                has_live_data = incident.is_some();
            }
        }

        if user.is_some() || incident.is_some() {
            let mut session = CallSession::new(call_id.clone(), Utc::now());
            session.caller_number.clone_from(&event.to_number);
            session.user.clone_from(&user);
            session.incident.clone_from(&incident);
            self.sessions().store(&session).await;
            info!(
                %call_id,
                user = user.as_ref().map(User::display_name),
                incident = incident.as_ref().map(|i| i.number.as_str()),
                "call context stored"
            );
        }

        CallSetupOutcome {
            status: "success",
            call_id,
            incident_number: incident
                .as_ref()
                .map(|i| i.number.clone())
                .or(event.incident_number),
            user,
            incident,
            has_live_data,
            enhanced: true,
        }
    }
}
