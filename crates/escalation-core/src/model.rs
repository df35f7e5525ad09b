use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

/// Number prefix of the synthetic incident used when nothing real resolves. Every consumer
/// tells synthetic from real incidents by this prefix alone.
pub const ESCALATION_PREFIX: &str = "ESCALATION-";

pub const DEFAULT_CALL_ID: &str = "default";

/// Sessions older than this are garbage collected from the durable tier.
pub const SESSION_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalIncident {
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_notes: Option<String>,
}

impl CanonicalIncident {
    /// Bare incident carrying only its number; every other field unknown.
    pub fn with_number(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ticket_id: None,
            short_description: None,
            description: None,
            priority: None,
            state: None,
            assignment_group: None,
            created_on: None,
            updated_on: None,
            caller_id: None,
            category: None,
            subcategory: None,
            urgency: None,
            impact: None,
            sla_due: None,
            work_notes: None,
        }
    }

    pub fn escalation_placeholder(now: DateTime<Utc>) -> Self {
        Self {
            short_description: Some("Emergency support call".to_string()),
            description: Some("Critical incident escalation call initiated".to_string()),
            priority: Some("High".to_string()),
            state: Some("New".to_string()),
            created_on: Some(lenient::format_timestamp(now)),
            ..Self::with_number(format!("{ESCALATION_PREFIX}{}", now.timestamp_millis()))
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.number.starts_with(ESCALATION_PREFIX)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_on
            .as_deref()
            .and_then(lenient::parse_timestamp)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_on
            .as_deref()
            .and_then(lenient::parse_timestamp)
    }

    /// Last-modified instant used for freshness comparison: `updated_on`, else `created_on`.
    pub fn freshness_stamp(&self) -> Option<DateTime<Utc>> {
        self.updated_at().or_else(|| self.created_at())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque directory identity; kept as the raw stored value so it can be matched back
    /// against `assigned_to` / `caller_id` references verbatim.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient::de_text")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::de_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::de_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::de_text")]
    pub role: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Unknown contact")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub call_id: String,
    pub caller_number: Option<String>,
    pub user: Option<User>,
    pub incident: Option<CanonicalIncident>,
    pub timestamp: DateTime<Utc>,
    pub status: SessionStatus,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let call_id = call_id.into();
        Self {
            call_id: normalize_call_id(Some(&call_id)),
            caller_number: None,
            user: None,
            incident: None,
            timestamp: now,
            status: SessionStatus::Active,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Expired || self.timestamp < retention_cutoff(now)
    }
}

pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(SESSION_RETENTION_HOURS)
}

pub fn normalize_call_id(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CALL_ID)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn placeholder_number_embeds_millis() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 1, 10, 0, 0)
            .single()
            .unwrap_or_default();
        let incident = CanonicalIncident::escalation_placeholder(now);
        assert_eq!(incident.number, "ESCALATION-1709287200000");
        assert!(incident.is_placeholder());
        assert_eq!(incident.created_at(), Some(now));
        assert!(!CanonicalIncident::with_number("INC1").is_placeholder());
    }

    #[test]
    fn freshness_stamp_prefers_updated_on() {
        let mut incident = CanonicalIncident::with_number("INC1");
        incident.created_on = Some("2024-03-01 08:00:00".to_string());
        assert_eq!(incident.freshness_stamp(), incident.created_at());
        incident.updated_on = Some("2024-03-01 09:00:00".to_string());
        assert_eq!(incident.freshness_stamp(), incident.updated_at());
        incident.updated_on = Some("not a date".to_string());
        assert_eq!(incident.freshness_stamp(), incident.created_at());
    }

    #[test]
    fn call_id_defaults_when_blank() {
        assert_eq!(normalize_call_id(None), "default");
        assert_eq!(normalize_call_id(Some("  ")), "default");
        assert_eq!(normalize_call_id(Some("call-7")), "call-7");
    }

    #[test]
    fn session_expires_after_retention_window() {
        let now = Utc::now();
        let mut session = CallSession::new("c1", now - Duration::hours(25));
        assert!(session.is_expired(now));
        session.timestamp = now - Duration::hours(23);
        assert!(!session.is_expired(now));
        session.status = SessionStatus::Expired;
        assert!(session.is_expired(now));
    }
}
