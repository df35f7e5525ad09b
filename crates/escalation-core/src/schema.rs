//! Source schemas for incident-like records and their adapters into [`CanonicalIncident`].
//!
//! Each producer names the same concepts differently. The mapping lives here, one adapter
//! per schema, so call sites only ever see the canonical shape.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::lenient::{self, de_text};
use crate::model::CanonicalIncident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSchema {
    /// `tickets` / `incidents` collections and ticketing API search results.
    Ticket,
    /// `processed_incidents`, written by the classification pipeline.
    Processed,
    /// Incident metadata attached to a call-setup webhook.
    CallSetup,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketRecord {
    #[serde(rename = "_id", default, deserialize_with = "de_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub incident_number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub ticket_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub incident_description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub assignment_group: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub created_on: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub updated_on: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub caller_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub urgency: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub impact: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub sla_due: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub work_notes: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedRecord {
    #[serde(rename = "_id", default, deserialize_with = "de_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub ticket_id: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub assigned_poc: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub processing_timestamp: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub created_on: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub classification: Option<Value>,
    #[serde(default)]
    pub sla_info: Option<Value>,
}

impl ProcessedRecord {
    fn category(&self) -> Option<String> {
        self.classification
            .as_ref()
            .and_then(|c| c.get("category"))
            .and_then(lenient::text)
    }

    fn sla_priority(&self) -> Option<String> {
        self.sla_info
            .as_ref()
            .and_then(|s| s.get("priority"))
            .and_then(lenient::text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallSetupRecord {
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

#[derive(Debug, Clone)]
pub enum SourceRecord {
    Ticket(TicketRecord),
    Processed(ProcessedRecord),
    CallSetup(CallSetupRecord),
}

impl SourceRecord {
    pub fn decode(schema: SourceSchema, document: Value) -> Result<Self, serde_json::Error> {
        Ok(match schema {
            SourceSchema::Ticket => Self::Ticket(serde_json::from_value(document)?),
            SourceSchema::Processed => Self::Processed(serde_json::from_value(document)?),
            SourceSchema::CallSetup => Self::CallSetup(serde_json::from_value(document)?),
        })
    }

    /// Maps the record into the canonical shape. `fallback_number` is used when the record
    /// carries no number of its own (e.g. the number a lookup was keyed by); after that the
    /// record's `_id`, and finally a synthesized `UNRESOLVED-<millis>` identifier.
    pub fn into_canonical(self, fallback_number: Option<&str>) -> CanonicalIncident {
        match self {
            Self::Ticket(r) => ticket_to_canonical(r, fallback_number),
            Self::Processed(r) => processed_to_canonical(r, fallback_number),
            Self::CallSetup(r) => call_setup_to_canonical(r, fallback_number),
        }
    }
}

fn ticket_to_canonical(r: TicketRecord, fallback: Option<&str>) -> CanonicalIncident {
    let number = pick_number([r.number, r.incident_number], fallback, r.id);
    CanonicalIncident {
        number,
        ticket_id: r.ticket_id,
        short_description: r.short_description.or_else(|| r.description.clone()),
        description: r.description.or(r.incident_description),
        priority: r.priority,
        state: r.state,
        assignment_group: r.assignment_group,
        created_on: r.created_on,
        updated_on: r.updated_on,
        caller_id: r.caller_id,
        category: r.category,
        subcategory: r.subcategory,
        urgency: r.urgency,
        impact: r.impact,
        sla_due: r.sla_due,
        work_notes: r.work_notes.or(r.comments),
    }
}

fn processed_to_canonical(r: ProcessedRecord, fallback: Option<&str>) -> CanonicalIncident {
    let category = r.category();
    let priority = r
        .sla_priority()
        .or_else(|| r.priority.clone())
        .unwrap_or_else(|| "Medium".to_string());
    let team = r
        .assigned_poc
        .clone()
        .unwrap_or_else(|| "Support Team".to_string());
    let short_description = format!(
        "{} incident - {}",
        category.as_deref().unwrap_or("Uncategorized"),
        team
    );
    let number = pick_number([r.ticket_id.clone(), r.number], fallback, r.id);
    CanonicalIncident {
        ticket_id: r.ticket_id.or_else(|| Some(number.clone())),
        short_description: Some(short_description),
        description: Some(
            category
                .clone()
                .unwrap_or_else(|| "Processed incident".to_string()),
        ),
        priority: Some(priority),
        state: Some(r.status.unwrap_or_else(|| "Processed".to_string())),
        assignment_group: Some(team),
        created_on: r.processing_timestamp.or(r.created_on),
        updated_on: r.updated_on,
        category,
        ..CanonicalIncident::with_number(number)
    }
}

fn call_setup_to_canonical(r: CallSetupRecord, fallback: Option<&str>) -> CanonicalIncident {
    let number = pick_number([r.incident_number, None], fallback, None);
    CanonicalIncident {
        short_description: r
            .short_description
            .or_else(|| r.incident_description.clone()),
        description: r.incident_description,
        priority: r.priority,
        state: r.state,
        assignment_group: r.assignment_group,
        created_on: r.created_on,
        ..CanonicalIncident::with_number(number)
    }
}

fn pick_number(own: [Option<String>; 2], fallback: Option<&str>, id: Option<String>) -> String {
    own.into_iter()
        .flatten()
        .next()
        .or_else(|| {
            fallback
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        })
        .or(id)
        .unwrap_or_else(|| format!("UNRESOLVED-{}", Utc::now().timestamp_millis()))
}
