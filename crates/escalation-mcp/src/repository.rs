//! Incident lookups across the store collections and the ticketing backend.
//!
//! Every probe is independent: a failing source is logged and treated as empty, and the
//! next source in order is tried.

use std::sync::Arc;

use escalation_core::{CanonicalIncident, SourceRecord, SourceSchema, User};
use escalation_storage::{DocumentStore, Filter, SortKey, INCIDENTS, PROCESSED_INCIDENTS, TICKETS};
use escalation_ticketing::{LookupPurpose, TicketingBackend};
use tracing::{debug, info, warn};

pub const CRITICAL_PRIORITIES: &[&str] =
    &["1 - Critical", "2 - High", "Critical", "High", "1", "2"];
pub const CLOSED_STATES: &[&str] = &["Resolved", "Closed", "Cancelled"];
/// Extra terminal status written by the classification pipeline.
pub const PROCESSED_DONE: &str = "completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentSource {
    Processed,
    Tickets,
    Incidents,
}

impl IncidentSource {
    pub fn collection(self) -> &'static str {
        match self {
            Self::Processed => PROCESSED_INCIDENTS,
            Self::Tickets => TICKETS,
            Self::Incidents => INCIDENTS,
        }
    }

    pub fn schema(self) -> SourceSchema {
        match self {
            Self::Processed => SourceSchema::Processed,
            Self::Tickets | Self::Incidents => SourceSchema::Ticket,
        }
    }

    fn number_filter(self, number: &str) -> Filter {
        match self {
            Self::Processed => Filter::Or(vec![
                Filter::eq("number", number),
                Filter::eq("ticket_id", number),
                Filter::eq("incident_number", number),
            ]),
            Self::Tickets | Self::Incidents => Filter::eq("number", number),
        }
    }

    /// Open, high-priority records; with a user, also anything tied to that user.
    fn open_filter(self, user: Option<&User>) -> Filter {
        let mut any_of = Vec::new();
        match self {
            Self::Processed => {
                if let Some(name) = user.and_then(|u| u.full_name.as_deref()) {
                    any_of.push(Filter::eq("assigned_poc", name));
                }
                any_of.push(Filter::is_in(
                    "priority",
                    CRITICAL_PRIORITIES.iter().copied(),
                ));
                any_of.push(Filter::is_in(
                    "sla_info.priority",
                    CRITICAL_PRIORITIES.iter().copied(),
                ));
                let done = CLOSED_STATES.iter().copied().chain([PROCESSED_DONE]);
                Filter::And(vec![Filter::Or(any_of), Filter::not_in("status", done)])
            }
            Self::Tickets | Self::Incidents => {
                if let Some(user) = user {
                    if let Some(id) = &user.id {
                        any_of.push(Filter::eq("assigned_to", id.clone()));
                    }
                    if let Some(role) = &user.role {
                        any_of.push(Filter::eq("assignment_group", role.as_str()));
                    }
                    if let Some(id) = &user.id {
                        any_of.push(Filter::eq("caller_id", id.clone()));
                    }
                    if let Some(name) = &user.full_name {
                        any_of.push(Filter::eq("assigned_to", name.as_str()));
                    }
                }
                any_of.push(Filter::is_in(
                    "priority",
                    CRITICAL_PRIORITIES.iter().copied(),
                ));
                Filter::And(vec![
                    Filter::Or(any_of),
                    Filter::not_in("state", CLOSED_STATES.iter().copied()),
                ])
            }
        }
    }

    fn recency_sort(self) -> Vec<SortKey> {
        match self {
            Self::Processed => vec![
                SortKey::desc("processing_timestamp"),
                SortKey::desc("created_on"),
            ],
            Self::Tickets | Self::Incidents => vec![SortKey::desc("created_on")],
        }
    }
}

const OPEN_ORDER: [IncidentSource; 3] = [
    IncidentSource::Processed,
    IncidentSource::Tickets,
    IncidentSource::Incidents,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessOrigin {
    Store,
    Api,
    /// Neither source answered; the caller's copy is returned untouched.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    pub incident: CanonicalIncident,
    pub origin: FreshnessOrigin,
}

impl Refreshed {
    pub fn is_live(&self) -> bool {
        self.origin != FreshnessOrigin::Stale
    }
}

/// Outcome of an operator status query.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusLookup {
    Found(CanonicalIncident),
    NotFound,
    /// The backend failed and the store had nothing either.
    Unavailable,
}

#[derive(Clone)]
pub struct IncidentRepository {
    store: Arc<dyn DocumentStore>,
    ticketing: Arc<dyn TicketingBackend>,
}

impl IncidentRepository {
    pub fn new(store: Arc<dyn DocumentStore>, ticketing: Arc<dyn TicketingBackend>) -> Self {
        Self { store, ticketing }
    }

    pub fn ticketing(&self) -> &Arc<dyn TicketingBackend> {
        &self.ticketing
    }

    async fn probe(
        &self,
        source: IncidentSource,
        filter: &Filter,
        sort: &[SortKey],
        fallback_number: Option<&str>,
    ) -> Option<CanonicalIncident> {
        let collection = source.collection();
        let doc = match self.store.find_one(collection, filter, sort).await {
            Ok(found) => found?,
            Err(err) => {
                warn!(collection, error = %err, "incident probe failed");
                return None;
            }
        };
        match SourceRecord::decode(source.schema(), doc) {
            Ok(record) => Some(record.into_canonical(fallback_number)),
            Err(err) => {
                warn!(collection, error = %err, "skipping undecodable incident record");
                None
            }
        }
    }

    async fn probe_api(&self, number: &str, purpose: LookupPurpose) -> Option<CanonicalIncident> {
        match self.ticketing.search_by_number(number, purpose).await {
            Ok(found) => found.into_iter().next(),
            Err(err) => {
                warn!(number, ?purpose, error = %err, "ticketing lookup failed");
                None
            }
        }
    }

    async fn probe_store_by_number(&self, number: &str) -> Option<CanonicalIncident> {
        let sort = [SortKey::desc("created_on")];
        for source in [IncidentSource::Tickets, IncidentSource::Incidents] {
            if let Some(found) = self
                .probe(source, &source.number_filter(number), &sort, Some(number))
                .await
            {
                debug!(
                    number,
                    collection = source.collection(),
                    "incident found in store"
                );
                return Some(found);
            }
        }
        None
    }

    /// `tickets`, then `incidents`, then the ticketing backend.
    pub async fn fetch_by_number(&self, number: &str) -> Option<CanonicalIncident> {
        if let Some(found) = self.probe_store_by_number(number).await {
            return Some(found);
        }
        self.probe_api(number, LookupPurpose::Lookup).await
    }

    pub async fn fetch_high_priority_open_for_user(
        &self,
        user: &User,
    ) -> Option<CanonicalIncident> {
        self.first_open(Some(user)).await
    }

    pub async fn fetch_critical_open(&self) -> Option<CanonicalIncident> {
        self.first_open(None).await
    }

    async fn first_open(&self, user: Option<&User>) -> Option<CanonicalIncident> {
        let sort = [SortKey::desc("created_on")];
        for source in OPEN_ORDER {
            if let Some(found) = self
                .probe(source, &source.open_filter(user), &sort, None)
                .await
            {
                info!(
                    number = %found.number,
                    collection = source.collection(),
                    for_user = user.is_some(),
                    "open high-priority incident found"
                );
                return Some(found);
            }
        }
        None
    }

    /// Newest record of any status; first non-empty collection wins.
    pub async fn fetch_most_recent_any(&self) -> Option<CanonicalIncident> {
        for source in OPEN_ORDER {
            if let Some(found) = self
                .probe(source, &Filter::All, &source.recency_sort(), None)
                .await
            {
                info!(
                    number = %found.number,
                    collection = source.collection(),
                    "latest incident found"
                );
                return Some(found);
            }
        }
        debug!("no incidents in any collection");
        None
    }

    /// Reconciles `stale` against the freshest store copy and the ticketing backend.
    ///
    /// The copy with the later `updated_on` (else `created_on`) wins; a tie keeps the store
    /// copy, so refreshing twice gives the same answer. When only one side has a readable
    /// timestamp that side wins, otherwise the store copy is preferred. The result always
    /// carries `number`.
    pub async fn refresh_freshness(&self, number: &str, stale: CanonicalIncident) -> Refreshed {
        let sort = [SortKey::desc("updated_on"), SortKey::desc("created_on")];
        let mut store_copy = None;
        for source in OPEN_ORDER {
            store_copy = self
                .probe(source, &source.number_filter(number), &sort, Some(number))
                .await;
            if store_copy.is_some() {
                break;
            }
        }
        let api_copy = self.probe_api(number, LookupPurpose::Freshness).await;

        let (mut incident, origin) = match (store_copy, api_copy) {
            (None, None) => {
                debug!(number, "no fresher copy available");
                return Refreshed {
                    incident: stale,
                    origin: FreshnessOrigin::Stale,
                };
            }
            (Some(store), None) => (store, FreshnessOrigin::Store),
            (None, Some(api)) => (api, FreshnessOrigin::Api),
            (Some(store), Some(api)) => {
                match (store.freshness_stamp(), api.freshness_stamp()) {
                    (Some(s), Some(a)) if a > s => (api, FreshnessOrigin::Api),
                    (None, Some(_)) => (api, FreshnessOrigin::Api),
                    _ => (store, FreshnessOrigin::Store),
                }
            }
        };
        number.clone_into(&mut incident.number);
        debug!(number, ?origin, "incident refreshed");
        Refreshed { incident, origin }
    }

    /// Backend first; when it fails or knows nothing, the store probes of
    /// [`Self::fetch_by_number`].
    pub async fn lookup_status(&self, number: &str) -> StatusLookup {
        let backend_failed = match self
            .ticketing
            .search_by_number(number, LookupPurpose::Status)
            .await
        {
            Ok(found) => {
                if let Some(first) = found.into_iter().next() {
                    return StatusLookup::Found(first);
                }
                false
            }
            Err(err) => {
                warn!(number, error = %err, "status lookup failed, falling back to store");
                true
            }
        };
        match self.probe_store_by_number(number).await {
            Some(found) => StatusLookup::Found(found),
            None if backend_failed => StatusLookup::Unavailable,
            None => StatusLookup::NotFound,
        }
    }
}
