use async_trait::async_trait;
use escalation_core::CanonicalIncident;

use crate::error::TicketingError;
use crate::types::{ScriptExecutionRequest, ScriptExecutionResponse, SimilaritySearch};

/// Why an incident is being looked up by number; selects the request deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPurpose {
    /// Reconciling a copy that is already in hand.
    Freshness,
    /// Last-resort probe after the store missed.
    Lookup,
    /// Operator asked for a specific incident's status.
    Status,
}

#[async_trait]
pub trait TicketingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Incidents whose number matches; empty when the backend knows none.
    async fn search_by_number(
        &self,
        number: &str,
        purpose: LookupPurpose,
    ) -> Result<Vec<CanonicalIncident>, TicketingError>;

    async fn search_similar(
        &self,
        description: &str,
        assignment_group: Option<&str>,
    ) -> Result<SimilaritySearch, TicketingError>;

    async fn execute_scripts(
        &self,
        request: &ScriptExecutionRequest,
    ) -> Result<ScriptExecutionResponse, TicketingError>;
}
