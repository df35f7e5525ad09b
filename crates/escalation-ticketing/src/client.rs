use std::time::Duration;

use escalation_core::{CanonicalIncident, SourceRecord, SourceSchema};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::TicketingConfig;
use crate::error::TicketingError;
use crate::traits::{LookupPurpose, TicketingBackend};
use crate::types::{
    IncidentSearchResponse, ScriptExecutionRequest, ScriptExecutionResponse, SimilaritySearch,
};

#[derive(Clone)]
pub struct HttpTicketingClient {
    config: TicketingConfig,
    client: Client,
}

impl HttpTicketingClient {
    pub fn new(config: TicketingConfig) -> Result<Self, TicketingError> {
        if config.base_url.trim().is_empty() {
            return Err(TicketingError::Config(
                "ticketing backend base url is empty".to_string(),
            ));
        }
        let client = Client::builder().build()?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R, TicketingError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, timeout_ms = timeout.as_millis() as u64, "ticketing request");
        let res = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(TicketingError::Api { status, body });
        }
        Ok(res.json().await?)
    }
}

#[async_trait::async_trait]
impl TicketingBackend for HttpTicketingClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn search_by_number(
        &self,
        number: &str,
        purpose: LookupPurpose,
    ) -> Result<Vec<CanonicalIncident>, TicketingError> {
        let timeouts = &self.config.timeouts;
        let timeout = match purpose {
            LookupPurpose::Freshness => timeouts.freshness,
            LookupPurpose::Lookup => timeouts.lookup,
            LookupPurpose::Status => timeouts.status,
        };
        let parsed: IncidentSearchResponse = self
            .post_json(
                "/api/search_servicenow",
                &json!({ "incident_number": number }),
                timeout,
            )
            .await?;
        parsed
            .incidents
            .into_iter()
            .map(|doc| {
                SourceRecord::decode(SourceSchema::Ticket, doc)
                    .map(|record| record.into_canonical(Some(number)))
                    .map_err(TicketingError::from)
            })
            .collect()
    }

    async fn search_similar(
        &self,
        description: &str,
        assignment_group: Option<&str>,
    ) -> Result<SimilaritySearch, TicketingError> {
        let mut payload = json!({ "description": description });
        if let (Some(group), Some(obj)) = (assignment_group, payload.as_object_mut()) {
            obj.insert("assignment_group".to_string(), json!(group));
        }
        let timeout = self.config.timeouts.search;
        self.post_json("/api/search_incidents", &payload, timeout)
            .await
    }

    async fn execute_scripts(
        &self,
        request: &ScriptExecutionRequest,
    ) -> Result<ScriptExecutionResponse, TicketingError> {
        let timeout = self.config.timeouts.execute;
        self.post_json("/api/execute_scripts", request, timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let client =
            HttpTicketingClient::new(TicketingConfig::new("http://backend:5000/")).expect("client");
        assert_eq!(
            client.url("/api/search_servicenow"),
            "http://backend:5000/api/search_servicenow"
        );
    }

    #[test]
    fn empty_base_url_is_a_config_error() {
        let err = HttpTicketingClient::new(TicketingConfig::new("  ")).err();
        assert!(matches!(err, Some(TicketingError::Config(_))));
    }
}
