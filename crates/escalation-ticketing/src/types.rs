use escalation_core::lenient::de_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IncidentSearchResponse {
    #[serde(default)]
    pub incidents: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimilarIncident {
    #[serde(default, deserialize_with = "de_text")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub similarity: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub assignment_group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimilaritySearch {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub similar_incidents: Option<Vec<SimilarIncident>>,
    #[serde(default, deserialize_with = "de_text")]
    pub generated_sop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptExecutionRequest {
    pub ticket_id: String,
    pub scripts: Vec<String>,
    pub description: String,
    pub assignment_group: String,
    pub priority: String,
}

impl ScriptExecutionRequest {
    /// Emergency run of a single named script, filed against the critical response team.
    pub fn emergency(ticket_id: impl Into<String>, script_name: impl Into<String>) -> Self {
        let script_name = script_name.into();
        Self {
            ticket_id: ticket_id.into(),
            description: format!("CRITICAL: Emergency script execution - {script_name}"),
            scripts: vec![script_name],
            assignment_group: "Critical Response Team".to_string(),
            priority: "critical".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptExecutionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "de_text")]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<ScriptRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptRun {
    #[serde(default, deserialize_with = "de_text")]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub resolution_results: Option<Vec<ResolutionStep>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolutionStep {
    #[serde(default, deserialize_with = "de_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub output: Option<String>,
}

impl ResolutionStep {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn similarity_payload_tolerates_numeric_scores() {
        let parsed: SimilaritySearch = serde_json::from_value(json!({
            "success": true,
            "similar_incidents": [
                {
                    "number": "INC1",
                    "similarity": 0.92,
                    "resolution": "Restart",
                    "assignment_group": "Network"
                }
            ],
            "generated_sop": "Step 1: isolate"
        }))
        .expect("parse");
        let first = parsed
            .similar_incidents
            .as_ref()
            .and_then(|v| v.first())
            .expect("one incident");
        assert_eq!(first.similarity.as_deref(), Some("0.92"));
        assert!(parsed.generated_sop.is_some());
    }

    #[test]
    fn emergency_request_carries_fixed_routing() {
        let request = ScriptExecutionRequest::emergency("INC1", "restart_service");
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            json!({
                "ticket_id": "INC1",
                "scripts": ["restart_service"],
                "description": "CRITICAL: Emergency script execution - restart_service",
                "assignment_group": "Critical Response Team",
                "priority": "critical"
            })
        );
    }
}
