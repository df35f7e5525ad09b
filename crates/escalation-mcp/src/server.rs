use std::sync::Arc;

use chrono::Utc;
use escalation_core::lenient::de_text;
use escalation_core::{generate_ticket_reference, NationalPrefixPlan, PhoneCandidateGenerator};
#[cfg(feature = "mongodb-backend")]
use escalation_storage::MongoDocumentStore;
use escalation_storage::{DocumentStore, JsonDocumentStore};
use escalation_ticketing::{
    HttpTicketingClient, ScriptExecutionRequest, TicketingBackend, TicketingConfig, TicketingError,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{ServerConfig, StoreKind};
use crate::context_store::CallContextStore;
use crate::directory::UserDirectory;
use crate::error::ServerError;
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND,
};
use crate::render;
use crate::repository::{IncidentRepository, StatusLookup};
use crate::resolver::IncidentContextResolver;
use crate::session_cache::{SessionCache, VolatileSessions};

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const TOOL_NAMES: [&str; 5] = [
    "get_current_incident_context",
    "get_incident_status",
    "search_incidents",
    "get_sop_document",
    "execute_resolution_script",
];

pub struct McpServer {
    store: Arc<dyn DocumentStore>,
    ticketing: Arc<dyn TicketingBackend>,
    directory: UserDirectory,
    repository: IncidentRepository,
    sessions: Arc<SessionCache>,
    resolver: IncidentContextResolver,
    backend_url: String,
}

impl McpServer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ticketing: Arc<dyn TicketingBackend>,
        phones: Arc<dyn PhoneCandidateGenerator>,
        backend_url: impl Into<String>,
    ) -> Self {
        let sessions = Arc::new(SessionCache::new(
            Arc::new(VolatileSessions::new()),
            Arc::new(CallContextStore::new(Arc::clone(&store))),
        ));
        Self::with_sessions(store, ticketing, phones, sessions, backend_url)
    }

    pub fn with_sessions(
        store: Arc<dyn DocumentStore>,
        ticketing: Arc<dyn TicketingBackend>,
        phones: Arc<dyn PhoneCandidateGenerator>,
        sessions: Arc<SessionCache>,
        backend_url: impl Into<String>,
    ) -> Self {
        let repository = IncidentRepository::new(Arc::clone(&store), Arc::clone(&ticketing));
        Self {
            directory: UserDirectory::new(Arc::clone(&store), phones),
            resolver: IncidentContextResolver::new(repository.clone(), Arc::clone(&sessions)),
            repository,
            sessions,
            store,
            ticketing,
            backend_url: backend_url.into(),
        }
    }

    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let store: Arc<dyn DocumentStore> = match config.store {
            StoreKind::Json => Arc::new(JsonDocumentStore::open(&config.store_path)?),
            StoreKind::Memory => Arc::new(JsonDocumentStore::in_memory()),
            #[cfg(feature = "mongodb-backend")]
            StoreKind::Mongo => {
                let uri = config
                    .mongo_url
                    .as_deref()
                    .ok_or(crate::config::ConfigError::Missing("MONGO_URL"))?;
                Arc::new(MongoDocumentStore::connect(uri, &config.db_name).await?)
            }
            #[cfg(not(feature = "mongodb-backend"))]
            StoreKind::Mongo => {
                return Err(ServerError::Config(crate::config::ConfigError::Invalid {
                    name: "ESCALATION_STORE",
                    expected: "json|memory (built without mongodb-backend)",
                    value: "mongodb".to_string(),
                }))
            }
        };
        let ticketing = HttpTicketingClient::new(TicketingConfig::new(&config.backend_url))?;
        info!(
            store = store.backend_name(),
            backend_url = %config.backend_url,
            "escalation server initialized"
        );
        Ok(Self::new(
            store,
            Arc::new(ticketing),
            Arc::new(NationalPrefixPlan::new(&config.phone_country_code)),
            &config.backend_url,
        ))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn repository(&self) -> &IncidentRepository {
        &self.repository
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn resolver(&self) -> &IncidentContextResolver {
        &self.resolver
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        if request.id.is_none() && request.method.starts_with("notifications/") {
            debug!(method = %request.method, "notification received");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        debug!(method = %request.method, %id, "mcp request");

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MCP_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "capabilities": {
                            "tools": {"listChanged": false}
                        },
                        "serverInfo": {
                            "name": "critical-incident-escalation-mcp",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    }),
                )
            }
            "ping" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                warn!(method = other, "unknown mcp method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
            }
        };

        Some(response)
    }

    /// Runs [`Self::handle_request`] on its own task so a panicking handler becomes an
    /// internal-error response instead of taking the transport down.
    pub async fn handle_request_isolated(
        self: Arc<Self>,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);
        match tokio::spawn(async move { self.handle_request(request).await }).await {
            Ok(response) => response,
            Err(err) => {
                let message = match err.try_into_panic() {
                    Ok(payload) => payload
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "internal error".to_string()),
                    Err(err) => err.to_string(),
                };
                error!(%message, "request handler failed");
                Some(JsonRpcResponse::error(id, INTERNAL_ERROR, message))
            }
        }
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match parse_args_optional(Some(params)) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };
        let Some(name) = parsed.name.filter(|n| !n.trim().is_empty()) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "missing tool name");
        };
        info!(tool = %name, "tool called");

        match name.as_str() {
            "get_current_incident_context" => {
                self.exec_current_incident_context(id, parsed.arguments).await
            }
            "get_incident_status" => self.exec_incident_status(id, parsed.arguments).await,
            "search_incidents" => self.exec_search_incidents(id, parsed.arguments).await,
            "get_sop_document" => self.exec_sop_document(id, parsed.arguments).await,
            "execute_resolution_script" => {
                self.exec_resolution_script(id, parsed.arguments).await
            }
            other => {
                warn!(tool = other, "unknown tool");
                tool_text(id, render::UNKNOWN_TOOL)
            }
        }
    }

    async fn exec_current_incident_context(
        &self,
        id: Value,
        arguments: Option<Value>,
    ) -> JsonRpcResponse {
        let args: CurrentContextInput = tool_args(arguments);
        let context = self.resolver.resolve(args.call_id.as_deref()).await;
        info!(
            call_id = %context.call_id,
            number = %context.incident.number,
            source = ?context.source_tag,
            live = context.live,
            "incident context resolved"
        );
        tool_text(id, render::render_context(&context, Utc::now()))
    }

    async fn exec_incident_status(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: IncidentStatusInput = tool_args(arguments);
        let Some(number) = non_blank(args.incident_number) else {
            return tool_text(id, render::STATUS_MISSING_NUMBER);
        };
        let text = match self.repository.lookup_status(&number).await {
            StatusLookup::Found(incident) => render::render_incident_status(&incident),
            StatusLookup::NotFound => render::render_status_not_found(&number),
            StatusLookup::Unavailable => render::STATUS_UNAVAILABLE.to_string(),
        };
        tool_text(id, text)
    }

    async fn exec_search_incidents(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: SearchIncidentsInput = tool_args(arguments);
        let Some(description) = non_blank(args.description) else {
            return tool_text(id, render::SEARCH_MISSING_DESCRIPTION);
        };
        let group = non_blank(args.assignment_group);
        let text = match self
            .ticketing
            .search_similar(&description, group.as_deref())
            .await
        {
            Ok(search) => render::render_similar(&search),
            Err(err) => {
                warn!(error = %err, "similar incident search failed");
                match err {
                    TicketingError::Api { .. } => render::SEARCH_REJECTED.to_string(),
                    _ => render::SEARCH_UNAVAILABLE.to_string(),
                }
            }
        };
        tool_text(id, text)
    }

    async fn exec_sop_document(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: SopDocumentInput = tool_args(arguments);
        let Some(issue_type) = non_blank(args.issue_type) else {
            return tool_text(id, render::SOP_MISSING_ISSUE);
        };
        let text = match self.ticketing.search_similar(&issue_type, None).await {
            Ok(search) => match non_blank(search.generated_sop) {
                Some(sop) => render::render_sop(&issue_type, &sop),
                None => render::render_sop_missing(&issue_type),
            },
            Err(err) => {
                warn!(error = %err, "sop lookup failed");
                match err {
                    TicketingError::Api { .. } => render::SOP_REJECTED.to_string(),
                    _ => render::SOP_UNAVAILABLE.to_string(),
                }
            }
        };
        tool_text(id, text)
    }

    async fn exec_resolution_script(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: ResolutionScriptInput = tool_args(arguments);
        let Some(script_name) = non_blank(args.script_name) else {
            return tool_text(id, render::SCRIPT_MISSING_NAME);
        };
        let ticket_id =
            non_blank(args.ticket_id).unwrap_or_else(|| generate_ticket_reference(Utc::now()));
        let request = ScriptExecutionRequest::emergency(ticket_id.clone(), script_name.clone());
        info!(script = %script_name, ticket = %ticket_id, "executing resolution script");

        let text = match self.ticketing.execute_scripts(&request).await {
            Ok(resp) if resp.success => {
                render::render_script_run(&script_name, &ticket_id, resp.result.as_ref())
            }
            Ok(resp) => render::render_script_failure(resp.error.as_deref()),
            Err(err) => {
                warn!(error = %err, "script execution failed");
                match err {
                    TicketingError::Api { .. } => render::SCRIPT_REJECTED.to_string(),
                    _ => render::SCRIPT_UNAVAILABLE.to_string(),
                }
            }
        };
        tool_text(id, text)
    }
}

pub fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": "get_current_incident_context",
                "description": "Get the current incident context for this emergency call session",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "call_id": {
                            "type": "string",
                            "description": "Call session ID (optional, defaults to 'default')"
                        }
                    },
                    "required": []
                }
            },
            {
                "name": "get_incident_status",
                "description": "Get detailed status and information for a specific critical incident",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "incident_number": {
                            "type": "string",
                            "description": "Incident number (e.g., INC0010001)"
                        }
                    },
                    "required": ["incident_number"]
                }
            },
            {
                "name": "search_incidents",
                "description": "Search for similar critical incidents and resolution procedures",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "description": {
                            "type": "string",
                            "description": "Critical incident description to find similar cases"
                        },
                        "assignment_group": {
                            "type": "string",
                            "description": "Assignment group (optional)"
                        }
                    },
                    "required": ["description"]
                }
            },
            {
                "name": "get_sop_document",
                "description": "Retrieve step-by-step resolution procedures for critical issues",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "issue_type": {
                            "type": "string",
                            "description": "Type of critical issue requiring immediate resolution"
                        }
                    },
                    "required": ["issue_type"]
                }
            },
            {
                "name": "execute_resolution_script",
                "description": "Execute automated resolution script for critical incident resolution",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "script_name": {
                            "type": "string",
                            "description": "Name of the critical resolution script"
                        },
                        "ticket_id": {
                            "type": "string",
                            "description": "Critical incident ticket ID"
                        }
                    },
                    "required": ["script_name"]
                }
            }
        ]
    })
}

fn tool_text(id: Value, text: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({"content": [{"type": "text", "text": text.into()}]}),
    )
}

fn with_id(mut response: JsonRpcResponse, id: Value) -> JsonRpcResponse {
    response.id = id;
    response
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Tool arguments that fail to decode count as absent, so the tool answers with its
/// own guidance text.
fn tool_args<T: for<'de> Deserialize<'de> + Default>(arguments: Option<Value>) -> T {
    parse_args_optional(arguments).unwrap_or_else(|response| {
        warn!(
            error = ?response.error.map(|e| e.message),
            "ignoring undecodable tool arguments"
        );
        T::default()
    })
}

fn parse_args_optional<T: for<'de> Deserialize<'de> + Default>(
    arguments: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    match arguments {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|err| {
            JsonRpcResponse::error(
                Value::Null,
                INVALID_PARAMS,
                format!("invalid params: {err}"),
            )
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ToolsCallParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentContextInput {
    #[serde(default, deserialize_with = "de_text")]
    call_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IncidentStatusInput {
    #[serde(default, deserialize_with = "de_text")]
    incident_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchIncidentsInput {
    #[serde(default, deserialize_with = "de_text")]
    description: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    assignment_group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SopDocumentInput {
    #[serde(default, deserialize_with = "de_text")]
    issue_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolutionScriptInput {
    #[serde(default, deserialize_with = "de_text")]
    script_name: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    ticket_id: Option<String>,
}
