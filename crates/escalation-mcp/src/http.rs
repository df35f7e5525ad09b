use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::protocol::{parse_request, JsonRpcResponse, INTERNAL_ERROR, PARSE_ERROR};
use crate::server::McpServer;
use crate::webhook::CallSetupEvent;

pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/", post(rpc_endpoint))
        .route("/mcp", post(rpc_endpoint))
        .route("/call-context", post(call_context_endpoint))
        .route("/health", get(health_endpoint))
        .route("/debug/incident", get(debug_incident_endpoint))
        .with_state(server)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn serve_http(server: Arc<McpServer>, addr: &str) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "escalation mcp server listening");
    axum::serve(listener, router(server)).await
}

fn status_for(response: &JsonRpcResponse) -> StatusCode {
    match response.error_code() {
        Some(PARSE_ERROR) => StatusCode::BAD_REQUEST,
        Some(INTERNAL_ERROR) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

fn rpc_reply(response: JsonRpcResponse) -> Response {
    (status_for(&response), Json(response)).into_response()
}

async fn rpc_endpoint(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(response) => {
            warn!(code = ?response.error_code(), "rejected rpc body");
            return rpc_reply(response);
        }
    };
    match server.handle_request_isolated(request).await {
        Some(response) => rpc_reply(response),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn call_context_endpoint(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let event: CallSetupEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            error!(error = %err, "invalid call setup payload");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": err.to_string()})),
            )
                .into_response();
        }
    };
    let task = tokio::spawn(async move { server.register_call(event).await });
    match task.await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => {
            error!(error = %err, "call setup handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": err.to_string()})),
            )
                .into_response()
        }
    }
}

async fn health_endpoint(State(server): State<Arc<McpServer>>) -> Response {
    Json(server.health_report().await).into_response()
}

async fn debug_incident_endpoint(State(server): State<Arc<McpServer>>) -> Response {
    match server.debug_incident_sample().await {
        Ok(Some(sample)) => Json(sample).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No incidents found in processed_incidents collection"})),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}
