//! Reference MCP tool endpoint.
//!
//! Serves the responder side of the same JSON-RPC contract the client
//! speaks: `initialize`, `tools/list`, `tools/call` and `ping` on
//! `POST /mcp`, plus a health check on `GET /mcp/health`.
//!
//! The HTTP exchange itself always succeeds. Malformed bodies, unknown
//! methods and tool failures are all reported as JSON-RPC errors.

pub mod dispatcher;
pub mod weather;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::warn;

pub use dispatcher::{Dispatched, McpDispatcher, ServerInfo, ToolHandler};

use crate::mcp::types::{JsonRpcRequest, JsonRpcResponse, SESSION_HEADER, error_codes};

/// Routes for the endpoint, sharing one dispatcher.
pub fn router(dispatcher: Arc<McpDispatcher>) -> Router {
    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/mcp/health", get(health))
        .with_state(dispatcher)
}

/// POST /mcp - JSON-RPC entry point.
async fn handle_rpc(
    State(dispatcher): State<Arc<McpDispatcher>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        if !dispatcher.knows_session(session_id) {
            warn!(session_id = %session_id, "Request carries an unknown MCP session");
        }
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparseable JSON-RPC body");
            return Json(JsonRpcResponse::failure(
                Value::Null,
                error_codes::PARSE_ERROR,
                format!("Parse error: {e}"),
            ))
            .into_response();
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::failure(
                id,
                error_codes::INVALID_REQUEST,
                format!("Invalid request: {e}"),
            ))
            .into_response();
        }
    };

    let Dispatched {
        response,
        session_id,
    } = dispatcher.dispatch(request).await;

    let Some(response) = response else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut out = Json(response).into_response();
    if let Some(value) = session_id.and_then(|s| HeaderValue::from_str(&s).ok()) {
        out.headers_mut().insert(SESSION_HEADER, value);
    }
    out
}

/// GET /mcp/health
async fn health(State(dispatcher): State<Arc<McpDispatcher>>) -> Json<Value> {
    Json(json!({ "status": "UP", "service": dispatcher.info().name }))
}
