//! MCP data model and JSON-RPC wire types.
//!
//! Shared by the client side (transport, registry, bridge) and the
//! responder side (reference endpoint), since both speak the same contract.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Header carrying the negotiated MCP session.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// MCP protocol revision spoken by default.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by the endpoint.
pub mod error_codes {
    /// Body is not valid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// JSON is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Handler failure.
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ─────────────────────────────────────────────────────────────────────────────
// Server configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session negotiated with a server during `initialize`.
///
/// A server starts `Unauthenticated`. A handshake that yields a session id
/// moves it to `Authenticated`; re-handshaking replaces the whole state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    /// No session id known.
    #[default]
    Unauthenticated,
    /// Session id issued by the server.
    Authenticated {
        /// Value of the `Mcp-Session-Id` response header.
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl SessionState {
    /// Current session id, if authenticated.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated { session_id } => Some(session_id),
            Self::Unauthenticated => None,
        }
    }

    fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

/// A configured tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Registry key. Generated on registration when empty.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// JSON-RPC endpoint URL.
    #[serde(default)]
    pub url: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Static headers sent with every request (e.g. `Authorization`).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Disabled servers are kept registered but offer no tools.
    #[serde(default)]
    pub enabled: bool,
    /// Negotiated session.
    #[serde(default, skip_serializing_if = "SessionState::is_unauthenticated")]
    pub session: SessionState,
    /// Registration time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ServerConfig {
    /// New unregistered server with the given name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            url: url.into(),
            description: None,
            headers: HashMap::new(),
            enabled: true,
            session: SessionState::Unauthenticated,
            created_at: None,
        }
    }

    /// Set an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Add a static header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Current session id, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session.session_id()
    }

    /// Transition to `Authenticated` with a freshly issued session id.
    pub fn authenticate(&mut self, session_id: impl Into<String>) {
        self.session = SessionState::Authenticated {
            session_id: session_id.into(),
        };
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Tool as it appears on the wire in `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// `tools/list` result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `tools/call` result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Single text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![serde_json::json!({ "type": "text", "text": text.into() })],
            is_error: false,
        }
    }

    /// Text blocks joined by newlines.
    #[must_use]
    pub fn joined_text(&self) -> String {
        join_text_blocks(&self.content)
    }
}

/// Join the `text` fields of MCP content blocks with newlines.
pub(crate) fn join_text_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A tool discovered on a registered server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Owning server.
    pub server_id: String,
}

impl ToolDefinition {
    /// Stamp a wire tool with the id of the server that listed it.
    pub fn from_wire(tool: McpTool, server_id: impl Into<String>) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
            server_id: server_id.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool invocation
// ─────────────────────────────────────────────────────────────────────────────

/// Direct tool execution request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub server_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Correlation id of the model's tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Server the call was routed to, when resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub success: bool,
    /// Raw MCP `result` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ToolCallResult {
    /// Successful call.
    pub fn succeeded(tool_name: impl Into<String>, content: Value, execution_time_ms: u64) -> Self {
        Self {
            tool_call_id: None,
            server_id: None,
            tool_name: tool_name.into(),
            arguments: Map::new(),
            success: true,
            content: Some(content),
            error: None,
            execution_time_ms,
        }
    }

    /// Failed call.
    pub fn failed(
        tool_name: impl Into<String>,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tool_call_id: None,
            server_id: None,
            tool_name: tool_name.into(),
            arguments: Map::new(),
            success: false,
            content: None,
            error: Some(error.into()),
            execution_time_ms,
        }
    }

    #[must_use]
    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-RPC request or notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Request with a fresh string id.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Notification: no id, no response expected.
    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}
