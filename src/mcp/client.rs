//! MCP transport client over HTTP.
//!
//! Every call is a JSON-RPC POST. Responses may come back as raw JSON or as
//! an SSE-framed body; both are decoded to the same [`JsonRpcResponse`].
//! Public operations never return transport errors: failures become `false`,
//! an empty catalog, or a failed [`ToolCallResult`].

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::mcp::sse;
use crate::mcp::types::{
    DEFAULT_PROTOCOL_VERSION, JsonRpcRequest, JsonRpcResponse, ListToolsResult, SESSION_HEADER,
    ServerConfig, ToolCallResult, ToolDefinition, join_text_blocks,
};

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Upper bound on `tools/list` pages followed for one server.
const MAX_LIST_PAGES: usize = 32;

/// Transport settings.
#[derive(Debug, Clone)]
pub struct McpClientSettings {
    /// Protocol revision sent in `initialize`.
    pub protocol_version: String,
    /// `clientInfo.name`.
    pub client_name: String,
    /// `clientInfo.version`.
    pub client_version: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for McpClientSettings {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Decoded reply plus the session header, if the server sent one.
struct RpcReply {
    response: JsonRpcResponse,
    session_id: Option<String>,
}

/// HTTP client speaking the MCP wire protocol.
#[derive(Clone)]
pub struct McpClient {
    http: reqwest::Client,
    settings: McpClientSettings,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Build a client with bounded timeouts.
    pub fn new(settings: McpClientSettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &McpClientSettings {
        &self.settings
    }

    /// Perform the `initialize` handshake.
    ///
    /// On success the session id from the response header is written into
    /// `server` as an `Authenticated` transition. A missing header is only a
    /// warning; the handshake still succeeds.
    pub async fn handshake(&self, server: &mut ServerConfig) -> bool {
        info!(
            server_id = %server.id,
            server_name = %server.name,
            "Initializing connection to MCP server"
        );

        let params = json!({
            "protocolVersion": self.settings.protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": self.settings.client_name,
                "version": self.settings.client_version
            }
        });
        let request = JsonRpcRequest::new("initialize", params);

        let reply = match self.exchange(server, &request, None).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    server_id = %server.id,
                    server_name = %server.name,
                    error = %e,
                    "Failed to initialize connection to MCP server"
                );
                return false;
            }
        };

        if let Some(err) = &reply.response.error {
            error!(
                server_id = %server.id,
                code = err.code,
                message = %err.message,
                "MCP server initialization failed"
            );
            return false;
        }

        match reply.session_id {
            Some(session_id) => {
                info!(server_id = %server.id, session_id = %session_id, "Received MCP session ID");
                server.authenticate(session_id);
            }
            None => {
                warn!(server_id = %server.id, "No Mcp-Session-Id header in initialization response");
            }
        }

        self.notify_initialized(server).await;

        info!(
            server_id = %server.id,
            server_name = %server.name,
            "Successfully initialized connection to MCP server"
        );
        true
    }

    /// Fetch the server's tool catalog, following pagination.
    ///
    /// Any failure yields an empty list.
    pub async fn list_tools(&self, server: &ServerConfig) -> Vec<ToolDefinition> {
        match self.try_list_tools(server).await {
            Ok(tools) => {
                info!(
                    server_id = %server.id,
                    tool_count = tools.len(),
                    "Listed tools from MCP server"
                );
                tools
            }
            Err(e) => {
                error!(
                    server_id = %server.id,
                    server_name = %server.name,
                    error = %e,
                    "Failed to list tools from MCP server"
                );
                Vec::new()
            }
        }
    }

    async fn try_list_tools(&self, server: &ServerConfig) -> Result<Vec<ToolDefinition>, TransportError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.call(server, "tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            out.extend(
                page.tools
                    .into_iter()
                    .map(|t| ToolDefinition::from_wire(t, &server.id)),
            );

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(out),
            }
        }

        warn!(
            server_id = %server.id,
            max_pages = MAX_LIST_PAGES,
            "tools/list pagination limit reached"
        );
        Ok(out)
    }

    /// Invoke a tool. Never fails; errors are reported in the result.
    pub async fn call_tool(
        &self,
        server: &ServerConfig,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolCallResult {
        info!(server_id = %server.id, tool_name = %name, "Executing tool on MCP server");
        let started = Instant::now();

        let params = json!({ "name": name, "arguments": Value::Object(arguments.clone()) });
        let outcome = self.call(server, "tools/call", params).await;
        let execution_time_ms = elapsed_ms(started);

        let result = match outcome {
            Ok(content) => match tool_level_error(&content) {
                Some(message) => {
                    warn!(tool_name = %name, error = %message, "Tool reported an error");
                    ToolCallResult::failed(name, message, execution_time_ms)
                }
                None => {
                    info!(tool_name = %name, execution_time_ms, "Tool executed successfully");
                    ToolCallResult::succeeded(name, content, execution_time_ms)
                }
            },
            Err(e) => {
                if let TransportError::Rpc { code, message } = &e {
                    error!(tool_name = %name, code, message = %message, "Tool execution failed");
                } else {
                    error!(
                        server_id = %server.id,
                        tool_name = %name,
                        error = %e,
                        "Failed to execute tool on MCP server"
                    );
                }
                ToolCallResult::failed(name, e.to_string(), execution_time_ms)
            }
        };

        result.with_server(&server.id).with_arguments(arguments)
    }

    /// Liveness check via `ping`.
    pub async fn ping(&self, server: &ServerConfig) -> bool {
        match self.call(server, "ping", json!({})).await {
            Ok(_) => true,
            Err(e) => {
                warn!(server_id = %server.id, error = %e, "MCP ping failed");
                false
            }
        }
    }

    /// Send a request carrying the server's session and unwrap its result.
    async fn call(
        &self,
        server: &ServerConfig,
        method: &str,
        params: Value,
    ) -> Result<Value, TransportError> {
        let request = JsonRpcRequest::new(method, params);
        let reply = self.exchange(server, &request, server.session_id()).await?;

        if let Some(err) = reply.response.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        reply.response.result.ok_or_else(|| TransportError::MissingResult {
            method: method.to_string(),
        })
    }

    async fn notify_initialized(&self, server: &ServerConfig) {
        let note = JsonRpcRequest::notification("notifications/initialized");
        if let Err(e) = self.post(server, &note, server.session_id()).await {
            debug!(server_id = %server.id, error = %e, "initialized notification not accepted");
        }
    }

    async fn exchange(
        &self,
        server: &ServerConfig,
        request: &JsonRpcRequest,
        session_id: Option<&str>,
    ) -> Result<RpcReply, TransportError> {
        let resp = self.post(server, request, session_id).await?;

        let headers = resp.headers();
        let session_id = headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        debug!(
            server_id = %server.id,
            method = %request.method,
            content_type = ?content_type,
            "Received MCP response"
        );

        let body = resp.text().await?;
        let json_text = sse::decode_body(content_type.as_deref(), body);
        let response: JsonRpcResponse = serde_json::from_str(&json_text)?;

        Ok(RpcReply {
            response,
            session_id,
        })
    }

    async fn post(
        &self,
        server: &ServerConfig,
        request: &JsonRpcRequest,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut rb = self
            .http
            .post(&server.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE);

        for (name, value) in &server.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => rb = rb.header(name, value),
                _ => warn!(server_id = %server.id, header = %name, "Skipping invalid static header"),
            }
        }

        if let Some(session_id) = session_id {
            rb = rb.header(SESSION_HEADER, session_id);
        }

        debug!(
            server_id = %server.id,
            url = %server.url,
            method = %request.method,
            has_session = session_id.is_some(),
            "Sending JSON-RPC request"
        );

        let resp = rb.json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

/// MCP `isError: true` results carry the failure text in their content.
fn tool_level_error(result: &Value) -> Option<String> {
    if result.get("isError").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| join_text_blocks(blocks))
        .filter(|t| !t.is_empty());
    Some(text.unwrap_or_else(|| "Tool reported an error".to_string()))
}

/// Milliseconds since `started`, saturating.
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
