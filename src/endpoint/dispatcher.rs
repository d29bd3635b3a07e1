//! JSON-RPC dispatch for the reference tool endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::mcp::types::{
    CallToolResult, DEFAULT_PROTOCOL_VERSION, JsonRpcRequest, JsonRpcResponse, McpTool,
    error_codes,
};

/// A tool served by the endpoint.
#[async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Catalog entry returned by `tools/list`.
    fn definition(&self) -> McpTool;

    /// Run the tool and return its text output.
    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<String>;
}

/// Identity reported in `initialize` and on the health route.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Outcome of dispatching one request.
#[derive(Debug)]
pub struct Dispatched {
    /// `None` for notifications.
    pub response: Option<JsonRpcResponse>,
    /// Session issued by `initialize`.
    pub session_id: Option<String>,
}

/// Routes JSON-RPC methods to the tool catalog.
pub struct McpDispatcher {
    info: ServerInfo,
    protocol_version: String,
    handlers: Vec<Arc<dyn ToolHandler>>,
    by_name: HashMap<String, usize>,
    sessions: RwLock<HashSet<String>>,
}

impl std::fmt::Debug for McpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpDispatcher")
            .field("info", &self.info)
            .field("protocol_version", &self.protocol_version)
            .field("tool_count", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl McpDispatcher {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            handlers: Vec::new(),
            by_name: HashMap::new(),
            sessions: RwLock::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Add a tool. A handler with the same name replaces the earlier one in place.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        let name = handler.definition().name;
        match self.by_name.get(&name) {
            Some(&i) => self.handlers[i] = handler,
            None => {
                self.by_name.insert(name, self.handlers.len());
                self.handlers.push(handler);
            }
        }
        self
    }

    #[must_use]
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Whether `initialize` issued this session id.
    #[must_use]
    pub fn knows_session(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(session_id)
    }

    /// Handle one request. Never fails; errors become JSON-RPC error responses.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Dispatched {
        if request.is_notification() {
            debug!(method = %request.method, "Received notification");
            return Dispatched {
                response: None,
                session_id: None,
            };
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        info!(method = %request.method, "Received MCP request");

        let mut session_id = None;
        let outcome = match request.method.as_str() {
            "initialize" => {
                let (result, issued) = self.initialize();
                session_id = Some(issued);
                Ok(result)
            }
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params).await,
            "ping" => Ok(json!({ "status": "ok" })),
            other => Err((
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => {
                warn!(method = %request.method, code, message = %message, "MCP request failed");
                JsonRpcResponse::failure(id, code, message)
            }
        };

        Dispatched {
            response: Some(response),
            session_id,
        }
    }

    fn initialize(&self) -> (Value, String) {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone());
        info!(session_id = %session_id, "Issued MCP session");

        let result = json!({
            "protocolVersion": self.protocol_version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.info.name, "version": self.info.version }
        });
        (result, session_id)
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<McpTool> = self.handlers.iter().map(|h| h.definition()).collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i64, String)> {
        let internal = |msg: String| (error_codes::INTERNAL_ERROR, format!("Internal error: {msg}"));

        let Some(Value::Object(mut params)) = params else {
            return Err(internal("Missing params".to_string()));
        };
        let Some(name) = params.get("name").and_then(Value::as_str).map(ToString::to_string) else {
            return Err(internal("Missing tool name".to_string()));
        };
        let arguments = match params.remove("arguments") {
            Some(Value::Object(arguments)) => arguments,
            None | Some(Value::Null) => Map::new(),
            Some(_) => return Err(internal("Tool arguments must be an object".to_string())),
        };

        let Some(handler) = self.by_name.get(&name).map(|&i| Arc::clone(&self.handlers[i])) else {
            return Err(internal(format!("Unknown tool: {name}")));
        };

        info!(tool_name = %name, "Executing tool");
        let text = handler.call(arguments).await.map_err(|e| internal(format!("{e:#}")))?;

        serde_json::to_value(CallToolResult::text(text)).map_err(|e| internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn definition(&self) -> McpTool {
            McpTool {
                name: "echo".into(),
                description: Some("Echo the text argument".into()),
                input_schema: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            }
        }

        async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<String> {
            arguments
                .get("text")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| anyhow::anyhow!("text is required"))
        }
    }

    fn dispatcher() -> McpDispatcher {
        McpDispatcher::new(ServerInfo {
            name: "test-server".into(),
            version: "0.0.1".into(),
        })
        .with_handler(Arc::new(Echo))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        let mut req = JsonRpcRequest::new(method, params);
        req.id = Some(json!("r1"));
        req
    }

    #[tokio::test]
    async fn test_initialize_issues_session() {
        let d = dispatcher();
        let out = d.dispatch(request("initialize", json!({}))).await;
        let session = out.session_id.unwrap();
        assert!(d.knows_session(&session));

        let result = out.response.unwrap().result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(result["serverInfo"]["name"], "test-server");
    }

    #[tokio::test]
    async fn test_call_and_errors() {
        let d = dispatcher();

        let ok = d
            .dispatch(request("tools/call", json!({ "name": "echo", "arguments": { "text": "hi" } })))
            .await
            .response
            .unwrap();
        assert_eq!(ok.id, json!("r1"));
        let result = ok.result.unwrap();
        assert_eq!(result["content"][0]["text"], "hi");
        assert_eq!(result["isError"], false);

        let failed = d
            .dispatch(request("tools/call", json!({ "name": "echo" })))
            .await
            .response
            .unwrap();
        let err = failed.error.unwrap();
        assert_eq!(err.code, -32603);
        assert_eq!(err.message, "Internal error: text is required");

        let unknown = d
            .dispatch(request("tools/call", json!({ "name": "nope" })))
            .await
            .response
            .unwrap();
        assert_eq!(unknown.error.unwrap().message, "Internal error: Unknown tool: nope");

        let missing = d.dispatch(request("tools/call", json!({}))).await.response.unwrap();
        assert_eq!(missing.error.unwrap().code, -32603);
    }

    #[tokio::test]
    async fn test_unknown_method_and_notification() {
        let d = dispatcher();
        let out = d.dispatch(request("resources/list", json!({}))).await;
        let err = out.response.unwrap().error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found: resources/list");

        let note = d
            .dispatch(JsonRpcRequest::notification("notifications/initialized"))
            .await;
        assert!(note.response.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let out = dispatcher().dispatch(request("ping", json!({}))).await;
        assert_eq!(out.response.unwrap().result.unwrap(), json!({ "status": "ok" }));
    }
}
