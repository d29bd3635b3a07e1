//! Bridge between the registry's MCP tools and model function calling.
//!
//! Exposes every cached tool as an OpenAI-style function schema and routes
//! the model's tool calls back to the owning server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::llm::ToolCall;
use crate::mcp::client::elapsed_ms;
use crate::mcp::registry::ServerRegistry;
use crate::mcp::types::{ToolCallResult, ToolDefinition, join_text_blocks};

/// Function-calling tool entry: `{"type":"function","function":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

/// Name, description and JSON-Schema parameters of a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
}

impl FunctionSchema {
    /// Map an MCP tool; the input schema becomes `parameters` untouched.
    #[must_use]
    pub fn from_tool(tool: &ToolDefinition) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

/// Name-keyed snapshot of the registry's catalogs.
#[derive(Debug, Default)]
struct ToolIndex {
    generation: u64,
    tools: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolIndex {
    /// Later entries shadow earlier ones with the same name.
    fn build(generation: u64, all: Vec<ToolDefinition>) -> Self {
        let mut winners: HashMap<String, usize> = HashMap::new();
        for (i, tool) in all.iter().enumerate() {
            if let Some(prev) = winners.insert(tool.name.clone(), i) {
                debug!(
                    tool_name = %tool.name,
                    shadowed_server = %all[prev].server_id,
                    server_id = %tool.server_id,
                    "Tool name collision; later server wins"
                );
            }
        }

        let tools: Vec<ToolDefinition> = all
            .into_iter()
            .enumerate()
            .filter(|(i, tool)| winners.get(&tool.name) == Some(i))
            .map(|(_, tool)| tool)
            .collect();
        let by_name = tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (tool.name.clone(), i))
            .collect();

        Self {
            generation,
            tools,
            by_name,
        }
    }

    fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }
}

/// Maps registry tools to function schemas and executes model tool calls.
pub struct ToolBridge {
    registry: Arc<ServerRegistry>,
    cache: RwLock<Option<Arc<ToolIndex>>>,
}

impl std::fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|idx| idx.tools.len());
        f.debug_struct("ToolBridge")
            .field("cached_tools", &cached)
            .finish_non_exhaustive()
    }
}

impl ToolBridge {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(None),
        }
    }

    /// Function schemas for every currently offered tool.
    pub fn tool_functions(&self) -> Vec<FunctionSchema> {
        self.index().tools.iter().map(FunctionSchema::from_tool).collect()
    }

    /// Drop the cache and rebuild it from the registry.
    pub fn refresh(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
        let index = self.index();
        info!(tool_count = index.tools.len(), "Refreshed tool bridge");
    }

    /// Execute one model tool call. Never fails; errors are in the result.
    pub async fn execute(&self, call: &ToolCall) -> ToolCallResult {
        let started = Instant::now();
        let name = call.function.name.as_str();
        let fail = |message: String| {
            ToolCallResult::failed(name, message, elapsed_ms(started)).with_call_id(&call.id)
        };

        let index = self.index();
        let Some(tool) = index.get(name) else {
            return fail(format!("Tool not found: {name}"));
        };
        let Some(server) = self.registry.server(&tool.server_id) else {
            return fail(format!("Server not found for tool: {}", tool.server_id));
        };
        if !server.enabled {
            return fail(format!("Server is disabled: {}", server.name)).with_server(&server.id);
        }

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(message) => return fail(message).with_server(&server.id),
        };

        debug!(tool_name = %name, server_id = %server.id, call_id = %call.id, "Dispatching tool call");
        self.registry
            .client()
            .call_tool(&server, name, arguments)
            .await
            .with_call_id(&call.id)
    }

    /// Execute calls one after another; result `i` belongs to call `i`.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }

    fn index(&self) -> Arc<ToolIndex> {
        let generation = self.registry.generation();
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = cache.as_ref() {
                if index.generation == generation && !index.tools.is_empty() {
                    return Arc::clone(index);
                }
            }
        }

        let index = Arc::new(ToolIndex::build(generation, self.registry.all_tools()));
        debug!(generation, tool_count = index.tools.len(), "Reloaded tool index");
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        index
    }
}

/// Parse the model's argument string. An empty string means no arguments.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err("Tool arguments must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid tool arguments: {e}")),
    }
}

/// Render a tool result as the text fed back to the model.
#[must_use]
pub fn format_tool_result(result: &ToolCallResult) -> String {
    if !result.success {
        let message = result.error.as_deref().unwrap_or("Unknown error");
        return format!("Error: {message}");
    }

    match &result.content {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(value) => {
            let joined = value
                .get("content")
                .and_then(Value::as_array)
                .map(|blocks| join_text_blocks(blocks))
                .unwrap_or_default();
            if joined.is_empty() {
                value.to_string()
            } else {
                joined
            }
        }
    }
}
