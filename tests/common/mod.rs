//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use toolbridge::endpoint::weather::{
    CurrentWeather, DailyWeather, Location, WeatherReport, WeatherSource, weather_tools,
};
use toolbridge::endpoint::{self, McpDispatcher, ServerInfo};
use toolbridge::error::LlmError;
use toolbridge::llm::{ChatModel, ChatRequest, FinishReason, Message, ModelTurn, ToolCall, Usage};
use toolbridge::mcp::bridge::ToolBridge;
use toolbridge::mcp::client::{McpClient, McpClientSettings};
use toolbridge::mcp::registry::ServerRegistry;
use toolbridge::mcp::types::SESSION_HEADER;

/// Serve `app` on an ephemeral port and return `http://127.0.0.1:<port>`.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Address nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1/mcp";

pub fn registry() -> Arc<ServerRegistry> {
    let settings = McpClientSettings {
        request_timeout: std::time::Duration::from_secs(5),
        connect_timeout: std::time::Duration::from_secs(1),
        ..McpClientSettings::default()
    };
    Arc::new(ServerRegistry::new(Arc::new(McpClient::new(settings).unwrap())))
}

pub fn bridge(registry: &Arc<ServerRegistry>) -> Arc<ToolBridge> {
    Arc::new(ToolBridge::new(Arc::clone(registry)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Weather endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic weather data.
#[derive(Debug, Default)]
pub struct StubWeather;

#[async_trait]
impl WeatherSource for StubWeather {
    async fn search_locations(&self, name: &str, _count: u32) -> anyhow::Result<Vec<Location>> {
        if name == "Atlantis" {
            return Ok(Vec::new());
        }
        Ok(vec![Location {
            name: name.to_string(),
            latitude: Some(52.52),
            longitude: Some(13.41),
            country: Some("Germany".into()),
            country_code: Some("DE".into()),
            timezone: Some("Europe/Berlin".into()),
            ..Location::default()
        }])
    }

    async fn current_weather(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherReport> {
        Ok(WeatherReport {
            latitude: Some(latitude),
            longitude: Some(longitude),
            timezone: Some("Europe/Berlin".into()),
            current: Some(CurrentWeather {
                time: Some("2024-05-01T12:00".into()),
                temperature_2m: Some(21.0),
                weather_code: Some(0),
                ..CurrentWeather::default()
            }),
            daily: None,
        })
    }

    async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> anyhow::Result<WeatherReport> {
        let n = days as usize;
        Ok(WeatherReport {
            latitude: Some(latitude),
            longitude: Some(longitude),
            daily: Some(DailyWeather {
                time: (1..=n).map(|d| format!("2024-05-{d:02}")).collect(),
                temperature_2m_max: vec![Some(20.0); n],
                temperature_2m_min: vec![Some(10.0); n],
                weather_code: vec![Some(3); n],
                ..DailyWeather::default()
            }),
            ..WeatherReport::default()
        })
    }
}

pub fn weather_dispatcher() -> Arc<McpDispatcher> {
    let info = ServerInfo {
        name: "weather-mcp-server".into(),
        version: "test".into(),
    };
    let dispatcher = weather_tools(Arc::new(StubWeather))
        .into_iter()
        .fold(McpDispatcher::new(info), McpDispatcher::with_handler);
    Arc::new(dispatcher)
}

/// Spawn the weather endpoint and return its `/mcp` URL.
pub async fn spawn_weather_endpoint() -> String {
    let base = spawn(endpoint::router(weather_dispatcher())).await;
    format!("{base}/mcp")
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted MCP server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Json,
    /// Response split across two `data:` lines.
    EventStream,
}

/// One request as the fake server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub session_id: Option<String>,
    pub authorization: Option<String>,
    pub params: Value,
}

/// Minimal MCP server that records requests and echoes tool calls.
#[derive(Debug)]
pub struct FakeMcp {
    pub framing: Framing,
    pub session_id: String,
    tools: Mutex<Vec<Value>>,
    requests: Mutex<Vec<Recorded>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeMcp {
    pub fn new(framing: Framing, tools: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            framing,
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            tools: Mutex::new(tools),
            requests: Mutex::default(),
            list_gate: Mutex::default(),
        })
    }

    pub fn set_tools(&self, tools: Vec<Value>) {
        *self.tools.lock().unwrap() = tools;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    /// Hold the next `tools/list` reply until the returned handle is notified.
    pub fn hold_next_tools_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

pub fn tool_json(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }
    })
}

fn fake_router(fake: Arc<FakeMcp>) -> Router {
    Router::new().route("/mcp", post(fake_rpc)).with_state(fake)
}

/// Spawn `fake` and return its `/mcp` URL.
pub async fn spawn_fake_mcp(fake: Arc<FakeMcp>) -> String {
    format!("{}/mcp", spawn(fake_router(fake)).await)
}

/// Spawn `fake` until `stop` is cancelled; the handle finishes once the
/// listener and every connection are closed.
pub async fn spawn_stoppable_fake_mcp(fake: Arc<FakeMcp>) -> (String, CancellationToken, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = CancellationToken::new();
    let signal = stop.clone();
    let served = tokio::spawn(async move {
        axum::serve(listener, fake_router(fake))
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .unwrap();
    });
    (format!("http://{addr}/mcp"), stop, served)
}

async fn fake_rpc(
    State(fake): State<Arc<FakeMcp>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let method = request["method"].as_str().unwrap_or_default().to_string();
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        session_id: header(SESSION_HEADER),
        authorization: header("authorization"),
        params: request.get("params").cloned().unwrap_or(Value::Null),
    });

    let Some(id) = request.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    let body = match method.as_str() {
        "initialize" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "fake", "version": "0.0.0" }
            }
        }),
        "tools/list" => {
            let gate = fake.list_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let tools = fake.tools.lock().unwrap().clone();
            json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": tools } })
        }
        "tools/call" => {
            let name = request["params"]["name"].as_str().unwrap_or_default();
            let text = request["params"]["arguments"]["text"].as_str().unwrap_or_default();
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{ "type": "text", "text": format!("{name}: {text}") }],
                    "isError": text == "fail"
                }
            })
        }
        other => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("Method not found: {other}") }
        }),
    };

    let mut response = match fake.framing {
        Framing::Json => Json(body).into_response(),
        Framing::EventStream => {
            let text = body.to_string();
            let mut mid = text.len() / 2;
            while !text.is_char_boundary(mid) {
                mid += 1;
            }
            let (head, tail) = text.split_at(mid);
            (
                [(CONTENT_TYPE, "text/event-stream")],
                format!("event: message\ndata: {head}\ndata: {tail}\n\n"),
            )
                .into_response()
        }
    };
    if method == "initialize" {
        response
            .headers_mut()
            .insert(SESSION_HEADER, fake.session_id.parse().unwrap());
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted model
// ─────────────────────────────────────────────────────────────────────────────

/// Replays canned turns, then repeats `fallback` (or fails) once they run out.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ModelTurn>>,
    fallback: Option<ModelTurn>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            ..Self::default()
        })
    }

    pub fn repeating(turn: ModelTurn) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(turn),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ModelTurn, LlmError> {
        self.seen.lock().unwrap().push(request);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or(LlmError::EmptyChoices)
    }
}

pub fn text_turn(text: &str) -> ModelTurn {
    ModelTurn {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

pub fn tool_turn(calls: Vec<ToolCall>) -> ModelTurn {
    ModelTurn {
        message: Message::assistant_tool_calls(None, calls),
        finish_reason: FinishReason::ToolCalls,
        usage: Some(Usage {
            prompt_tokens: 8,
            completion_tokens: 2,
            total_tokens: 10,
        }),
    }
}
