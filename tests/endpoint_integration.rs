mod common;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum_test::TestServer;
use common::weather_dispatcher;
use serde_json::{Value, json};
use tower::ServiceExt;
use toolbridge::config::AppConfig;
use toolbridge::endpoint;
use toolbridge::server::build_app;

fn server() -> TestServer {
    TestServer::new(endpoint::router(weather_dispatcher())).unwrap()
}

fn rpc(id: &str, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

#[tokio::test]
async fn test_initialize_issues_a_session() {
    let server = server();
    let response = server
        .post("/mcp")
        .json(&rpc(
            "1",
            "initialize",
            json!({ "protocolVersion": "2024-11-05", "clientInfo": { "name": "t", "version": "0" } }),
        ))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let session = response
        .headers()
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap();
    assert!(!session.is_empty());

    let body: Value = response.json();
    assert_eq!(body["id"], "1");
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], false);
    assert_eq!(body["result"]["serverInfo"]["name"], "weather-mcp-server");

    // follow-up requests carrying the session are served
    let listed = server
        .post("/mcp")
        .add_header(
            HeaderName::from_static("mcp-session-id"),
            HeaderValue::from_str(&session).unwrap(),
        )
        .json(&rpc("2", "tools/list", json!({})))
        .await;
    let body: Value = listed.json();
    let names: Vec<_> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["search_location", "get_current_weather", "get_weather_forecast"]);
    assert!(body["result"]["tools"][0]["inputSchema"]["properties"]["name"].is_object());
}

#[tokio::test]
async fn test_tools_call_wraps_text_content() {
    let response = server()
        .post("/mcp")
        .json(&rpc(
            "call-1",
            "tools/call",
            json!({ "name": "get_weather_forecast", "arguments": { "latitude": 52.52, "longitude": 13.41, "days": 2 } }),
        ))
        .await;

    let body: Value = response.json();
    assert_eq!(body["id"], "call-1");
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("2-Day Weather Forecast"));
    assert!(text.contains("Conditions: Overcast"));
}

#[tokio::test]
async fn test_protocol_errors_are_json_rpc_errors() {
    let server = server();

    let unknown: Value = server
        .post("/mcp")
        .json(&rpc("1", "resources/list", json!({})))
        .await
        .json();
    assert_eq!(unknown["error"]["code"], -32601);
    assert_eq!(unknown["error"]["message"], "Method not found: resources/list");

    let missing_tool: Value = server
        .post("/mcp")
        .json(&rpc("2", "tools/call", json!({ "name": "teleport" })))
        .await
        .json();
    assert_eq!(missing_tool["error"]["code"], -32603);
    assert_eq!(missing_tool["error"]["message"], "Internal error: Unknown tool: teleport");

    let no_params: Value = server
        .post("/mcp")
        .json(&json!({ "jsonrpc": "2.0", "id": "3", "method": "tools/call" }))
        .await
        .json();
    assert_eq!(no_params["error"]["code"], -32603);

    let handler_error: Value = server
        .post("/mcp")
        .json(&rpc("4", "tools/call", json!({ "name": "get_current_weather", "arguments": {} })))
        .await
        .json();
    assert_eq!(handler_error["error"]["message"], "Internal error: latitude is required");
}

#[tokio::test]
async fn test_malformed_bodies_still_get_http_200() {
    let server = server();

    let garbage = server.post("/mcp").text("{ not json").await;
    assert_eq!(garbage.status_code(), StatusCode::OK);
    let body: Value = garbage.json();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);

    let not_a_request: Value = server
        .post("/mcp")
        .json(&json!({ "jsonrpc": "2.0", "id": 7 }))
        .await
        .json();
    assert_eq!(not_a_request["error"]["code"], -32600);
    assert_eq!(not_a_request["id"], 7);
}

#[tokio::test]
async fn test_notifications_and_ping() {
    let server = server();

    let note = server
        .post("/mcp")
        .json(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await;
    assert_eq!(note.status_code(), StatusCode::ACCEPTED);
    assert!(note.text().is_empty());

    let pong: Value = server.post("/mcp").json(&rpc("p", "ping", json!({}))).await.json();
    assert_eq!(pong["result"], json!({ "status": "ok" }));

    let stranger: Value = server
        .post("/mcp")
        .add_header(
            HeaderName::from_static("mcp-session-id"),
            HeaderValue::from_static("never-issued"),
        )
        .json(&rpc("q", "ping", json!({})))
        .await
        .json();
    assert_eq!(stranger["result"]["status"], "ok");
}

#[tokio::test]
async fn test_health() {
    let response = server().get("/mcp/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "UP", "service": "weather-mcp-server" })
    );
}

#[tokio::test]
async fn test_body_limit_applies_to_the_served_app() {
    let mut config = AppConfig::load_from_args(["toolbridge"]).unwrap();
    config.server.body_limit_bytes = 64;
    let app = build_app(&config, weather_dispatcher());

    let oversized = json!({ "jsonrpc": "2.0", "id": "1", "method": "ping", "params": { "pad": "x".repeat(256) } });
    let response = app
        .oneshot(
            Request::post("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(oversized.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
