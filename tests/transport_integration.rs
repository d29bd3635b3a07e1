mod common;

use std::sync::Arc;

use common::{FakeMcp, Framing, UNREACHABLE_URL, spawn_fake_mcp, tool_json};
use serde_json::{Map, Value, json};
use toolbridge::mcp::client::{McpClient, McpClientSettings};
use toolbridge::mcp::types::ServerConfig;

fn client() -> McpClient {
    McpClient::new(McpClientSettings::default()).unwrap()
}

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_session_is_negotiated_once_and_reused() {
    let fake = FakeMcp::new(Framing::Json, vec![tool_json("echo"), tool_json("shout")]);
    let url = spawn_fake_mcp(Arc::clone(&fake)).await;
    let client = client();

    let mut server = ServerConfig::new("fake", url).with_id("fake");
    assert!(server.session_id().is_none());
    assert!(client.handshake(&mut server).await);
    assert_eq!(server.session_id(), Some(fake.session_id.as_str()));

    let tools = client.list_tools(&server).await;
    assert_eq!(tools.len(), 2);
    assert!(tools.iter().all(|t| t.server_id == "fake"));

    let result = client.call_tool(&server, "echo", args(json!({ "text": "hi" }))).await;
    assert!(result.success);
    assert_eq!(result.server_id.as_deref(), Some("fake"));
    assert_eq!(result.content.unwrap()["content"][0]["text"], "echo: hi");

    let recorded = fake.requests();
    assert_eq!(recorded[0].method, "initialize");
    assert!(recorded[0].session_id.is_none());
    assert_eq!(recorded[1].method, "notifications/initialized");
    for request in &recorded[1..] {
        assert_eq!(request.session_id.as_deref(), Some(fake.session_id.as_str()));
    }
    assert_eq!(
        recorded.iter().filter(|r| r.method == "initialize").count(),
        1
    );
}

#[tokio::test]
async fn test_event_stream_replies_decode_like_raw_json() {
    let tools = vec![tool_json("echo"), tool_json("shout")];
    let raw = FakeMcp::new(Framing::Json, tools.clone());
    let sse = FakeMcp::new(Framing::EventStream, tools);
    let client = client();

    let mut raw_server = ServerConfig::new("raw", spawn_fake_mcp(Arc::clone(&raw)).await).with_id("s");
    let mut sse_server = ServerConfig::new("sse", spawn_fake_mcp(Arc::clone(&sse)).await).with_id("s");
    assert!(client.handshake(&mut raw_server).await);
    assert!(client.handshake(&mut sse_server).await);
    assert_eq!(sse_server.session_id(), Some(sse.session_id.as_str()));

    assert_eq!(
        client.list_tools(&raw_server).await,
        client.list_tools(&sse_server).await
    );

    let a = client.call_tool(&raw_server, "shout", args(json!({ "text": "é ü ß" }))).await;
    let b = client.call_tool(&sse_server, "shout", args(json!({ "text": "é ü ß" }))).await;
    assert!(a.success && b.success);
    assert_eq!(a.content, b.content);
}

#[tokio::test]
async fn test_static_headers_are_forwarded() {
    let fake = FakeMcp::new(Framing::Json, vec![tool_json("echo")]);
    let url = spawn_fake_mcp(Arc::clone(&fake)).await;
    let client = client();

    let mut server = ServerConfig::new("fake", url)
        .with_id("fake")
        .with_header("Authorization", "Bearer s3cret")
        .with_header("bad\nname", "ignored");
    assert!(client.handshake(&mut server).await);
    client.list_tools(&server).await;

    assert!(
        fake.requests()
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer s3cret"))
    );
}

#[tokio::test]
async fn test_tool_level_error_is_a_failed_result() {
    let fake = FakeMcp::new(Framing::Json, vec![tool_json("echo")]);
    let url = spawn_fake_mcp(fake).await;
    let client = client();
    let mut server = ServerConfig::new("fake", url).with_id("fake");
    assert!(client.handshake(&mut server).await);

    let result = client.call_tool(&server, "echo", args(json!({ "text": "fail" }))).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("echo: fail"));
    assert_eq!(result.arguments["text"], "fail");
}

#[tokio::test]
async fn test_unknown_method_is_reported_not_raised() {
    let fake = FakeMcp::new(Framing::EventStream, vec![]);
    let url = spawn_fake_mcp(fake).await;
    let client = client();
    let mut server = ServerConfig::new("fake", url).with_id("fake");
    assert!(client.handshake(&mut server).await);

    // The fake server does not implement ping
    assert!(!client.ping(&server).await);
    assert!(client.list_tools(&server).await.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_degrades_softly() {
    let client = client();
    let mut server = ServerConfig::new("down", UNREACHABLE_URL).with_id("down");

    assert!(!client.handshake(&mut server).await);
    assert!(server.session_id().is_none());
    assert!(client.list_tools(&server).await.is_empty());
    assert!(!client.ping(&server).await);

    let result = client.call_tool(&server, "echo", Map::new()).await;
    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(result.server_id.as_deref(), Some("down"));
}
