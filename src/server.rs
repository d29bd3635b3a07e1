use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::endpoint::{self, McpDispatcher, ServerInfo, weather};

/// Dispatcher serving the weather tools against Open-Meteo.
pub fn weather_dispatcher(config: &AppConfig) -> anyhow::Result<McpDispatcher> {
    let source = weather::OpenMeteoClient::new(
        config.weather.geocoding_url.clone(),
        config.weather.forecast_url.clone(),
        Duration::from_secs(config.weather.timeout_secs),
    )?;

    let info = ServerInfo {
        name: config.server.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let dispatcher = weather::weather_tools(Arc::new(source))
        .into_iter()
        .fold(
            McpDispatcher::new(info).with_protocol_version(config.mcp.protocol_version.clone()),
            McpDispatcher::with_handler,
        );
    Ok(dispatcher)
}

/// Endpoint routes wrapped in the HTTP layers (tracing, body limit, timeout).
pub fn build_app(config: &AppConfig, dispatcher: Arc<McpDispatcher>) -> Router {
    let timeout_duration = Duration::from_secs(config.server.request_timeout_secs.max(1));

    endpoint::router(dispatcher)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
}

/// Start the reference endpoint and serve until `shutdown` fires.
pub async fn start_server(
    config: Arc<AppConfig>,
    dispatcher: Arc<McpDispatcher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_app(&config, dispatcher);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        service = %config.server.name,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(name: "server.stopped", address = %addr, "Server stopped");
    Ok(())
}
