//! Toolbridge command line.
//!
//! - `serve`: run the reference weather MCP endpoint
//! - `tools`: register configured MCP servers and print their function schemas
//! - `chat`: run one orchestrated chat against the configured model

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use toolbridge::Runtime;
use toolbridge::config::{AppConfig, Cli, Command};
use toolbridge::llm::{ChatOptions, Message};
use toolbridge::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before clap reads env fallbacks
    let _ = dotenv();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_cli(&cli).context("Configuration error")?);

    telemetry::init(&config.logging);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(name: "shutdown.requested", "Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, shutdown).await,
        Command::Tools => list_tools(config).await,
        Command::Chat {
            message,
            system,
            provider,
            no_tools,
        } => chat(config, message, system, provider, no_tools, &shutdown).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn serve(config: Arc<AppConfig>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let dispatcher = Arc::new(server::weather_dispatcher(&config)?);
    server::start_server(config, dispatcher, shutdown).await
}

async fn list_tools(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let runtime = Runtime::bootstrap(config).await?;

    for server in runtime.registry.servers() {
        info!(
            server_id = %server.id,
            server_name = %server.name,
            connected = server.session_id().is_some(),
            tools = runtime.registry.tools_for_server(&server.id).len(),
            "MCP server"
        );
    }

    let functions = runtime.bridge.tool_functions();
    if functions.is_empty() {
        warn!("No tools discovered");
    }
    println!("{}", serde_json::to_string_pretty(&functions)?);
    Ok(())
}

async fn chat(
    config: Arc<AppConfig>,
    message: String,
    system: Option<String>,
    provider: Option<String>,
    no_tools: bool,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let runtime = Runtime::bootstrap(config).await?;
    let orchestrator = runtime.orchestrator(provider.as_deref())?;

    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(message));

    let options = ChatOptions {
        enable_tools: runtime.chat_options().enable_tools && !no_tools,
        ..runtime.chat_options()
    };

    let outcome = orchestrator
        .run_with_cancellation(messages, options, shutdown)
        .await?;

    info!(
        name: "chat.finished",
        model = %orchestrator.model().name(),
        state = ?outcome.state,
        iterations = outcome.iterations,
        tool_calls = outcome.tool_calls.len(),
        execution_time_ms = outcome.execution_time_ms,
        "Chat finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
