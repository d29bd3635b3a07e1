//! Toolbridge
//!
//! Connects a chat model to tools served by remote Model Context Protocol
//! (MCP) servers, and ships a small reference MCP endpoint to talk to.
//!
//! # Architecture
//!
//! - **MCP Client**: JSON-RPC over HTTP with session tracking and SSE-framed replies
//! - **Registry**: named servers, their sessions and cached tool catalogs
//! - **Tool Bridge**: catalogs as function schemas, model tool calls routed back by name
//! - **Orchestration**: bounded model / tool loop on top of any [`llm::ChatModel`]
//! - **Endpoint**: Axum JSON-RPC responder with a weather tool catalog
//!
//! # Modules
//!
//! - [`mcp`]: MCP transport, registry and bridge
//! - [`llm`]: Chat model contract, OpenAI-compatible client and orchestrator
//! - [`endpoint`]: Reference tool endpoint
//! - [`config`]: Layered configuration and CLI

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod server;
pub mod telemetry;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::llm::{ChatCompletionsModel, ChatOptions, Orchestrator, ProviderRegistry};
use crate::mcp::bridge::ToolBridge;
use crate::mcp::client::McpClient;
use crate::mcp::config::load_mcp_config;
use crate::mcp::registry::ServerRegistry;

/// `mcp.json` picked up from the working directory when no file is configured.
pub const DEFAULT_SERVERS_FILE: &str = "mcp.json";

/// Client-side components wired from one [`AppConfig`].
#[derive(Debug, Clone)]
pub struct Runtime {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ServerRegistry>,
    pub bridge: Arc<ToolBridge>,
    pub providers: ProviderRegistry,
}

impl Runtime {
    /// Build the client, register configured servers and the chat models.
    ///
    /// Servers that cannot be reached are still registered without tools.
    /// Servers with an invalid URL are skipped with a warning.
    pub async fn bootstrap(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let client = Arc::new(McpClient::new(config.mcp_client_settings())?);
        let registry = Arc::new(ServerRegistry::new(client));

        if let Some(server) = config.default_server() {
            if let Err(e) = registry.add(server).await {
                warn!(error = %e, "Skipping default MCP server");
            }
        }

        let servers_file = config.mcp.servers_file.clone().or_else(|| {
            Path::new(DEFAULT_SERVERS_FILE)
                .exists()
                .then(|| DEFAULT_SERVERS_FILE.to_string())
        });
        if let Some(path) = servers_file {
            let seeded = load_mcp_config(&path)?;
            for server in seeded.into_servers() {
                let id = server.id.clone();
                if let Err(e) = registry.add(server).await {
                    warn!(server_id = %id, error = %e, "Skipping MCP server from {path}");
                }
            }
        }

        let mut providers = ProviderRegistry::new();
        for (id, settings) in config.provider_settings() {
            providers.register(id, Arc::new(ChatCompletionsModel::new(settings)?));
        }

        let bridge = Arc::new(ToolBridge::new(Arc::clone(&registry)));
        bridge.refresh();

        info!(
            name: "runtime.ready",
            servers = registry.servers().len(),
            tools = bridge.tool_functions().len(),
            providers = ?providers.ids(),
            "Runtime ready"
        );

        Ok(Self {
            config,
            registry,
            bridge,
            providers,
        })
    }

    /// Orchestrator for `provider` (case-insensitive), or the default provider.
    pub fn orchestrator(&self, provider: Option<&str>) -> anyhow::Result<Orchestrator> {
        let model = self.providers.get(provider)?;
        Ok(Orchestrator::new(model, Arc::clone(&self.bridge))
            .with_max_iterations(self.config.orchestration.max_iterations))
    }

    /// Chat options from the `orchestration` section.
    #[must_use]
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            enable_tools: self.config.orchestration.enable_tools,
            ..ChatOptions::default()
        }
    }
}
