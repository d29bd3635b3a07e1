//! Registry of tool-providing MCP servers and their cached catalogs.
//!
//! Servers and catalogs live under one lock so a catalog can never outlive
//! its server. Entries are `Arc` snapshots that are replaced wholesale; no
//! lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::RegistryError;
use crate::mcp::client::{McpClient, elapsed_ms};
use crate::mcp::types::{ServerConfig, ToolCallRequest, ToolCallResult, ToolDefinition};

#[derive(Debug, Default)]
struct RegistryState {
    servers: HashMap<String, Arc<ServerConfig>>,
    catalogs: HashMap<String, Arc<Vec<ToolDefinition>>>,
    // registration sequence per server id; a re-added id gets a new one
    sequence: HashMap<String, u64>,
    next_sequence: u64,
    // bumped on every catalog-affecting write
    generation: u64,
}

impl RegistryState {
    fn ordered_servers(&self) -> Vec<Arc<ServerConfig>> {
        let mut servers: Vec<_> = self.servers.values().cloned().collect();
        servers.sort_by_key(|server| self.sequence.get(&server.id).copied().unwrap_or(u64::MAX));
        servers
    }
}

/// Tracks registered servers, their sessions and tool catalogs.
pub struct ServerRegistry {
    client: Arc<McpClient>,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("ServerRegistry")
            .field("server_count", &state.servers.len())
            .field("catalog_count", &state.catalogs.len())
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

impl ServerRegistry {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self {
            client,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Transport used for every server in this registry.
    #[must_use]
    pub fn client(&self) -> &Arc<McpClient> {
        &self.client
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a server.
    ///
    /// The URL is validated before any network traffic. A failed handshake is
    /// logged and the server is still registered, just without tools.
    pub async fn add(&self, mut server: ServerConfig) -> Result<Arc<ServerConfig>, RegistryError> {
        let url = server.url.trim().to_string();
        if url.is_empty() {
            return Err(RegistryError::MissingUrl);
        }
        if let Err(source) = Url::parse(&url) {
            return Err(RegistryError::InvalidUrl { url, source });
        }
        server.url = url;

        if server.id.trim().is_empty() {
            server.id = uuid::Uuid::new_v4().to_string();
        }
        if server.created_at.is_none() {
            server.created_at = Some(Utc::now());
        }
        server.enabled = true;

        let connected = self.client.handshake(&mut server).await;
        if !connected {
            warn!(
                server_id = %server.id,
                server_name = %server.name,
                "Registered MCP server without a successful handshake"
            );
        }

        let id = server.id.clone();
        let server = Arc::new(server);
        {
            let mut state = self.write();
            state.next_sequence += 1;
            let sequence = state.next_sequence;
            state.sequence.insert(id.clone(), sequence);
            state.servers.insert(id.clone(), Arc::clone(&server));
            state.catalogs.remove(&id);
            state.generation += 1;
        }

        info!(
            name: "mcp.server.added",
            server_id = %id,
            server_name = %server.name,
            url = %server.url,
            connected,
            "Added MCP server"
        );

        if connected {
            self.refresh_tools(&id).await;
        }

        Ok(server)
    }

    /// Unregister a server and drop its catalog.
    pub fn remove(&self, id: &str) -> Option<Arc<ServerConfig>> {
        let removed = {
            let mut state = self.write();
            let removed = state.servers.remove(id);
            if removed.is_some() {
                state.catalogs.remove(id);
                state.sequence.remove(id);
                state.generation += 1;
            }
            removed
        };

        match &removed {
            Some(server) => {
                info!(name: "mcp.server.removed", server_id = %id, server_name = %server.name, "Removed MCP server");
            }
            None => warn!(server_id = %id, "Attempted to remove unknown MCP server"),
        }
        removed
    }

    #[must_use]
    pub fn server(&self, id: &str) -> Option<Arc<ServerConfig>> {
        self.read().servers.get(id).cloned()
    }

    /// All servers in registration order.
    #[must_use]
    pub fn servers(&self) -> Vec<Arc<ServerConfig>> {
        self.read().ordered_servers()
    }

    /// Re-fetch a server's catalog and replace the cached copy.
    ///
    /// Unknown or disabled servers yield an empty list. If the server is
    /// removed, replaced or disabled while the fetch is in flight the result
    /// is dropped.
    pub async fn refresh_tools(&self, id: &str) -> Vec<ToolDefinition> {
        let registered = {
            let state = self.read();
            state
                .servers
                .get(id)
                .cloned()
                .zip(state.sequence.get(id).copied())
        };
        let Some((server, sequence)) = registered else {
            warn!(server_id = %id, "Cannot refresh tools for unknown MCP server");
            return Vec::new();
        };
        if !server.enabled {
            debug!(server_id = %id, "Skipping tool refresh for disabled MCP server");
            return Vec::new();
        }

        let tools = self.client.list_tools(&server).await;

        {
            let mut state = self.write();
            let same_registration = state.sequence.get(id) == Some(&sequence);
            let still_enabled = state.servers.get(id).is_some_and(|s| s.enabled);
            if !same_registration || !still_enabled {
                debug!(server_id = %id, "Discarding tool refresh for server changed meanwhile");
                return Vec::new();
            }
            state.catalogs.insert(id.to_string(), Arc::new(tools.clone()));
            state.generation += 1;
        }

        info!(
            name: "mcp.tools.refreshed",
            server_id = %id,
            tool_count = tools.len(),
            "Refreshed MCP tool catalog"
        );
        tools
    }

    /// Cached catalog of one server.
    #[must_use]
    pub fn tools_for_server(&self, id: &str) -> Vec<ToolDefinition> {
        self.read()
            .catalogs
            .get(id)
            .map(|tools| tools.as_ref().clone())
            .unwrap_or_default()
    }

    /// Every cached tool, grouped by server in registration order.
    #[must_use]
    pub fn all_tools(&self) -> Vec<ToolDefinition> {
        let state = self.read();
        state
            .ordered_servers()
            .iter()
            .filter_map(|server| state.catalogs.get(&server.id))
            .flat_map(|tools| tools.iter().cloned())
            .collect()
    }

    /// Enable or disable a server. Returns `false` for an unknown id.
    ///
    /// Disabling drops the cached catalog; enabling fetches it again.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        {
            let mut state = self.write();
            let Some(current) = state.servers.get(id) else {
                warn!(server_id = %id, "Cannot toggle unknown MCP server");
                return false;
            };
            if current.enabled == enabled {
                return true;
            }
            let mut updated = current.as_ref().clone();
            updated.enabled = enabled;
            state.servers.insert(id.to_string(), Arc::new(updated));
            if !enabled {
                state.catalogs.remove(id);
            }
            state.generation += 1;
        }

        info!(server_id = %id, enabled, "Toggled MCP server");
        if enabled {
            self.refresh_tools(id).await;
        }
        true
    }

    /// Re-run the handshake and publish the new session on success.
    pub async fn test_connection(&self, id: &str) -> bool {
        let Some(current) = self.server(id) else {
            warn!(server_id = %id, "Cannot test connection to unknown MCP server");
            return false;
        };

        let mut candidate = current.as_ref().clone();
        let ok = self.client.handshake(&mut candidate).await;
        if ok {
            let mut state = self.write();
            if let Some(latest) = state.servers.get(id) {
                candidate.enabled = latest.enabled;
                state.servers.insert(id.to_string(), Arc::new(candidate));
            }
        }
        ok
    }

    /// Call a tool on an explicitly named server.
    pub async fn execute_tool(&self, request: &ToolCallRequest) -> ToolCallResult {
        let started = Instant::now();
        let reject = |message: String| {
            ToolCallResult::failed(&request.tool_name, message, elapsed_ms(started))
                .with_arguments(request.arguments.clone())
        };

        if request.server_id.trim().is_empty() {
            return reject("Server ID is required".to_string());
        }
        if request.tool_name.trim().is_empty() {
            return reject("Tool name is required".to_string());
        }
        let Some(server) = self.server(&request.server_id) else {
            return reject(format!("Server not found: {}", request.server_id));
        };
        if !server.enabled {
            return reject(format!("Server is disabled: {}", server.name)).with_server(&server.id);
        }

        self.client
            .call_tool(&server, &request.tool_name, request.arguments.clone())
            .await
    }

    /// Counter bumped whenever the set of offered tools may have changed.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }
}
