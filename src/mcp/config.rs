use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::mcp::types::ServerConfig;

/// `mcp.json` seed file: `{"mcpServers": {"<id>": {"url": ..., "headers": {...}}}}`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, McpServerEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpServerEntry {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl McpConfig {
    /// Server configs keyed by entry name, sorted by id, placeholders expanded.
    ///
    /// Entries marked `"enabled": false` are skipped.
    #[must_use]
    pub fn into_servers(self) -> Vec<ServerConfig> {
        let mut servers: Vec<ServerConfig> = self
            .mcp_servers
            .into_iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(id, entry)| {
                let mut server = ServerConfig::new(
                    entry.name.unwrap_or_else(|| id.clone()),
                    expand_env_placeholders(&entry.url),
                )
                .with_id(id);
                server.description = entry.description;
                server.headers = expand_env_map(&entry.headers);
                server
            })
            .collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        servers
    }
}

pub fn load_mcp_config(path: impl AsRef<Path>) -> anyhow::Result<McpConfig> {
    let txt = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&txt)?)
}

/// Expand "${VAR}" placeholders from the process environment.
/// Unset variables leave the placeholder unchanged.
pub fn expand_env_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) if !name.is_empty() => out.push_str(&value),
                    _ => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn expand_env_map(map: &HashMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), expand_env_placeholders(v)))
        .collect()
}
