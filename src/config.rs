use crate::llm::{LlmSettings, Provider};
use crate::mcp::client::McpClientSettings;
use crate::mcp::types::DEFAULT_PROTOCOL_VERSION;
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` / `CONFIG_FILE` is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (YAML, TOML or JSON)
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Port the reference endpoint listens on
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Maximum tool rounds per chat
    #[arg(long, env = "MAX_ITERATIONS", global = true)]
    pub max_iterations: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the reference weather tool endpoint
    Serve,
    /// Register the configured MCP servers and print their function schemas
    Tools,
    /// Run one orchestrated chat and print the outcome as JSON
    Chat {
        /// User message
        message: String,
        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,
        /// Provider id (defaults to the configured provider)
        #[arg(long)]
        provider: Option<String>,
        /// Do not offer tools to the model
        #[arg(long)]
        no_tools: bool,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mcp: McpClientConfig,
    pub llm: LlmConfig,
    pub orchestration: OrchestrationConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Name reported by `initialize` and `/mcp/health`.
    pub name: String,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct McpClientConfig {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Optional `mcp.json` seed file.
    #[serde(default)]
    pub servers_file: Option<String>,
    #[serde(default)]
    pub default_server: Option<DefaultServerConfig>,
}

/// Single server registered under id `default`.
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultServerConfig {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Sent as `Authorization: Bearer <api_key>`.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider id, or `auto` to detect from `base_url`.
    pub provider: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    /// Further providers selectable per chat, keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, LlmProviderConfig>,
}

/// One entry of `llm.providers`. Unset fields fall back to the `llm` values.
///
/// The API key is only inherited when the entry keeps the base URL.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LlmProviderConfig {
    /// Provider kind; the entry's key when unset.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestrationConfig {
    pub max_iterations: usize,
    pub enable_tools: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `compact` or `json`.
    pub format: String,
    /// Fallback filter when `RUST_LOG` is unset.
    pub filter: String,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layering: defaults, then config file, then `TOOLBRIDGE_*` env, then
    /// `LLM_*` env and CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 8090)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.name", "weather-mcp-server")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("mcp.protocol_version", DEFAULT_PROTOCOL_VERSION)?
            .set_default("mcp.client_name", env!("CARGO_PKG_NAME"))?
            .set_default("mcp.client_version", env!("CARGO_PKG_VERSION"))?
            .set_default("mcp.request_timeout_secs", 30)?
            .set_default("mcp.connect_timeout_secs", 5)?
            .set_default("llm.provider", "auto")?
            .set_default("llm.base_url", "https://api.openai.com")?
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.timeout_secs", 120)?
            .set_default("orchestration.max_iterations", 5)?
            .set_default("orchestration.enable_tools", true)?
            .set_default(
                "weather.geocoding_url",
                crate::endpoint::weather::open_meteo::DEFAULT_GEOCODING_URL,
            )?
            .set_default(
                "weather.forecast_url",
                crate::endpoint::weather::open_meteo::DEFAULT_FORECAST_URL,
            )?
            .set_default("weather.timeout_secs", 10)?
            .set_default("logging.format", "compact")?
            .set_default("logging.filter", "info")?;

        // 2. Config file
        match &cli.config {
            Some(path) => builder = builder.add_source(File::from(PathBuf::from(path)).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false));
            }
            None => {}
        }

        // 3. Environment variables (prefixed with TOOLBRIDGE_), e.g. TOOLBRIDGE_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("TOOLBRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Conventional LLM variables
        for (var, key) in [
            ("LLM_BASE_URL", "llm.base_url"),
            ("LLM_MODEL", "llm.model"),
            ("LLM_API_KEY", "llm.api_key"),
        ] {
            if let Ok(val) = env::var(var) {
                if !val.trim().is_empty() {
                    builder = builder.set_override(key, val)?;
                }
            }
        }

        // 5. CLI flags (and their env fallbacks)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(max) = cli.max_iterations {
            let max = u64::try_from(max).unwrap_or(u64::MAX);
            builder = builder.set_override("orchestration.max_iterations", max)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn mcp_client_settings(&self) -> McpClientSettings {
        McpClientSettings {
            protocol_version: self.mcp.protocol_version.clone(),
            client_name: self.mcp.client_name.clone(),
            client_version: self.mcp.client_version.clone(),
            request_timeout: Duration::from_secs(self.mcp.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.mcp.connect_timeout_secs),
        }
    }

    #[must_use]
    pub fn llm_settings(&self) -> LlmSettings {
        let llm = &self.llm;
        LlmSettings {
            base_url: llm.base_url.clone(),
            api_key: llm.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: llm.model.clone(),
            provider: Provider::from_name(&llm.provider, &llm.base_url),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            timeout: Duration::from_secs(llm.timeout_secs),
        }
    }

    /// Settings for every configured provider keyed by lowercase id.
    ///
    /// The base `llm` section comes first and is the default; a
    /// `llm.providers` entry with the same id replaces it.
    #[must_use]
    pub fn provider_settings(&self) -> Vec<(String, LlmSettings)> {
        let base = self.llm_settings();
        let mut all = vec![(base.provider.id().to_string(), base)];

        for (id, entry) in &self.llm.providers {
            let id = id.trim().to_lowercase();
            let base_url = entry.base_url.clone().unwrap_or_else(|| self.llm.base_url.clone());
            let api_key = match &entry.api_key {
                Some(key) => Some(key.clone()),
                None if base_url == self.llm.base_url => self.llm.api_key.clone(),
                None => None,
            };
            let settings = LlmSettings {
                provider: Provider::from_name(entry.provider.as_deref().unwrap_or(&id), &base_url),
                api_key: api_key.filter(|k| !k.trim().is_empty()),
                model: entry.model.clone().unwrap_or_else(|| self.llm.model.clone()),
                temperature: entry.temperature.or(self.llm.temperature),
                max_tokens: entry.max_tokens.or(self.llm.max_tokens),
                timeout: Duration::from_secs(entry.timeout_secs.unwrap_or(self.llm.timeout_secs)),
                base_url,
            };
            match all.iter_mut().find(|(existing, _)| *existing == id) {
                Some(slot) => slot.1 = settings,
                None => all.push((id, settings)),
            }
        }
        all
    }

    /// The configured `default` server, if any.
    #[must_use]
    pub fn default_server(&self) -> Option<crate::mcp::types::ServerConfig> {
        let cfg = self.mcp.default_server.as_ref()?;
        let name = cfg
            .name
            .clone()
            .unwrap_or_else(|| "Default MCP Server".to_string());
        let mut server = crate::mcp::types::ServerConfig::new(name, cfg.url.clone()).with_id("default");
        if let Some(key) = cfg.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            server = server.with_header("Authorization", format!("Bearer {key}"));
        }
        Some(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat_subcommand() {
        let cli = Cli::try_parse_from([
            "toolbridge",
            "--max-iterations",
            "2",
            "chat",
            "Weather in Oslo?",
            "--provider",
            "deepseek",
            "--no-tools",
        ])
        .unwrap();
        assert_eq!(cli.max_iterations, Some(2));
        assert_eq!(
            cli.command,
            Some(Command::Chat {
                message: "Weather in Oslo?".into(),
                system: None,
                provider: Some("deepseek".into()),
                no_tools: true,
            })
        );
    }

    #[test]
    fn test_cli_parses_global_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["toolbridge", "serve", "--port", "9100"]).unwrap();
        assert_eq!(cli.command, Some(Command::Serve));
        assert_eq!(cli.port, Some(9100));
    }
}
