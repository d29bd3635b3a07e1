//! Model Context Protocol (MCP) client side.
//!
//! Talks JSON-RPC over HTTP to any number of tool servers, keeps their
//! sessions and tool catalogs, and exposes those tools to a model as
//! function schemas.
//!
//! # Configuration
//!
//! Servers can be seeded from an `mcp.json` file:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "weather": {
//!       "url": "http://127.0.0.1:8090/mcp",
//!       "headers": { "Authorization": "Bearer ${WEATHER_TOKEN}" }
//!     }
//!   }
//! }
//! ```
//!
//! # Layers
//!
//! - [`client::McpClient`]: one request, one response, never panics or errors out
//! - [`registry::ServerRegistry`]: servers, sessions and cached catalogs
//! - [`bridge::ToolBridge`]: function schemas and tool-call dispatch by name

pub mod bridge;
pub mod client;
pub mod config;
pub mod registry;
pub mod sse;
pub mod types;
