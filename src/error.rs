//! Error types for each layer of the crate.
//!
//! Transport and protocol failures never escape the MCP client's public
//! operations; they are converted into failed results or empty catalogs at
//! that boundary. The enums here are what the layers use internally and what
//! callers see for validation and model failures.

use thiserror::Error;

/// Configuration loading failure.
pub use config::ConfigError;

/// Failure while talking to an MCP server.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body was not valid JSON-RPC.
    #[error("invalid JSON-RPC response: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a JSON-RPC `error` object.
    #[error("{message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the server.
        message: String,
    },

    /// Response carried neither `result` nor `error`.
    #[error("missing result in {method} response")]
    MissingResult {
        /// Method that was called.
        method: String,
    },
}

/// Rejected server registration.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No URL was supplied.
    #[error("Server URL is required")]
    MissingUrl,

    /// The URL does not parse.
    #[error("Invalid server URL '{url}': {source}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
}

/// Failure while asking a model for a completion.
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response had no choices.
    #[error("model returned no choices")]
    EmptyChoices,

    /// No model registered under the requested provider id.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Failure of an orchestration run.
///
/// Tool failures are not represented here; they are reported per call in the
/// run outcome and fed back to the model.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The model call failed.
    #[error("model call failed at iteration {iteration}: {source}")]
    Model {
        /// Zero-based iteration at which the model failed.
        iteration: usize,
        /// Underlying model error.
        #[source]
        source: LlmError,
    },
}
