//! Provider-specific configuration, detection and dispatch.
//!
//! This module handles differences between LLM API providers (URL patterns,
//! authentication) and keeps the set of configured [`ChatModel`]s keyed by
//! provider id.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::LlmError;

use super::ChatModel;

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `DeepSeek` (api.deepseek.com)
    DeepSeek,
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let provider = Provider::detect_from_url("https://api.openai.com");
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: "2024-08-01-preview".to_string(),
            }
        } else if lower.contains("deepseek.com") {
            Self::DeepSeek
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Resolve a configured provider name; `auto` (or empty) detects from the URL.
    #[must_use]
    pub fn from_name(name: &str, base_url: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" => Self::OpenAI,
            "azure" | "azure_openai" => match Self::detect_from_url(base_url) {
                azure @ Self::AzureOpenAI { .. } => azure,
                _ => Self::AzureOpenAI {
                    deployment_name: String::new(),
                    api_version: "2024-08-01-preview".to_string(),
                },
            },
            "deepseek" => Self::DeepSeek,
            "openrouter" => Self::OpenRouter,
            "groq" => Self::Groq,
            "generic" => Self::Generic,
            _ => Self::detect_from_url(base_url),
        }
    }

    /// Stable id used as the provider registry key.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::AzureOpenAI { .. } => "azure",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
            Self::Generic => "generic",
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL (trailing slash tolerated)
    /// * `model` - The model name (Azure uses it when no deployment is set)
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => {
                let deployment = if deployment_name.is_empty() {
                    model
                } else {
                    deployment_name
                };
                format!(
                    "{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
                )
            }
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}

/// Configured chat models keyed by provider id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    models: BTreeMap<String, Arc<dyn ChatModel>>,
    default_id: Option<String>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.models.keys().collect::<Vec<_>>())
            .field("default", &self.default_id)
            .finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. The first registration becomes the default.
    ///
    /// Ids are case-insensitive.
    pub fn register(&mut self, id: impl Into<String>, model: Arc<dyn ChatModel>) {
        let id = id.into().trim().to_lowercase();
        if self.default_id.is_none() {
            self.default_id = Some(id.clone());
        }
        self.models.insert(id, model);
    }

    /// Look up a model; `None` picks the default.
    pub fn get(&self, id: Option<&str>) -> Result<Arc<dyn ChatModel>, LlmError> {
        let id = id
            .or(self.default_id.as_deref())
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.models
            .get(&id)
            .cloned()
            .ok_or(LlmError::UnknownProvider(id))
    }

    /// Registered provider ids.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}
