//! OpenAI Chat Completions API model.
//!
//! This module implements the [`ChatModel`] trait for the OpenAI-compatible
//! Chat Completions API (`/v1/chat/completions`). Requests are non-streaming;
//! each call yields one complete assistant turn.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;

use super::{ChatModel, ChatRequest, FinishReason, LlmSettings, Message, ModelTurn, Provider, Usage};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Model backed by the Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsModel {
    http: reqwest::Client,
    settings: LlmSettings,
    url: String,
}

impl std::fmt::Debug for ChatCompletionsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsModel")
            .field("url", &self.url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsModel {
    /// Create a model client with the configured request timeout.
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        let url = settings
            .provider
            .build_chat_url(&settings.base_url, &settings.model);
        Ok(Self { http, settings, url })
    }

    /// Endpoint this model posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn body(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        let options = &request.options;
        let mut body = json!({
            "model": options.model.as_deref().unwrap_or(&self.settings.model),
            "messages": request.messages,
        });

        if let Some(temperature) = options.temperature.or(self.settings.temperature) {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens.or(self.settings.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(&request.tools)?;
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ChatModel for ChatCompletionsModel {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<ModelTurn, LlmError> {
        let body = self.body(&request)?;

        tracing::debug!(
            url = %self.url,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "Sending chat completion request"
        );

        let mut rb = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = match self.settings.provider {
                Provider::AzureOpenAI { .. } => rb.header("api-key", key),
                _ => rb.bearer_auth(key),
            };
        }

        let resp = rb.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyChoices)?;

        let finish_reason = match choice.finish_reason {
            Some(reason) => FinishReason::from(reason),
            None if !choice.message.tool_calls().is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };

        Ok(ModelTurn {
            message: choice.message,
            finish_reason,
            usage: parsed.usage,
        })
    }
}

/// `error.message` from an OpenAI-style error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
