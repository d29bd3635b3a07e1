//! Bounded tool loop on top of a [`ChatModel`].
//!
//! The orchestrator manages one multi-turn interaction:
//! 1. Ask the model for the next turn, offering the bridge's tool schemas
//! 2. If the turn requests tools, append it and execute every call in order
//! 3. Append one tool message per call and ask again
//! 4. Stop when the model finishes, or after `max_iterations` tool rounds
//!
//! Hitting the iteration cap is not an error: the last model response is
//! returned with [`LoopState::IterationLimitReached`].
//!
//! # Example
//!
//! ```rust,ignore
//! use toolbridge::llm::{ChatOptions, Message, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(model, bridge).with_max_iterations(5);
//! let outcome = orchestrator
//!     .run(vec![Message::user("Weather in Lisbon?")], ChatOptions::default())
//!     .await?;
//! println!("{}", outcome.content.unwrap_or_default());
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::mcp::bridge::{ToolBridge, format_tool_result};
use crate::mcp::client::elapsed_ms;
use crate::mcp::types::ToolCallResult;

use super::{ChatModel, ChatOptions, ChatRequest, FinishReason, Message, ModelTurn, Usage};

/// Tool rounds allowed per run unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Position of a run in the tool loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Waiting for the model's next turn.
    AwaitModel,
    /// The model asked for tools; they are being executed.
    HasToolCalls,
    /// The model produced a final answer.
    Completed,
    /// The model kept asking for tools until the cap.
    IterationLimitReached,
    /// Cancelled at an iteration boundary.
    Cancelled,
}

impl LoopState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::IterationLimitReached | Self::Cancelled
        )
    }
}

/// Result of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    /// Text of the last model turn.
    pub content: Option<String>,
    /// Finish reason of the last model turn; `None` if no turn happened.
    pub finish_reason: Option<FinishReason>,
    /// Token usage summed over every model call that reported it.
    pub usage: Option<Usage>,
    /// Every executed tool call, in execution order.
    pub tool_calls: Vec<ToolCallResult>,
    /// Completed tool rounds.
    pub iterations: usize,
    pub state: LoopState,
    pub execution_time_ms: u64,
    /// Full conversation including tool turns.
    pub messages: Vec<Message>,
}

impl ChatOutcome {
    #[must_use]
    pub fn had_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    #[must_use]
    pub fn iteration_limit_reached(&self) -> bool {
        self.state == LoopState::IterationLimitReached
    }
}

/// Runs the model/tool loop.
#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    bridge: Arc<ToolBridge>,
    max_iterations: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.name())
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, bridge: Arc<ToolBridge>) -> Self {
        Self {
            model,
            bridge,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Cap on tool rounds; at least one.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Model answering this orchestrator's turns.
    #[must_use]
    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    /// Run to completion.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        options: ChatOptions,
    ) -> Result<ChatOutcome, OrchestratorError> {
        self.run_with_cancellation(messages, options, &CancellationToken::new())
            .await
    }

    /// Run until completion, the iteration cap, or cancellation.
    ///
    /// `cancel` is only checked between iterations; a tool round that has
    /// started always finishes and its results are kept.
    pub async fn run_with_cancellation(
        &self,
        mut messages: Vec<Message>,
        options: ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        tracing::info!(
            request_id = %request_id,
            model = %self.model.name(),
            message_count = messages.len(),
            max_iterations = self.max_iterations,
            enable_tools = options.enable_tools,
            "Starting orchestration"
        );

        let mut usage: Option<Usage> = None;
        let mut executed: Vec<ToolCallResult> = Vec::new();
        let mut iterations = 0;
        let mut last_turn: Option<ModelTurn> = None;
        let mut state = LoopState::AwaitModel;

        while !state.is_terminal() {
            if cancel.is_cancelled() {
                tracing::info!(request_id = %request_id, iteration = iterations, "Orchestration cancelled");
                state = LoopState::Cancelled;
                continue;
            }

            // tools go out on the first turn and after every tool round
            let tools = if options.enable_tools {
                self.bridge.tool_functions()
            } else {
                Vec::new()
            };

            tracing::debug!(
                request_id = %request_id,
                iteration = iterations,
                tool_count = tools.len(),
                "Calling model"
            );

            let turn = self
                .model
                .complete(ChatRequest {
                    messages: messages.clone(),
                    tools,
                    options: options.clone(),
                })
                .await
                .map_err(|source| OrchestratorError::Model {
                    iteration: iterations,
                    source,
                })?;

            if let Some(u) = turn.usage {
                *usage.get_or_insert_default() += u;
            }

            if turn.finish_reason != FinishReason::ToolCalls {
                tracing::info!(
                    request_id = %request_id,
                    iteration = iterations,
                    finish_reason = %turn.finish_reason,
                    "Model finished"
                );
                last_turn = Some(turn);
                state = LoopState::Completed;
                continue;
            }

            let calls = turn.message.tool_calls().to_vec();
            if calls.is_empty() {
                tracing::warn!(
                    request_id = %request_id,
                    iteration = iterations,
                    "Model signalled tool_calls without any tool calls"
                );
                last_turn = Some(turn);
                state = LoopState::Completed;
                continue;
            }

            state = LoopState::HasToolCalls;
            tracing::info!(
                request_id = %request_id,
                iteration = iterations,
                state = ?state,
                tool_call_count = calls.len(),
                "Executing tool calls"
            );

            messages.push(turn.message.clone());
            let results = self.bridge.execute_all(&calls).await;
            for (call, result) in calls.iter().zip(&results) {
                tracing::info!(
                    request_id = %request_id,
                    iteration = iterations,
                    tool_id = %call.id,
                    tool_name = %call.function.name,
                    success = result.success,
                    execution_time_ms = result.execution_time_ms,
                    "Tool call finished"
                );
                messages.push(Message::tool(&call.id, format_tool_result(result)));
            }
            executed.extend(results);
            last_turn = Some(turn);
            iterations += 1;

            if iterations >= self.max_iterations {
                tracing::warn!(
                    request_id = %request_id,
                    iteration = iterations,
                    max_iterations = self.max_iterations,
                    "Maximum tool loop iterations reached"
                );
                state = LoopState::IterationLimitReached;
            } else {
                state = LoopState::AwaitModel;
            }
        }

        let execution_time_ms = elapsed_ms(started);
        let (content, finish_reason) = match last_turn {
            Some(turn) => {
                let content = turn.message.content.clone();
                if state == LoopState::Completed {
                    messages.push(turn.message);
                }
                (content, Some(turn.finish_reason))
            }
            None => (None, None),
        };

        tracing::info!(
            request_id = %request_id,
            state = ?state,
            iterations,
            tool_call_count = executed.len(),
            execution_time_ms,
            "Orchestration finished"
        );

        Ok(ChatOutcome {
            content,
            finish_reason,
            usage,
            tool_calls: executed,
            iterations,
            state,
            execution_time_ms,
            messages,
        })
    }
}
