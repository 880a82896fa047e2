//! The tool-calling loop shared by every agent role.

use crate::roles::AgentRole;
use deepresearch_core::error::AgentError;
use deepresearch_core::event::{DomainEvent, EventBus};
use deepresearch_core::message::Message;
use deepresearch_core::provider::{Provider, ProviderRequest, ResponseFormat};
use deepresearch_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Calls the model, runs any requested tools, and repeats until the model
/// answers in plain text.
pub struct ToolLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tools offered to the model
    tools: Arc<ToolRegistry>,

    /// Maximum model calls per run
    max_iterations: usize,

    /// End the run on this tool's first result instead of asking the model
    /// again. Later calls to any tool are not executed.
    finish_on: Option<String>,

    event_bus: Arc<EventBus>,
}

/// What one loop run produced.
#[derive(Debug)]
pub struct LoopOutcome {
    /// The model's final text answer
    pub answer: String,

    /// Every successful tool result, keyed by tool name, in call order
    pub tool_results: Vec<(String, ToolResult)>,

    pub iterations: usize,

    pub tokens_used: u32,
}

impl ToolLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            max_iterations: 6,
            finish_on: None,
            event_bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Make `tool` terminal: its first result ends the run, and its output
    /// becomes the answer.
    pub fn finish_on(mut self, tool: impl Into<String>) -> Self {
        self.finish_on = Some(tool.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run the loop over `messages` until the model stops calling tools.
    pub async fn run(
        &self,
        role: AgentRole,
        mut messages: Vec<Message>,
        response_format: Option<ResponseFormat>,
    ) -> Result<LoopOutcome, deepresearch_core::Error> {
        let tool_definitions = self.tools.definitions();
        let mut tool_results = Vec::new();
        let mut tokens_used = 0;

        for iteration in 1..=self.max_iterations {
            debug!(%role, iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                response_format: response_format.clone(),
            };

            let response = self.provider.complete(request).await?;
            if let Some(usage) = &response.usage {
                tokens_used += usage.total_tokens;
            }

            if response.message.tool_calls.is_empty() {
                return Ok(LoopOutcome {
                    answer: response.message.content,
                    tool_results,
                    iterations: iteration,
                    tokens_used,
                });
            }

            debug!(%role, tool_count = response.message.tool_calls.len(), "Executing tool calls");

            let tool_calls = response.message.tool_calls.clone();
            messages.push(response.message);

            for (index, tc) in tool_calls.iter().enumerate() {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let start = std::time::Instant::now();
                let result = self.tools.execute(&call).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success: result.as_ref().is_ok_and(|r| r.success),
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });

                match result {
                    Ok(tool_result) => {
                        messages.push(Message::tool_result(&tool_result.call_id, &tool_result.output));
                        let answer = tool_result.output.clone();
                        tool_results.push((tc.name.clone(), tool_result));
                        if self.finish_on.as_deref() == Some(tc.name.as_str()) {
                            let skipped = tool_calls.len() - index - 1;
                            if skipped > 0 {
                                warn!(%role, tool = %tc.name, skipped, "Ignoring tool calls after the terminal tool");
                            }
                            return Ok(LoopOutcome {
                                answer,
                                tool_results,
                                iterations: iteration,
                                tokens_used,
                            });
                        }
                    }
                    Err(e) => {
                        warn!(%role, tool = %tc.name, error = %e, "Tool execution failed");
                        // The model sees the failure and can recover.
                        messages.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        }

        warn!(%role, max_iterations = self.max_iterations, "Max tool iterations reached");
        Err(AgentError::IterationLimit {
            role: role.to_string(),
            max_iterations: self.max_iterations,
        }
        .into())
    }
}
