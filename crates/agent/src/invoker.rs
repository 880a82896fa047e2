//! Agent invocation: one call in, one structured output back.

use crate::loop_runner::{LoopOutcome, ToolLoop};
use crate::roles::{AgentOutput, AgentRole, AgentTask};
use crate::structured;
use async_trait::async_trait;
use deepresearch_config::AppConfig;
use deepresearch_core::error::{AgentError, Error, ToolError};
use deepresearch_core::event::{DomainEvent, EventBus};
use deepresearch_core::message::Message;
use deepresearch_core::provider::Provider;
use deepresearch_core::research::{ClarifyingQuestions, EmailReceipt, ReportData, SearchPlan};
use deepresearch_core::tool::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs an agent role on a task.
///
/// The pipeline depends only on this trait, so tests and alternative
/// backends can stand in for the model.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, task: AgentTask) -> Result<AgentOutput, Error>;
}

/// [`AgentInvoker`] backed by an LLM provider and the research tools.
pub struct LlmInvoker {
    provider: Arc<dyn Provider>,
    default_model: String,
    models: HashMap<AgentRole, String>,
    temperature: f32,
    max_tokens: Option<u32>,
    research_tools: Arc<ToolRegistry>,
    email_tools: Arc<ToolRegistry>,
    no_tools: Arc<ToolRegistry>,
    max_tool_iterations: usize,
    step_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl LlmInvoker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, event_bus: Arc<EventBus>) -> Self {
        Self {
            provider,
            default_model: model.into(),
            models: HashMap::new(),
            temperature: 0.7,
            max_tokens: None,
            research_tools: Arc::new(ToolRegistry::new()),
            email_tools: Arc::new(ToolRegistry::new()),
            no_tools: Arc::new(ToolRegistry::new()),
            max_tool_iterations: 6,
            step_timeout: Duration::from_secs(180),
            event_bus,
        }
    }

    /// Build from application config, wiring the search and email tools.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, ToolError> {
        let overrides = [
            (AgentRole::Clarifier, &config.models.clarifier),
            (AgentRole::Planner, &config.models.planner),
            (AgentRole::Researcher, &config.models.researcher),
            (AgentRole::Writer, &config.models.writer),
            (AgentRole::Emailer, &config.models.emailer),
        ];

        let mut invoker = Self::new(provider, &config.model, event_bus)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_research_tools(deepresearch_tools::research_registry(config)?)
            .with_email_tools(deepresearch_tools::email_registry(config)?)
            .with_max_tool_iterations(config.research.max_tool_iterations)
            .with_step_timeout(Duration::from_secs(config.research.step_timeout_secs));
        for (role, model) in overrides {
            if let Some(model) = model {
                invoker = invoker.with_model(role, model);
            }
        }
        Ok(invoker)
    }

    /// Use a different model for one role.
    pub fn with_model(mut self, role: AgentRole, model: impl Into<String>) -> Self {
        self.models.insert(role, model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_research_tools(mut self, tools: ToolRegistry) -> Self {
        self.research_tools = Arc::new(tools);
        self
    }

    pub fn with_email_tools(mut self, tools: ToolRegistry) -> Self {
        self.email_tools = Arc::new(tools);
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn model_for(&self, role: AgentRole) -> &str {
        self.models.get(&role).unwrap_or(&self.default_model)
    }

    fn tools_for(&self, role: AgentRole) -> Arc<ToolRegistry> {
        match role {
            AgentRole::Researcher => self.research_tools.clone(),
            AgentRole::Emailer => self.email_tools.clone(),
            _ => self.no_tools.clone(),
        }
    }

    fn tool_loop(&self, role: AgentRole) -> ToolLoop {
        let mut tool_loop = ToolLoop::new(
            self.provider.clone(),
            self.model_for(role),
            self.tools_for(role),
            self.event_bus.clone(),
        )
        .with_temperature(self.temperature)
        .with_max_iterations(self.max_tool_iterations);
        if let Some(max) = self.max_tokens {
            tool_loop = tool_loop.with_max_tokens(max);
        }
        // One report, one email.
        if role == AgentRole::Emailer {
            tool_loop = tool_loop.finish_on(deepresearch_tools::email::TOOL_NAME);
        }
        tool_loop
    }
}

#[async_trait]
impl AgentInvoker for LlmInvoker {
    async fn invoke(&self, task: AgentTask) -> Result<AgentOutput, Error> {
        let role = task.role();
        let messages = vec![Message::system(role.instructions()), Message::user(task.input())];
        let response_format = match role {
            AgentRole::Clarifier => Some(structured::response_format::<ClarifyingQuestions>()),
            AgentRole::Planner => Some(structured::response_format::<SearchPlan>()),
            AgentRole::Writer => Some(structured::response_format::<ReportData>()),
            AgentRole::Researcher | AgentRole::Emailer => None,
        };

        let tool_loop = self.tool_loop(role);
        debug!(%role, model = tool_loop.model(), "Invoking agent");

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.step_timeout, tool_loop.run(role, messages, response_format))
            .await
            .map_err(|_| AgentError::Timeout {
                role: role.to_string(),
                timeout_secs: self.step_timeout.as_secs(),
            })??;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(%role, iterations = outcome.iterations, tokens = outcome.tokens_used, duration_ms, "Agent finished");
        self.event_bus.publish(DomainEvent::AgentInvoked {
            role: role.to_string(),
            model: tool_loop.model().to_string(),
            tokens_used: outcome.tokens_used,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        into_output(role, outcome)
    }
}

fn into_output(role: AgentRole, outcome: LoopOutcome) -> Result<AgentOutput, Error> {
    let unexpected = |reason: &str| AgentError::UnexpectedOutput {
        role: role.to_string(),
        reason: reason.to_string(),
    };

    let output = match role {
        AgentRole::Clarifier => AgentOutput::Questions(structured::parse(role, &outcome.answer)?),
        AgentRole::Planner => AgentOutput::Plan(structured::parse(role, &outcome.answer)?),
        AgentRole::Writer => AgentOutput::Report(structured::parse(role, &outcome.answer)?),
        AgentRole::Researcher => {
            let summary = outcome.answer.trim();
            if summary.is_empty() {
                return Err(unexpected("empty summary").into());
            }
            AgentOutput::Summary(summary.to_string())
        }
        AgentRole::Emailer => {
            let data = outcome
                .tool_results
                .into_iter()
                .rev()
                .find(|(name, _)| name == deepresearch_tools::email::TOOL_NAME)
                .and_then(|(_, result)| result.data)
                .ok_or_else(|| unexpected("no email was sent"))?;
            let receipt: EmailReceipt =
                serde_json::from_value(data).map_err(|e| unexpected(&format!("bad receipt: {e}")))?;
            AgentOutput::Email(receipt)
        }
    };
    Ok(output)
}
