//! # deepresearch core
//!
//! Domain types, traits, and error definitions for the research assistant.
//! Nothing in here talks to the network: the provider and tool traits are
//! defined here and implemented in their own crates.
//!
//! ## Layout
//!
//! - [`provider`] / [`tool`]: the seams every LLM backend and agent
//!   capability implements.
//! - [`research`]: the structured payloads agents exchange (questions,
//!   search plans, reports, email receipts).
//! - [`session`]: per-session clarify/research state.
//! - [`event`]: broadcast bus for pipeline observability.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod research;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition, Usage};
pub use research::{
    ClarifyingQuestions, DEFAULT_QUESTIONS, EmailReceipt, QUESTION_COUNT, QuestionSet, ReportData,
    SearchItem, SearchPlan,
};
pub use session::{Controls, SessionState};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
