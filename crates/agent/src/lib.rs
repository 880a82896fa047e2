//! Agents and the streaming research pipeline.
//!
//! A session runs in two steps:
//!
//! 1. **Clarify**: the [`Clarifier`] asks the model for exactly four
//!    clarifying questions, falling back to a fixed set on any failure.
//! 2. **Research**: the user's answers are folded into a [`RefinedPrompt`] and
//!    handed to the [`ResearchOrchestrator`], which plans searches, runs them
//!    concurrently, writes a report, optionally emails it, and streams
//!    progress the whole way.
//!
//! Every model call goes through [`AgentInvoker::invoke`] with one of the
//! [`AgentRole`]s. [`ResearchAssistant`] wraps both steps behind the handlers
//! the gateway and the terminal command share.

pub mod answers;
pub mod assistant;
pub mod clarifier;
pub mod invoker;
pub mod loop_runner;
pub mod orchestrator;
pub mod roles;
pub mod stream;
pub mod structured;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use answers::{NOT_ANSWERED, RefinedPrompt, answers_template, extract_answers, questions_markdown};
pub use assistant::{ClarifyOutcome, ResearchAssistant};
pub use clarifier::Clarifier;
pub use invoker::{AgentInvoker, LlmInvoker};
pub use loop_runner::{LoopOutcome, ToolLoop};
pub use orchestrator::{ResearchOptions, ResearchOrchestrator};
pub use roles::{AgentOutput, AgentRole, AgentTask};
pub use stream::{ChunkSender, ResearchEvent, ResearchStream};
