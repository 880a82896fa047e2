//! Session handlers behind every presentation layer.
//!
//! The gateway and the terminal command both drive a session through these
//! three calls: generate questions, run research, reset.

use crate::answers::{RefinedPrompt, answers_template, extract_answers, questions_markdown};
use crate::clarifier::Clarifier;
use crate::invoker::AgentInvoker;
use crate::orchestrator::{ResearchOptions, ResearchOrchestrator};
use crate::stream::{ResearchEvent, ResearchStream};
use deepresearch_core::event::EventBus;
use deepresearch_core::research::QuestionSet;
use deepresearch_core::session::{Controls, SessionState};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EMPTY_QUERY_WARNING: &str = "⚠️ Please enter a research query first.";
pub const CLARIFYING_STATUS: &str = "🤔 Generating clarifying questions...";
pub const QUESTIONS_READY: &str = "✅ Questions generated! Please fill in your answers above.";
pub const CLARIFY_SUPERSEDED: &str = "⚠️ The session changed while questions were generated; please try again.";
pub const NOT_CLARIFIED_WARNING: &str = "⚠️ Please generate clarifying questions first.";
pub const RESEARCH_STARTED: &str = "🚀 Starting deep research...\n\n";

/// What the presentation layer shows after a clarify request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarifyOutcome {
    pub status: String,
    pub questions_markdown: Option<String>,
    pub answers_template: Option<String>,
    pub controls: Controls,
}

pub struct ResearchAssistant {
    invoker: Arc<dyn AgentInvoker>,
    clarifier: Clarifier,
    options: ResearchOptions,
    event_bus: Arc<EventBus>,
}

impl ResearchAssistant {
    pub fn new(invoker: Arc<dyn AgentInvoker>, options: ResearchOptions, event_bus: Arc<EventBus>) -> Self {
        Self {
            clarifier: Clarifier::new(invoker.clone()),
            invoker,
            options,
            event_bus,
        }
    }

    pub fn options(&self) -> &ResearchOptions {
        &self.options
    }

    /// Generate clarifying questions for `query` and store them in `state`.
    ///
    /// A blank query leaves `state` untouched and never reaches the model.
    pub async fn generate_questions(&self, state: &mut SessionState, query: &str) -> ClarifyOutcome {
        let query = match self.start_clarify(state, query) {
            Ok(query) => query,
            Err(outcome) => return outcome,
        };
        let questions = self.clarify(&query).await;
        self.complete_clarify(state, &query, questions)
    }

    /// Validate `query` and mark `state` as waiting for its questions.
    ///
    /// Returns the trimmed query, or the outcome to show when it is blank.
    pub fn start_clarify(&self, state: &mut SessionState, query: &str) -> Result<String, ClarifyOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClarifyOutcome {
                status: EMPTY_QUERY_WARNING.into(),
                questions_markdown: None,
                answers_template: None,
                controls: Controls::HIDDEN,
            });
        }
        info!(%query, "Generating clarifying questions");
        state.begin_clarify(query);
        Ok(query.to_string())
    }

    /// Run the clarifier. Touches no session state, so callers may await it
    /// without holding a lock.
    pub async fn clarify(&self, query: &str) -> QuestionSet {
        self.clarifier.generate(query).await
    }

    /// Attach `questions` to `state` if it is still waiting on `query`.
    ///
    /// A session that was reset or re-clarified in the meantime keeps its
    /// current state and the questions are discarded.
    pub fn complete_clarify(&self, state: &mut SessionState, query: &str, questions: QuestionSet) -> ClarifyOutcome {
        let outcome = ClarifyOutcome {
            status: QUESTIONS_READY.into(),
            questions_markdown: Some(questions_markdown(&questions)),
            answers_template: Some(answers_template(&questions)),
            controls: Controls {
                answers: true,
                run_research: true,
                reset: true,
            },
        };

        let pending = matches!(state, SessionState::AwaitingQuestions { query: q } if q == query);
        if pending && state.finish_clarify(questions) {
            return outcome;
        }

        warn!(%query, "Discarding questions for a superseded clarify request");
        ClarifyOutcome {
            status: CLARIFY_SUPERSEDED.into(),
            questions_markdown: None,
            answers_template: None,
            controls: state.controls(),
        }
    }

    /// Start research from a clarified session and the user's answer text.
    ///
    /// Without questions the stream holds a single warning and nothing runs.
    pub fn run_research(&self, state: &SessionState, answers_text: &str) -> ResearchStream {
        let (Some(query), Some(questions)) = (state.query(), state.questions()) else {
            return ResearchStream::once(ResearchEvent::Warning {
                message: NOT_CLARIFIED_WARNING.into(),
            });
        };

        let answers = extract_answers(answers_text);
        debug!(answers = answers.len(), "Extracted answers");
        let prompt = RefinedPrompt::build(query, questions, &answers);

        let (tx, stream) = ResearchStream::channel();
        let _ = tx.status(RESEARCH_STARTED);
        ResearchOrchestrator::new(self.invoker.clone(), self.options.clone(), self.event_bus.clone())
            .spawn(prompt.into_string(), tx);
        stream
    }

    pub fn reset(&self, state: &mut SessionState) -> Controls {
        info!("Session reset");
        state.reset()
    }
}
