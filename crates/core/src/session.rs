//! Per-session clarify/research state.
//!
//! A session moves `Idle -> AwaitingQuestions -> Clarified`. Research is only
//! allowed from `Clarified`; reset always returns to `Idle`.

use serde::{Deserialize, Serialize};
use crate::research::QuestionSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// A query was submitted and questions are being generated.
    AwaitingQuestions { query: String },
    /// Questions are ready; the user can answer them and start research.
    Clarified { query: String, questions: QuestionSet },
}

/// Which downstream controls the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    pub answers: bool,
    pub run_research: bool,
    pub reset: bool,
}

impl Controls {
    pub const HIDDEN: Controls = Controls {
        answers: false,
        run_research: false,
        reset: false,
    };
}

impl SessionState {
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingQuestions { query } | Self::Clarified { query, .. } => Some(query),
        }
    }

    pub fn questions(&self) -> Option<&QuestionSet> {
        match self {
            Self::Clarified { questions, .. } => Some(questions),
            _ => None,
        }
    }

    pub fn is_clarified(&self) -> bool {
        matches!(self, Self::Clarified { .. })
    }

    /// Record a submitted query. Any previous questions are discarded.
    pub fn begin_clarify(&mut self, query: impl Into<String>) {
        *self = Self::AwaitingQuestions { query: query.into() };
    }

    /// Attach generated questions to the pending query.
    ///
    /// Returns `false` (and leaves the state alone) when no query is pending,
    /// e.g. because the session was reset while questions were generated.
    pub fn finish_clarify(&mut self, questions: QuestionSet) -> bool {
        match std::mem::take(self) {
            Self::AwaitingQuestions { query } => {
                *self = Self::Clarified { query, questions };
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    /// Clear everything and hide every downstream control.
    pub fn reset(&mut self) -> Controls {
        *self = Self::Idle;
        self.controls()
    }

    pub fn controls(&self) -> Controls {
        if self.is_clarified() {
            Controls {
                answers: true,
                run_research: true,
                reset: true,
            }
        } else {
            Controls::HIDDEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> QuestionSet {
        QuestionSet::try_from(vec![
            "q1".to_string(),
            "q2".to_string(),
            "q3".to_string(),
            "q4".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn new_session_is_empty() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Idle);
        assert!(state.query().is_none());
        assert!(state.questions().is_none());
        assert_eq!(state.controls(), Controls::HIDDEN);
    }

    #[test]
    fn clarify_flow_sets_query_then_questions() {
        let mut state = SessionState::default();
        state.begin_clarify("AI in healthcare");
        assert_eq!(state.query(), Some("AI in healthcare"));
        assert!(!state.is_clarified());

        assert!(state.finish_clarify(questions()));
        assert!(state.is_clarified());
        assert_eq!(state.questions().unwrap().as_slice()[0], "q1");
        assert!(state.controls().run_research);
    }

    #[test]
    fn finish_without_pending_query_is_ignored() {
        let mut state = SessionState::default();
        assert!(!state.finish_clarify(questions()));
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn reset_clears_everything_and_hides_controls() {
        let mut state = SessionState::default();
        state.begin_clarify("topic");
        state.finish_clarify(questions());

        let controls = state.reset();
        assert_eq!(state, SessionState::Idle);
        assert_eq!(controls, Controls::HIDDEN);
    }

    #[test]
    fn state_serializes_with_stage_tag() {
        let mut state = SessionState::default();
        state.begin_clarify("topic");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stage"], "awaiting_questions");
        assert_eq!(json["query"], "topic");
    }
}
