//! Clarifying question generation with a fixed fallback.

use crate::invoker::AgentInvoker;
use crate::roles::{AgentRole, AgentTask};
use deepresearch_core::error::{AgentError, Error};
use deepresearch_core::research::QuestionSet;
use std::sync::Arc;
use tracing::{info, warn};

pub use deepresearch_core::research::DEFAULT_QUESTIONS;

pub struct Clarifier {
    invoker: Arc<dyn AgentInvoker>,
}

impl Clarifier {
    pub fn new(invoker: Arc<dyn AgentInvoker>) -> Self {
        Self { invoker }
    }

    /// Always returns four questions. Any failure falls back to
    /// [`DEFAULT_QUESTIONS`].
    pub async fn generate(&self, query: &str) -> QuestionSet {
        match self.try_generate(query).await {
            Ok(questions) => {
                info!("Generated clarifying questions");
                questions
            }
            Err(e) => {
                warn!(error = %e, "Clarifier failed, using default questions");
                QuestionSet::default()
            }
        }
    }

    pub async fn try_generate(&self, query: &str) -> Result<QuestionSet, Error> {
        let raw = self
            .invoker
            .invoke(AgentTask::Clarify { query: query.to_string() })
            .await?
            .into_questions()?;

        QuestionSet::try_from(raw).map_err(|e| {
            AgentError::UnexpectedOutput {
                role: AgentRole::Clarifier.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::AgentOutput;
    use crate::test_helpers::ScriptedInvoker;
    use deepresearch_core::error::ProviderError;
    use deepresearch_core::research::ClarifyingQuestions;

    fn clarifier_returning(questions: Vec<&'static str>) -> Clarifier {
        Clarifier::new(Arc::new(ScriptedInvoker::new(move |_| {
            Ok(AgentOutput::Questions(ClarifyingQuestions {
                questions: questions.iter().map(|q| q.to_string()).collect(),
            }))
        })))
    }

    #[tokio::test]
    async fn four_questions_are_used_as_is() {
        let clarifier = clarifier_returning(vec!["Which sector?", "Which years?", "Which region?", "How deep?"]);
        let set = clarifier.generate("AI in healthcare").await;
        assert_eq!(set.as_slice()[0], "Which sector?");
        assert_eq!(set.as_slice()[3], "How deep?");
    }

    #[tokio::test]
    async fn three_questions_fall_back_to_defaults() {
        let clarifier = clarifier_returning(vec!["a?", "b?", "c?"]);
        assert_eq!(clarifier.generate("q").await, QuestionSet::default());
    }

    #[tokio::test]
    async fn five_questions_fall_back_to_defaults() {
        let clarifier = clarifier_returning(vec!["a?", "b?", "c?", "d?", "e?"]);
        assert_eq!(clarifier.generate("q").await.as_slice(), DEFAULT_QUESTIONS);
    }

    #[tokio::test]
    async fn invocation_failure_falls_back_to_defaults() {
        let clarifier = Clarifier::new(Arc::new(ScriptedInvoker::new(|_| {
            Err(ProviderError::Network("connection refused".into()).into())
        })));
        assert_eq!(clarifier.generate("q").await, QuestionSet::default());
    }

    #[tokio::test]
    async fn try_generate_reports_the_count_problem() {
        let clarifier = clarifier_returning(vec!["only one?"]);
        let err = clarifier.try_generate("q").await.unwrap_err();
        assert!(err.to_string().contains("expected 4 questions, got 1"));
    }

    #[tokio::test]
    async fn query_is_passed_through() {
        let invoker = Arc::new(ScriptedInvoker::new(|_| {
            Ok(AgentOutput::Questions(ClarifyingQuestions { questions: vec![] }))
        }));
        Clarifier::new(invoker.clone()).generate("quantum batteries").await;
        assert_eq!(invoker.calls(), vec![AgentTask::Clarify { query: "quantum batteries".into() }]);
    }
}
