//! Structured payloads exchanged between research agents.
//!
//! The `JsonSchema` derives feed the structured-output contract sent to the
//! provider; doc comments on fields become schema descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of clarifying questions a session always carries.
pub const QUESTION_COUNT: usize = 4;

/// Questions used whenever the clarifier cannot produce a valid set.
pub const DEFAULT_QUESTIONS: [&str; QUESTION_COUNT] = [
    "What specific aspect or subtopic should the research focus on?",
    "What time period or date range is most relevant?",
    "Are there any specific geographic regions or countries of interest?",
    "What level of technical detail or depth are you looking for?",
];

/// Raw clarifier output, as the model returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyingQuestions {
    /// Exactly 4 short, specific clarifying questions.
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionSetError {
    #[error("expected {QUESTION_COUNT} questions, got {0}")]
    WrongCount(usize),

    #[error("question {0} is blank")]
    Blank(usize),
}

/// Four ordered, non-blank questions. Answers match them by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct QuestionSet([String; QUESTION_COUNT]);

impl QuestionSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for QuestionSet {
    fn default() -> Self {
        Self(DEFAULT_QUESTIONS.map(String::from))
    }
}

impl TryFrom<Vec<String>> for QuestionSet {
    type Error = QuestionSetError;

    fn try_from(questions: Vec<String>) -> Result<Self, Self::Error> {
        if let Some(pos) = questions.iter().position(|q| q.trim().is_empty()) {
            if questions.len() == QUESTION_COUNT {
                return Err(QuestionSetError::Blank(pos + 1));
            }
        }
        let count = questions.len();
        let questions: [String; QUESTION_COUNT] = questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| QuestionSetError::WrongCount(count))?;
        Ok(Self(questions))
    }
}

impl TryFrom<ClarifyingQuestions> for QuestionSet {
    type Error = QuestionSetError;

    fn try_from(raw: ClarifyingQuestions) -> Result<Self, Self::Error> {
        Self::try_from(raw.questions)
    }
}

impl From<QuestionSet> for Vec<String> {
    fn from(set: QuestionSet) -> Self {
        set.0.into()
    }
}

/// One web search the planner wants performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchItem {
    /// Your reasoning for why this search is important to the query.
    pub reason: String,

    /// The search term to use for the web search.
    pub query: String,
}

/// Planner output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlan {
    /// A list of web searches to perform to best answer the query.
    pub searches: Vec<SearchItem>,
}

/// Writer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportData {
    /// A short 2-3 sentence summary of the findings.
    pub short_summary: String,

    /// The final report, in markdown.
    pub markdown_report: String,

    /// Suggested topics to research further.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// What the email tool reports back. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EmailReceipt {
    Success { id: String },
    Error { message: String },
}

impl EmailReceipt {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Provider message id on success, failure reason otherwise.
    pub fn detail(&self) -> &str {
        match self {
            Self::Success { id } => id,
            Self::Error { message } => message,
        }
    }
}
