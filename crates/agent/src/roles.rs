//! Agent roles and their request/response contracts.
//!
//! Each role has fixed instructions, a fixed input shape ([`AgentTask`]) and a
//! fixed output shape ([`AgentOutput`]). Everything goes through
//! [`AgentInvoker::invoke`](crate::invoker::AgentInvoker::invoke).

use deepresearch_core::error::AgentError;
use deepresearch_core::research::{ClarifyingQuestions, EmailReceipt, ReportData, SearchItem, SearchPlan};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Clarifier,
    Planner,
    Researcher,
    Writer,
    Emailer,
}

const CLARIFIER_INSTRUCTIONS: &str = "You are a helpful research assistant. Given a user's research query, generate exactly 4 clarifying questions that will help improve the quality of web searches and the final research report.

Your questions should:
- Be short and specific (one sentence each)
- Help narrow down the scope, timeframe, geography, or specific aspects of the topic
- Avoid yes/no questions when possible
- Focus on details that would make web searches more targeted and effective

Always return exactly 4 questions, no more, no less.";

const PLANNER_INSTRUCTIONS: &str = "You are a helpful research assistant. Given a query and the clarifications the user provided, come up with a set of web searches to perform to best answer the query. Output between 3 and 10 search terms, each with a short reason explaining why it matters.";

const RESEARCHER_INSTRUCTIONS: &str = "You are a research assistant. Given a search term, you search the web for that term and produce a concise summary of the results. The summary must be 2-3 paragraphs and less than 300 words. Capture the main points. Write succinctly, no need to have complete sentences or good grammar. This will be consumed by someone synthesizing a report, so it's vital you capture the essence and ignore any fluff. Do not include any additional commentary other than the summary itself.";

const WRITER_INSTRUCTIONS: &str = "You are a senior researcher tasked with writing a cohesive report for a research query. You will be provided with the original query, and some initial research done by a research assistant.
You should first come up with an outline for the report that describes the structure and flow of the report. Then, generate the report and return that as your final output.
The final output should be in markdown format, and it should be lengthy and detailed. Aim for 5-10 pages of content, at least 1000 words.";

const EMAILER_INSTRUCTIONS: &str = "You are able to send a nicely formatted HTML email based on a detailed report. You will be provided with a detailed report. You should use your tool to send one email, providing the report converted into clean, well presented HTML with an appropriate subject line.";

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        Self::Clarifier,
        Self::Planner,
        Self::Researcher,
        Self::Writer,
        Self::Emailer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clarifier => "clarifier",
            Self::Planner => "planner",
            Self::Researcher => "researcher",
            Self::Writer => "writer",
            Self::Emailer => "emailer",
        }
    }

    /// System instructions sent with every invocation of this role.
    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Clarifier => CLARIFIER_INSTRUCTIONS,
            Self::Planner => PLANNER_INSTRUCTIONS,
            Self::Researcher => RESEARCHER_INSTRUCTIONS,
            Self::Writer => WRITER_INSTRUCTIONS,
            Self::Emailer => EMAILER_INSTRUCTIONS,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of work for one agent role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTask {
    Clarify { query: String },
    Plan { prompt: String },
    Search { item: SearchItem },
    Write { prompt: String, summaries: Vec<String> },
    Email { report: String },
}

impl AgentTask {
    pub fn role(&self) -> AgentRole {
        match self {
            Self::Clarify { .. } => AgentRole::Clarifier,
            Self::Plan { .. } => AgentRole::Planner,
            Self::Search { .. } => AgentRole::Researcher,
            Self::Write { .. } => AgentRole::Writer,
            Self::Email { .. } => AgentRole::Emailer,
        }
    }

    /// The user-turn text for this task.
    pub fn input(&self) -> String {
        match self {
            Self::Clarify { query } => format!("Research query: {query}"),
            Self::Plan { prompt } => format!("Query: {prompt}"),
            Self::Search { item } => format!(
                "Search term: {}\nReason for searching: {}",
                item.query, item.reason
            ),
            Self::Write { prompt, summaries } => {
                let mut input = format!("Original query: {prompt}\n\nSummarized search results:\n");
                for (i, summary) in summaries.iter().enumerate() {
                    let _ = write!(input, "\n[{}] {}\n", i + 1, summary.trim());
                }
                input
            }
            Self::Email { report } => report.clone(),
        }
    }
}

/// What an agent role produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    Questions(ClarifyingQuestions),
    Plan(SearchPlan),
    Summary(String),
    Report(ReportData),
    Email(EmailReceipt),
}

impl AgentOutput {
    fn kind(&self) -> &'static str {
        match self {
            Self::Questions(_) => "questions",
            Self::Plan(_) => "plan",
            Self::Summary(_) => "summary",
            Self::Report(_) => "report",
            Self::Email(_) => "email receipt",
        }
    }

    fn mismatch(&self, role: AgentRole) -> AgentError {
        AgentError::UnexpectedOutput {
            role: role.to_string(),
            reason: format!("got a {}", self.kind()),
        }
    }

    pub fn into_questions(self) -> Result<ClarifyingQuestions, AgentError> {
        match self {
            Self::Questions(q) => Ok(q),
            other => Err(other.mismatch(AgentRole::Clarifier)),
        }
    }

    pub fn into_plan(self) -> Result<SearchPlan, AgentError> {
        match self {
            Self::Plan(p) => Ok(p),
            other => Err(other.mismatch(AgentRole::Planner)),
        }
    }

    pub fn into_summary(self) -> Result<String, AgentError> {
        match self {
            Self::Summary(s) => Ok(s),
            other => Err(other.mismatch(AgentRole::Researcher)),
        }
    }

    pub fn into_report(self) -> Result<ReportData, AgentError> {
        match self {
            Self::Report(r) => Ok(r),
            other => Err(other.mismatch(AgentRole::Writer)),
        }
    }

    pub fn into_receipt(self) -> Result<EmailReceipt, AgentError> {
        match self {
            Self::Email(r) => Ok(r),
            other => Err(other.mismatch(AgentRole::Emailer)),
        }
    }
}
