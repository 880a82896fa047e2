//! Answer extraction and refined prompt construction.
//!
//! The presentation layer shows the user an answer template with one
//! `**A<n>:**` line per question. Whatever the user typed after each marker
//! becomes an answer; answers pair with questions by position.

use deepresearch_core::research::QuestionSet;
use std::fmt::{self, Write as _};

/// Placeholder for a question the user left blank.
pub const NOT_ANSWERED: &str = "(not answered)";

/// Extract non-empty answers from `**A<n>:** <answer>` lines, in source order.
pub fn extract_answers(text: &str) -> Vec<String> {
    text.lines().filter_map(answer_on_line).map(str::to_string).collect()
}

fn answer_on_line(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("**A")?;
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &rest[digits..];
    let answer = rest
        .strip_prefix(":**")
        .or_else(|| rest.strip_prefix("**:"))
        .or_else(|| rest.strip_prefix(':'))?
        .trim();
    (!answer.is_empty()).then_some(answer)
}

/// The markdown block that presents the questions to the user.
pub fn questions_markdown(questions: &QuestionSet) -> String {
    let mut md = String::from(
        "## 📝 Clarifying Questions\n\nPlease answer these questions to help refine the research:\n\n",
    );
    for (i, q) in questions.iter().enumerate() {
        let _ = writeln!(md, "{}. {q}", i + 1);
    }
    md
}

/// Pre-filled answer form: one `**Q<i>:**`/`**A<i>:**` pair per question.
pub fn answers_template(questions: &QuestionSet) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("**Q{n}:** {q}\n**A{n}:** ", n = i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The query plus every question and its answer, ready for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedPrompt(String);

impl RefinedPrompt {
    pub fn build(query: &str, questions: &QuestionSet, answers: &[String]) -> Self {
        let mut prompt = format!("Original Query: {query}\n\nClarifying Information:\n");
        for (i, q) in questions.iter().enumerate() {
            let answer = answers.get(i).map(String::as_str).unwrap_or(NOT_ANSWERED);
            let _ = write!(prompt, "\nQ{n}: {q}\nA{n}: {answer}\n", n = i + 1);
        }
        prompt.push_str("\n\nBased on the above query and clarifications, conduct comprehensive research.");
        Self(prompt)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RefinedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
