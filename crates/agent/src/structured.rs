//! Structured output helpers: schema generation and tolerant JSON parsing.

use crate::roles::AgentRole;
use deepresearch_core::error::AgentError;
use deepresearch_core::provider::ResponseFormat;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// The `response_format` contract for payload type `T`.
pub fn response_format<T: JsonSchema>() -> ResponseFormat {
    ResponseFormat {
        name: T::schema_name().into_owned(),
        schema: schemars::schema_for!(T).to_value(),
    }
}

/// Parse a model reply as `T`, tolerating a surrounding markdown code fence.
pub fn parse<T: DeserializeOwned>(role: AgentRole, text: &str) -> Result<T, AgentError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| AgentError::UnexpectedOutput {
        role: role.to_string(),
        reason: format!("invalid JSON: {e}"),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepresearch_core::research::{ClarifyingQuestions, SearchPlan};

    #[test]
    fn format_is_named_after_the_type() {
        let format = response_format::<SearchPlan>();
        assert_eq!(format.name, "SearchPlan");
        assert!(format.schema["properties"]["searches"].is_object());
    }

    #[test]
    fn parses_plain_json() {
        let q: ClarifyingQuestions =
            parse(AgentRole::Clarifier, r#"{"questions":["a","b","c","d"]}"#).unwrap();
        assert_eq!(q.questions.len(), 4);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"questions\":[\"a\"]}\n```";
        let q: ClarifyingQuestions = parse(AgentRole::Clarifier, text).unwrap();
        assert_eq!(q.questions, vec!["a"]);
    }

    #[test]
    fn malformed_json_names_the_role() {
        let err = parse::<SearchPlan>(AgentRole::Planner, "Sure! Here are some searches").unwrap_err();
        assert!(err.to_string().starts_with("planner returned output"));
    }
}
