//! Web search tool backed by the Exa search API.
//!
//! Returns titles, URLs and a trimmed excerpt of each page so the researcher
//! agent can summarize without fetching pages itself.

use async_trait::async_trait;
use deepresearch_config::SearchConfig;
use deepresearch_core::error::ToolError;
use deepresearch_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

pub const TOOL_NAME: &str = "web_search";

/// Max characters of page text kept per result.
const EXCERPT_CHARS: usize = 2000;
const MAX_RESULTS: usize = 10;

pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    num_results: usize,
}

impl WebSearchTool {
    /// Build from configuration. `None` when no search key is configured.
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>, ToolError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::NotConfigured {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            num_results: config.num_results.clamp(1, MAX_RESULTS),
        }))
    }

    pub async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let request = ExaSearchRequest {
            query,
            num_results: num_results.clamp(1, MAX_RESULTS),
            search_type: "auto",
            contents: ExaContents {
                text: ExaTextConfig {
                    max_characters: EXCERPT_CHARS,
                },
            },
        };

        debug!(%query, num_results, "Searching the web");

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| failed(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP error {}", status.as_u16())));
        }

        let body: ExaSearchResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("error parsing response: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                url: r.url,
                excerpt: excerpt(r.text.as_deref().unwrap_or_default()),
            })
            .collect())
    }
}

/// One search result as shown to the model.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn render(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".into();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}\nURL: {}\n{}\n", i + 1, hit.title, hit.url, hit.excerpt);
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    #[serde(rename = "type")]
    search_type: &'a str,
    contents: ExaContents,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaContents {
    text: ExaTextConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextConfig {
    max_characters: usize,
}

#[derive(Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and page excerpts."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return",
                    "default": self.num_results
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let num_results = arguments["num_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(self.num_results);

        let hits = self.search(query, num_results).await?;

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: render(&hits),
            data: serde_json::to_value(&hits).ok(),
        })
    }
}
