//! Agent tools for deepresearch.
//!
//! - [`web_search`]: Exa-backed search used by researcher agents.
//! - [`email`]: Resend-backed report delivery used by the emailer agent.

pub mod email;
pub mod web_search;

use deepresearch_config::AppConfig;
use deepresearch_core::error::ToolError;
use deepresearch_core::tool::ToolRegistry;
use tracing::warn;

pub use email::SendEmailTool;
pub use web_search::{SearchHit, WebSearchTool};

/// Tools available to researcher agents.
///
/// Empty when no search key is configured; researchers then summarize from
/// model knowledge alone.
pub fn research_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    match WebSearchTool::from_config(&config.search)? {
        Some(tool) => registry.register(Box::new(tool)),
        None => warn!("EXA_API_KEY not set; researchers will run without web search"),
    }
    Ok(registry)
}

/// Tools available to the emailer agent.
pub fn email_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SendEmailTool::from_config(&config.email)?));
    Ok(registry)
}
