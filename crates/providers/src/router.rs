//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;
use deepresearch_core::error::ProviderError;
use deepresearch_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;

/// Total attempts per request, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Build the configured provider, wrapped for retries.
///
/// Errors with `NotConfigured` when the backend needs a key that is missing.
pub fn build_from_config(
    config: &deepresearch_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.as_str();
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(name));

    let api_key = match (&config.api_key, name) {
        (Some(key), _) => key.clone(),
        // Local backends accept any key
        (None, "ollama" | "vllm" | "llamacpp") => name.to_string(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(format!(
                "provider '{name}' needs an API key: set OPENAI_API_KEY or DEEPRESEARCH_API_KEY"
            )));
        }
    };

    let provider = OpenAiCompatProvider::new(
        name,
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    Ok(Arc::new(RetryProvider::new(Arc::new(provider), MAX_ATTEMPTS)))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
