//! Configuration loading, validation, and management for deepresearch.
//!
//! Loads configuration from `~/.deepresearch/config.toml` with environment
//! variable overrides. Validates all settings at startup; missing credentials
//! are reported by name so the operator knows which variable to set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deepresearch/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// AI invocation credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider name ("openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override for the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used by every agent role unless overridden in `[models]`
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout for a single provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Per-role model overrides
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("models", &self.models)
            .field("research", &self.research)
            .field("email", &self.email)
            .field("search", &self.search)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Model overrides keyed by agent role. `None` falls back to `AppConfig::model`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub researcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emailer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Upper bound on searches taken from the planner's output
    #[serde(default = "default_max_searches")]
    pub max_searches: usize,

    /// How many searches run at once
    #[serde(default = "default_search_concurrency")]
    pub search_concurrency: usize,

    /// Deadline for any single agent invocation
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Tool-call rounds a tool-using agent may take before giving up
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Email the finished report
    #[serde(default = "default_true")]
    pub send_email: bool,
}

fn default_max_searches() -> usize {
    5
}
fn default_search_concurrency() -> usize {
    3
}
fn default_step_timeout_secs() -> u64 {
    180
}
fn default_max_tool_iterations() -> usize {
    6
}
fn default_true() -> bool {
    true
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_searches: default_max_searches(),
            search_concurrency: default_search_concurrency(),
            step_timeout_secs: default_step_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
            send_email: true,
        }
    }
}

/// Transactional email (Resend) settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_email_from")]
    pub from: String,

    /// Fixed recipient of every report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(default = "default_email_base_url")]
    pub base_url: String,
}

fn default_email_from() -> String {
    "onboarding@resend.dev".into()
}
fn default_email_base_url() -> String {
    "https://api.resend.com".into()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from: default_email_from(),
            to: None,
            base_url: default_email_base_url(),
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &redact(&self.api_key))
            .field("from", &self.from)
            .field("to", &self.to)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Web search (Exa) settings. Without a key, researchers answer from the
/// model alone.
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_search_base_url() -> String {
    "https://api.exa.ai".into()
}
fn default_num_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
            num_results: default_num_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("num_results", &self.num_results)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Oldest sessions are evicted past this count
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_port() -> u16 {
    7860
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// A credential the current configuration needs but does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingCredential {
    /// Environment variable that supplies it
    pub var: &'static str,
    /// What it is used for
    pub purpose: &'static str,
}

impl AppConfig {
    /// Load configuration from the default path with env var overrides.
    ///
    /// Priority: env vars > config file > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `env` as the variable source.
    ///
    /// Credentials only fill gaps left by the file; the provider, model and
    /// recipient variables always win.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = env("DEEPRESEARCH_API_KEY").or_else(|| env("OPENAI_API_KEY"));
        }
        if let Some(provider) = env("DEEPRESEARCH_PROVIDER") {
            self.provider = provider;
        }
        if let Some(base_url) = env("DEEPRESEARCH_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(model) = env("DEEPRESEARCH_MODEL") {
            self.model = model;
        }

        if self.email.api_key.is_none() {
            self.email.api_key = env("RESEND_API_KEY");
        }
        if let Some(to) = env("DEEPRESEARCH_EMAIL_TO") {
            self.email.to = Some(to);
        }
        if let Some(send) = env("DEEPRESEARCH_SEND_EMAIL") {
            self.research.send_email = !matches!(send.as_str(), "0" | "false" | "no" | "off");
        }

        if self.search.api_key.is_none() {
            self.search.api_key = env("EXA_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepresearch")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let positive = [
            ("research.max_searches", self.research.max_searches),
            ("research.search_concurrency", self.research.search_concurrency),
            ("research.max_tool_iterations", self.research.max_tool_iterations),
            ("gateway.max_sessions", self.gateway.max_sessions),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if self.research.step_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("timeouts must be > 0".into()));
        }

        Ok(())
    }

    /// Credentials needed by the enabled features that are not set.
    pub fn missing_credentials(&self) -> Vec<MissingCredential> {
        let mut missing = Vec::new();
        if self.api_key.is_none() && self.provider != "ollama" {
            missing.push(MissingCredential {
                var: "OPENAI_API_KEY",
                purpose: "AI model invocation",
            });
        }
        if self.research.send_email {
            if self.email.api_key.is_none() {
                missing.push(MissingCredential {
                    var: "RESEND_API_KEY",
                    purpose: "emailing the report",
                });
            }
            if self.email.to.is_none() {
                missing.push(MissingCredential {
                    var: "DEEPRESEARCH_EMAIL_TO",
                    purpose: "the report recipient",
                });
            }
        }
        missing
    }

    /// Fail with the first missing credential, naming its variable.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        match self.missing_credentials().into_iter().next() {
            Some(MissingCredential { var, purpose }) => {
                Err(ConfigError::MissingCredential { var, purpose })
            }
            None => Ok(()),
        }
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            models: ModelsConfig::default(),
            research: ResearchConfig::default(),
            email: EmailConfig::default(),
            search: SearchConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing credential for {purpose}: set the {var} environment variable")]
    MissingCredential {
        var: &'static str,
        purpose: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.email.from, "onboarding@resend.dev");
        assert_eq!(config.research.max_searches, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.research.search_concurrency, config.research.search_concurrency);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.research.search_concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("research.search_concurrency"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "openai");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o"

[models]
writer = "o3-mini"

[research]
max_searches = 3
send_email = false
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.models.writer.as_deref(), Some("o3-mini"));
        assert!(config.models.planner.is_none());
        assert_eq!(config.research.max_searches, 3);
        assert_eq!(config.research.search_concurrency, 3);
        assert!(!config.research.send_email);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "temperature = \"hot\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_fill_credentials() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RESEND_API_KEY", "re_test"),
            ("DEEPRESEARCH_EMAIL_TO", "me@example.com"),
            ("DEEPRESEARCH_MODEL", "gpt-4o"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.email.api_key.as_deref(), Some("re_test"));
        assert_eq!(config.email.to.as_deref(), Some("me@example.com"));
        assert_eq!(config.model, "gpt-4o");
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(env_from(&[("OPENAI_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_ai_key_names_the_variable() {
        let config = AppConfig::default();
        let err = config.require_credentials().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn missing_email_key_only_matters_when_sending() {
        let mut config = AppConfig {
            api_key: Some("sk".into()),
            ..AppConfig::default()
        };
        let vars: Vec<_> = config.missing_credentials().iter().map(|m| m.var).collect();
        assert_eq!(vars, vec!["RESEND_API_KEY", "DEEPRESEARCH_EMAIL_TO"]);

        config.apply_env_overrides(env_from(&[("DEEPRESEARCH_SEND_EMAIL", "false")]));
        assert!(config.missing_credentials().is_empty());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.email.api_key = Some("re_secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("re_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("onboarding@resend.dev"));
    }
}
