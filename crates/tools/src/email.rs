//! Report email tool backed by the Resend transactional API.
//!
//! Sends exactly one email per call to the configured recipient. Every
//! outcome, including bad arguments and missing credentials, comes back as an
//! [`EmailReceipt`] so the calling agent can react instead of the run failing.

use async_trait::async_trait;
use deepresearch_config::EmailConfig;
use deepresearch_core::error::ToolError;
use deepresearch_core::research::EmailReceipt;
use deepresearch_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const TOOL_NAME: &str = "send_email";

pub struct SendEmailTool {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    to: Option<String>,
    base_url: String,
}

impl SendEmailTool {
    pub fn from_config(config: &EmailConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::NotConfigured {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send one email. Never fails: errors are returned in the receipt.
    pub async fn send(&self, subject: &str, html_body: &str) -> EmailReceipt {
        let Some(api_key) = &self.api_key else {
            return EmailReceipt::Error {
                message: "RESEND_API_KEY is not set".into(),
            };
        };
        let Some(to) = &self.to else {
            return EmailReceipt::Error {
                message: "no recipient configured (email.to)".into(),
            };
        };

        let request = SendRequest {
            from: &self.from,
            to: [to.as_str()],
            subject,
            html: html_body,
        };

        let response = match self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Email request failed");
                return EmailReceipt::Error {
                    message: format!("request failed: {e}"),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), %message, "Email provider rejected the send");
            return EmailReceipt::Error {
                message: format!("HTTP {}: {message}", status.as_u16()),
            };
        }

        match response.json::<SendResponse>().await {
            Ok(sent) => {
                info!(id = %sent.id, %subject, "Report emailed");
                EmailReceipt::Success { id: sent.id }
            }
            Err(e) => EmailReceipt::Error {
                message: format!("unreadable provider response: {e}"),
            },
        }
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Send an email with the given subject and HTML body"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subject": {
                    "type": "string",
                    "description": "The email subject line"
                },
                "html_body": {
                    "type": "string",
                    "description": "The full email body as HTML"
                }
            },
            "required": ["subject", "html_body"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let subject = arguments["subject"].as_str().map(str::trim).unwrap_or_default();
        let html_body = arguments["html_body"].as_str().unwrap_or_default();

        let receipt = if subject.is_empty() || html_body.trim().is_empty() {
            EmailReceipt::Error {
                message: "both 'subject' and 'html_body' are required".into(),
            }
        } else {
            self.send(subject, html_body).await
        };

        let data = serde_json::to_value(&receipt).map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult {
            call_id: String::new(),
            success: receipt.is_success(),
            output: data.to_string(),
            data: Some(data),
        })
    }
}
