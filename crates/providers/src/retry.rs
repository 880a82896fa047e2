//! Provider retry: re-issue a request after transient failures.
//!
//! Rate limits and network blips are common on long research runs with many
//! fan-out calls. Authentication and request errors are returned immediately.

use async_trait::async_trait;
use deepresearch_core::error::ProviderError;
use deepresearch_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wraps a provider and retries transient failures with backoff.
pub struct RetryProvider {
    inner: Arc<dyn deepresearch_core::Provider>,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryProvider {
    /// Retry up to `max_attempts` total attempts (1 = no retry).
    pub fn new(inner: Arc<dyn deepresearch_core::Provider>, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
        }
    }

    /// Override the backoff base delay (doubles per attempt).
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn is_transient(error: &ProviderError) -> bool {
        match error {
            ProviderError::RateLimited { .. }
            | ProviderError::Network(_)
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
        let delay = match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        };
        delay.min(self.max_delay)
    }
}

#[async_trait]
impl deepresearch_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.max_attempts && Self::is_transient(&e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retry: transient provider failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Retry: giving up");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepresearch_core::message::Message;
    use deepresearch_core::Provider;
    use std::sync::Mutex;

    /// Returns queued results in order.
    struct ScriptedProvider {
        results: Mutex<Vec<Result<String, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(mut results: Vec<Result<String, ProviderError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl deepresearch_core::Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let next = self
                .results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ProviderError::NotConfigured("exhausted".into())));
            next.map(|text| ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: "m".into(),
            })
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("m", vec![Message::user("hi")])
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_then_succeeds() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network("reset".into())),
            Err(ProviderError::RateLimited { retry_after_secs: 1 }),
            Ok("done".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), 3);

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.message.content, "done");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout("slow".into())),
            Err(ProviderError::Timeout("slow".into())),
            Ok("too late".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), 2);

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::AuthenticationFailed("bad key".into())),
            Ok("unreachable".into()),
        ]));
        let provider = RetryProvider::new(inner.clone(), 5);

        assert!(provider.complete(request()).await.is_err());
        assert_eq!(inner.calls(), 1);
        assert_eq!(provider.name(), "scripted");
    }

    #[test]
    fn delay_respects_retry_after_and_cap() {
        let inner = Arc::new(ScriptedProvider::new(vec![]));
        let provider = RetryProvider::new(inner, 3).with_base_delay(Duration::from_millis(100));

        let rate = ProviderError::RateLimited { retry_after_secs: 3 };
        assert_eq!(provider.delay_for(1, &rate), Duration::from_secs(3));

        let net = ProviderError::Network("x".into());
        assert_eq!(provider.delay_for(1, &net), Duration::from_millis(100));
        assert_eq!(provider.delay_for(3, &net), Duration::from_millis(400));

        let huge = ProviderError::RateLimited { retry_after_secs: 600 };
        assert_eq!(provider.delay_for(1, &huge), Duration::from_secs(20));
    }
}
