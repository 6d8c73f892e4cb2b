//! Retrying wrapper around a single provider transport.
//!
//! [`ResilientClient::call`] never fails: transient errors are retried with
//! exponential backoff and an exhausted budget resolves to an empty string.
//! Rate-limit responses (HTTP 429) back off one doubling further than other
//! failures.

use crate::error::FacetLensError;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const FACET_MAX_TOKENS: u32 = 4_096;
pub const SYNTHESIS_MAX_TOKENS: u32 = 8_192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub content: String,
    pub max_tokens: u32,
}

/// One HTTP round trip to a provider. Errors carry the response status when
/// the provider returned one.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    fn label(&self) -> &'static str;
    async fn send(&self, request: &ModelRequest) -> Result<String, FacetLensError>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following a failed `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let exponent = if rate_limited { attempt + 1 } else { attempt };
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
    }
}

/// What the analysis pipeline needs from a model: text in, text out, never
/// an error.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn default_model(&self) -> &str;
    async fn call(&self, model: &str, system: &str, content: &str, max_tokens: u32) -> String;
}

pub struct ResilientClient {
    transport: Box<dyn ModelTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
    model: String,
}

impl ResilientClient {
    pub fn new(transport: Box<dyn ModelTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            sleeper: Box::new(TokioSleeper),
            policy: RetryPolicy::default(),
            model: model.into(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider_label(&self) -> &'static str {
        self.transport.label()
    }
}

#[async_trait]
impl LanguageModel for ResilientClient {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn call(&self, model: &str, system: &str, content: &str, max_tokens: u32) -> String {
        let request = ModelRequest {
            model: model.to_string(),
            system: system.to_string(),
            content: content.to_string(),
            max_tokens,
        };

        for attempt in 0..self.policy.max_attempts {
            let err = match self.transport.send(&request).await {
                Ok(text) => return text,
                Err(err) => err,
            };

            if attempt + 1 >= self.policy.max_attempts {
                tracing::warn!(
                    provider = self.transport.label(),
                    attempts = self.policy.max_attempts,
                    error = %err,
                    "model call exhausted retries"
                );
                return String::new();
            }

            let delay = self.policy.delay_for(attempt, err.is_rate_limit());
            tracing::debug!(
                provider = self.transport.label(),
                attempt,
                status = ?err.status(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "model call failed, backing off"
            );
            self.sleeper.sleep(delay).await;
        }

        String::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{
        LanguageModel, ModelRequest, ModelTransport, ResilientClient, RetryPolicy, Sleeper,
    };
    use crate::error::FacetLensError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Replays a fixed script of results, then keeps failing.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, FacetLensError>>>,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<String, FacetLensError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ModelTransport for ScriptedTransport {
        fn label(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, _request: &ModelRequest) -> Result<String, FacetLensError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| Err(FacetLensError::provider(None, "script exhausted")))
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) delays: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().expect("delay lock").push(delay);
        }
    }

    fn client(script: Vec<Result<String, FacetLensError>>) -> (ResilientClient, RecordingSleeper, Arc<AtomicUsize>) {
        let transport = ScriptedTransport::new(script);
        let calls = transport.calls.clone();
        let sleeper = RecordingSleeper::default();
        let client = ResilientClient::new(Box::new(transport), "test-model")
            .with_sleeper(Box::new(sleeper.clone()));
        (client, sleeper, calls)
    }

    #[test]
    fn delay_policy_doubles_with_extra_step_for_rate_limits() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
        };
        assert_eq!(policy.delay_for(0, false), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1, false), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(0, true), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(1, true), Duration::from_millis(4_000));
    }

    #[tokio::test]
    async fn success_on_first_attempt_does_not_sleep() {
        let (client, sleeper, calls) = client(vec![Ok("hello".to_string())]);
        let text = client.call("test-model", "sys", "user", 16).await;
        assert_eq!(text, "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().expect("delays").is_empty());
    }

    #[tokio::test]
    async fn rate_limit_then_generic_failure_waits_two_base_delays_each() {
        let (client, sleeper, calls) = client(vec![
            Err(FacetLensError::provider(Some(429), "rate limited")),
            Err(FacetLensError::provider(Some(500), "server error")),
            Ok("recovered".to_string()),
        ]);
        let text = client.call("test-model", "sys", "user", 16).await;
        assert_eq!(text, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.delays.lock().expect("delays"),
            vec![Duration::from_millis(2_000), Duration::from_millis(2_000)]
        );
    }

    #[tokio::test]
    async fn missing_status_is_treated_as_generic_failure() {
        let (client, sleeper, _) = client(vec![
            Err(FacetLensError::provider(None, "connection reset")),
            Ok("ok".to_string()),
        ]);
        assert_eq!(client.call("m", "s", "c", 16).await, "ok");
        assert_eq!(
            *sleeper.delays.lock().expect("delays"),
            vec![Duration::from_millis(1_000)]
        );
    }

    #[tokio::test]
    async fn exhausted_retries_resolve_to_empty_text() {
        let (client, sleeper, calls) = client(vec![
            Err(FacetLensError::provider(Some(503), "down")),
            Err(FacetLensError::provider(Some(503), "down")),
            Err(FacetLensError::provider(Some(503), "down")),
        ]);
        assert_eq!(client.call("m", "s", "c", 16).await, "");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No wait after the final attempt.
        assert_eq!(sleeper.delays.lock().expect("delays").len(), 2);
    }
}
