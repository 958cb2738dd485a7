//! Retry configuration, delay calculation, and the retrying decorator.
//!
//! [`RetryingIntelligence`] wraps any [`ContentIntelligence`] and retries
//! transient failures (rate limits, transport errors, 5xx, timeouts) with
//! exponential backoff. Permanent failures return immediately so the
//! fail-safe policy can apply its default without delay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::ContentIntelligence;
use crate::telemetry;
use crate::types::{CacheRecord, RetentionAction};
use crate::{MuninnError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use muninn::intelligence::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that makes a single attempt.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// `initial_delay * 2^attempt`, capped at `max_delay` (0-indexed attempt).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff delay, unless the server sent a `retry_after` hint.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Run `f` until it succeeds, fails permanently, or attempts run out.
pub(crate) async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < config.max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                        .increment(1);
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(MuninnError::EmptyResponse))
}

/// Decorator that retries transient intelligence failures.
pub struct RetryingIntelligence {
    inner: Arc<dyn ContentIntelligence>,
    config: RetryConfig,
}

impl RetryingIntelligence {
    pub fn new(inner: Arc<dyn ContentIntelligence>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ContentIntelligence for RetryingIntelligence {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check_safety(&self, text: &str) -> Result<bool> {
        with_retry(&self.config, "safety", || self.inner.check_safety(text)).await
    }

    async fn classify_retention(&self, record: &CacheRecord) -> Result<RetentionAction> {
        with_retry(&self.config, "retention", || {
            self.inner.classify_retention(record)
        })
        .await
    }

    async fn predict_expiration(&self, record: &CacheRecord) -> Result<i64> {
        with_retry(&self.config, "expiration", || {
            self.inner.predict_expiration(record)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(350));
    }

    #[test]
    fn retry_after_hint_wins() {
        let config = RetryConfig::new();
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn max_attempts_never_drops_below_one() {
        assert_eq!(RetryConfig::new().max_attempts(0).max_attempts, 1);
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
