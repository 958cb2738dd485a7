//! Fail-safe policy around content intelligence.
//!
//! The curator never sees an intelligence error. [`GuardedIntelligence`]
//! bounds every call with a timeout and maps failures onto non-destructive
//! defaults:
//!
//! | Call | On failure |
//! |---|---|
//! | safety check | [`SafetyVerdict::Unknown`] (curator policy decides) |
//! | retention | [`DEFAULT_RETENTION`] (`keep`) |
//! | expiration | [`DEFAULT_TTL_SECONDS`] (3600) |
//!
//! Successful expiration predictions are clamped into
//! [`MIN_TTL_SECONDS`]..=[`MAX_TTL_SECONDS`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::ContentIntelligence;
use crate::telemetry;
use crate::types::{CacheRecord, RetentionAction, SafetyVerdict};
use crate::{MuninnError, Result};

/// Retention applied when classification fails.
pub const DEFAULT_RETENTION: RetentionAction = RetentionAction::Keep;

/// TTL applied when expiration prediction fails.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Shortest TTL a prediction may set.
pub const MIN_TTL_SECONDS: u64 = 60;

/// Longest TTL a prediction may set.
pub const MAX_TTL_SECONDS: u64 = 86_400;

/// Default bound on a single intelligence call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Clamp any raw prediction into the allowed TTL range.
pub fn clamp_ttl(raw: i64) -> u64 {
    raw.clamp(MIN_TTL_SECONDS as i64, MAX_TTL_SECONDS as i64) as u64
}

/// Infallible view of a [`ContentIntelligence`] implementation.
#[derive(Clone)]
pub struct GuardedIntelligence {
    inner: Arc<dyn ContentIntelligence>,
    call_timeout: Duration,
}

impl GuardedIntelligence {
    pub fn new(inner: Arc<dyn ContentIntelligence>) -> Self {
        Self::with_timeout(inner, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(inner: Arc<dyn ContentIntelligence>, call_timeout: Duration) -> Self {
        Self {
            inner,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub async fn is_safe(&self, text: &str) -> SafetyVerdict {
        match self.bounded("safety", self.inner.check_safety(text)).await {
            Ok(safe) => SafetyVerdict::from(safe),
            Err(e) => {
                fallback("safety", &e);
                SafetyVerdict::Unknown
            }
        }
    }

    pub async fn classify_retention(&self, record: &CacheRecord) -> RetentionAction {
        match self
            .bounded("retention", self.inner.classify_retention(record))
            .await
        {
            Ok(action) => action,
            Err(e) => {
                fallback("retention", &e);
                DEFAULT_RETENTION
            }
        }
    }

    /// Predicted TTL in seconds, always within the allowed range.
    pub async fn predict_expiration(&self, record: &CacheRecord) -> u64 {
        match self
            .bounded("expiration", self.inner.predict_expiration(record))
            .await
        {
            Ok(raw) => clamp_ttl(raw),
            Err(e) => {
                fallback("expiration", &e);
                DEFAULT_TTL_SECONDS
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(MuninnError::Timeout(self.call_timeout)),
        };
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::INTELLIGENCE_REQUESTS_TOTAL,
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        result
    }
}

fn fallback(operation: &'static str, error: &MuninnError) {
    metrics::counter!(telemetry::INTELLIGENCE_FALLBACKS_TOTAL, "operation" => operation)
        .increment(1);
    warn!(operation, error = %error, "intelligence call failed, applying fail-safe default");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_covers_whole_input_range() {
        assert_eq!(clamp_ttl(i64::MIN), MIN_TTL_SECONDS);
        assert_eq!(clamp_ttl(-1), 60);
        assert_eq!(clamp_ttl(0), 60);
        assert_eq!(clamp_ttl(59), 60);
        assert_eq!(clamp_ttl(60), 60);
        assert_eq!(clamp_ttl(7200), 7200);
        assert_eq!(clamp_ttl(86_400), 86_400);
        assert_eq!(clamp_ttl(120_000), 86_400);
        assert_eq!(clamp_ttl(i64::MAX), MAX_TTL_SECONDS);
    }

    #[test]
    fn defaults_are_non_destructive() {
        assert_eq!(DEFAULT_RETENTION, RetentionAction::Keep);
        assert_eq!(DEFAULT_TTL_SECONDS, 3600);
        assert!((MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&DEFAULT_TTL_SECONDS));
    }
}
