//! Retry, verdict-cache and fail-safe decorators around a mock intelligence.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use muninn::intelligence::{
    CachingIntelligence, ContentIntelligence, GuardedIntelligence, RetryConfig,
    RetryingIntelligence,
};
use muninn::{CacheRecord, MuninnError, Result, RetentionAction, SafetyVerdict};

/// Mock intelligence that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> MuninnError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> MuninnError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn attempt(&self) -> Result<()> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok(())
    }
}

#[async_trait]
impl ContentIntelligence for FailThenSucceed {
    fn name(&self) -> &str {
        "mock-retry"
    }

    async fn check_safety(&self, _text: &str) -> Result<bool> {
        self.attempt().map(|_| true)
    }

    async fn classify_retention(&self, _record: &CacheRecord) -> Result<RetentionAction> {
        self.attempt().map(|_| RetentionAction::Refresh)
    }

    async fn predict_expiration(&self, _record: &CacheRecord) -> Result<i64> {
        self.attempt().map(|_| 120)
    }
}

/// Never answers.
struct Stalled;

#[async_trait]
impl ContentIntelligence for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn check_safety(&self, _text: &str) -> Result<bool> {
        std::future::pending().await
    }

    async fn classify_retention(&self, _record: &CacheRecord) -> Result<RetentionAction> {
        std::future::pending().await
    }

    async fn predict_expiration(&self, _record: &CacheRecord) -> Result<i64> {
        std::future::pending().await
    }
}

fn record() -> CacheRecord {
    let fields: HashMap<String, String> = [("request_method", "GET"), ("request_url", "/a")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    CacheRecord::from_fields("proxy:a", &fields).unwrap()
}

fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(attempts)
        .initial_delay(Duration::from_millis(1))
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test]
async fn retries_transient_errors_until_success() {
    let mock = Arc::new(FailThenSucceed::new(2, || MuninnError::Timeout(
        Duration::from_secs(1),
    )));
    let retrying = RetryingIntelligence::new(mock.clone(), fast_retry(3));

    assert!(retrying.check_safety("/a").await.unwrap());
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let mock = Arc::new(FailThenSucceed::new(5, || MuninnError::Api {
        status: 502,
        message: "bad gateway".into(),
    }));
    let retrying = RetryingIntelligence::new(mock.clone(), fast_retry(3));

    let err = retrying.classify_retention(&record()).await.unwrap_err();
    assert!(matches!(err, MuninnError::Api { status: 502, .. }));
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let mock = Arc::new(FailThenSucceed::new(1, || {
        MuninnError::UnparseableResponse("no digits".into())
    }));
    let retrying = RetryingIntelligence::new(mock.clone(), fast_retry(3));

    assert!(retrying.predict_expiration(&record()).await.is_err());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_hint_sets_the_delay() {
    let mock = Arc::new(FailThenSucceed::new(1, || MuninnError::RateLimited {
        retry_after: Some(Duration::from_secs(9)),
    }));
    let retrying = RetryingIntelligence::new(mock.clone(), RetryConfig::new());

    let started = tokio::time::Instant::now();
    assert_eq!(retrying.predict_expiration(&record()).await.unwrap(), 120);
    assert!(started.elapsed() >= Duration::from_secs(9));
    assert_eq!(mock.call_count(), 2);
}

// ============================================================================
// Verdict cache
// ============================================================================

#[tokio::test]
async fn safety_verdicts_are_cached_per_text() {
    let mock = Arc::new(FailThenSucceed::new(0, || MuninnError::EmptyResponse));
    let caching = CachingIntelligence::new(mock.clone(), Duration::from_secs(60));

    assert!(caching.check_safety("/a").await.unwrap());
    assert!(caching.check_safety("/a").await.unwrap());
    assert_eq!(mock.call_count(), 1);

    assert!(caching.check_safety("/b").await.unwrap());
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn failed_checks_are_not_cached() {
    let mock = Arc::new(FailThenSucceed::new(1, || MuninnError::EmptyResponse));
    let caching = CachingIntelligence::new(mock.clone(), Duration::from_secs(60));

    assert!(caching.check_safety("/a").await.is_err());
    assert!(caching.check_safety("/a").await.unwrap());
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn clear_forgets_verdicts() {
    let mock = Arc::new(FailThenSucceed::new(0, || MuninnError::EmptyResponse));
    let caching = CachingIntelligence::new(mock.clone(), Duration::from_secs(60));

    caching.check_safety("/a").await.unwrap();
    caching.clear();
    caching.check_safety("/a").await.unwrap();
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn retention_is_never_cached() {
    let mock = Arc::new(FailThenSucceed::new(0, || MuninnError::EmptyResponse));
    let caching = CachingIntelligence::new(mock.clone(), Duration::from_secs(60));

    caching.classify_retention(&record()).await.unwrap();
    caching.classify_retention(&record()).await.unwrap();
    assert_eq!(mock.call_count(), 2);
}

// ============================================================================
// Fail-safe defaults
// ============================================================================

#[tokio::test]
async fn guard_applies_defaults_on_failure() {
    let mock = Arc::new(FailThenSucceed::new(3, || MuninnError::Http("refused".into())));
    let guarded = GuardedIntelligence::new(mock);

    assert_eq!(guarded.is_safe("/a").await, SafetyVerdict::Unknown);
    assert_eq!(
        guarded.classify_retention(&record()).await,
        RetentionAction::Keep
    );
    assert_eq!(guarded.predict_expiration(&record()).await, 3600);
}

#[tokio::test]
async fn guard_passes_successes_through() {
    let mock = Arc::new(FailThenSucceed::new(0, || MuninnError::EmptyResponse));
    let guarded = GuardedIntelligence::new(mock);

    assert_eq!(guarded.is_safe("/a").await, SafetyVerdict::Safe);
    assert_eq!(
        guarded.classify_retention(&record()).await,
        RetentionAction::Refresh
    );
    assert_eq!(guarded.predict_expiration(&record()).await, 120);
}

#[tokio::test(start_paused = true)]
async fn guard_times_out_stalled_calls() {
    let guarded = GuardedIntelligence::with_timeout(Arc::new(Stalled), Duration::from_secs(30));

    assert_eq!(guarded.is_safe("/a").await, SafetyVerdict::Unknown);
    assert_eq!(
        guarded.classify_retention(&record()).await,
        RetentionAction::Keep
    );
    assert_eq!(guarded.predict_expiration(&record()).await, 3600);
}

#[tokio::test]
async fn full_stack_recovers_from_one_transient_failure() {
    let mock = Arc::new(FailThenSucceed::new(1, || MuninnError::Timeout(
        Duration::from_secs(1),
    )));
    let retrying: Arc<dyn ContentIntelligence> =
        Arc::new(RetryingIntelligence::new(mock.clone(), fast_retry(2)));
    let guarded = GuardedIntelligence::new(Arc::new(CachingIntelligence::new(
        retrying,
        Duration::from_secs(60),
    )));

    assert_eq!(guarded.is_safe("/a").await, SafetyVerdict::Safe);
    assert_eq!(guarded.is_safe("/a").await, SafetyVerdict::Safe);
    assert_eq!(mock.call_count(), 2);
}
