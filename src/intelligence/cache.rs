//! Verdict cache for safety checks.
//!
//! A cache record's URL rarely changes between passes, and a pass runs every
//! few minutes, so the guard model would otherwise re-judge the same text
//! over and over. [`CachingIntelligence`] memoises successful safety
//! verdicts keyed on the checked text, with a TTL so a retrained guard model
//! eventually gets a fresh say.
//!
//! Retention and expiration calls pass straight through: their inputs
//! include access counts and recency, which change every pass.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::ContentIntelligence;
use crate::Result;
use crate::telemetry;
use crate::types::{CacheRecord, RetentionAction};

/// Default number of cached verdicts.
pub const DEFAULT_VERDICT_CAPACITY: u64 = 10_000;

/// Decorator that caches safety verdicts.
pub struct CachingIntelligence {
    inner: Arc<dyn ContentIntelligence>,
    verdicts: Cache<String, bool>,
}

impl CachingIntelligence {
    pub fn new(inner: Arc<dyn ContentIntelligence>, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_VERDICT_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn ContentIntelligence>, ttl: Duration, capacity: u64) -> Self {
        let verdicts = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, verdicts }
    }

    /// Drop all cached verdicts.
    pub fn clear(&self) {
        self.verdicts.invalidate_all();
    }
}

#[async_trait]
impl ContentIntelligence for CachingIntelligence {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check_safety(&self, text: &str) -> Result<bool> {
        if let Some(safe) = self.verdicts.get(text).await {
            metrics::counter!(telemetry::SAFETY_CACHE_HITS_TOTAL).increment(1);
            return Ok(safe);
        }
        metrics::counter!(telemetry::SAFETY_CACHE_MISSES_TOTAL).increment(1);

        // Errors are not cached: the next pass asks again.
        let safe = self.inner.check_safety(text).await?;
        self.verdicts.insert(text.to_string(), safe).await;
        Ok(safe)
    }

    async fn classify_retention(&self, record: &CacheRecord) -> Result<RetentionAction> {
        self.inner.classify_retention(record).await
    }

    async fn predict_expiration(&self, record: &CacheRecord) -> Result<i64> {
        self.inner.predict_expiration(record).await
    }
}
