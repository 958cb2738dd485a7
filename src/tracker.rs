//! Persistent cache-effectiveness counters.
//!
//! The proxy increments `stats:total_requests`, `stats:cache_hits` and
//! `stats:cache_misses`; the curator adds `stats:ai_predictions`. All four
//! live in the shared store so every process sees the same totals.

use chrono::Utc;
use tracing::{error, info};

use crate::store::{RecordGateway, Stat};
use crate::telemetry;
use crate::types::{CurationCycleResult, PerformanceSnapshot};
use crate::Result;

/// Reads and updates the `stats:*` counters.
#[derive(Clone)]
pub struct MetricsTracker {
    gateway: RecordGateway,
}

impl MetricsTracker {
    pub fn new(gateway: RecordGateway) -> Self {
        Self { gateway }
    }

    /// Add `count` AI-assisted decisions to the persistent counter.
    pub async fn record_ai_predictions(&self, count: u64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.gateway.increment_stat(Stat::AiPredictions, count).await?;
        Ok(())
    }

    /// Fold a finished pass into the counters and process telemetry.
    pub async fn record_cycle(&self, result: &CurationCycleResult) -> Result<()> {
        metrics::counter!(telemetry::RECORDS_PROCESSED_TOTAL)
            .increment(result.processed_count as u64);
        metrics::counter!(telemetry::RECORD_ERRORS_TOTAL).increment(result.errors.len() as u64);

        self.record_ai_predictions(result.ai_prediction_count as u64)
            .await?;
        info!(
            processed = result.processed_count,
            ai_predictions = result.ai_prediction_count,
            deleted = result.deleted_count,
            skipped = result.skipped_count,
            errors = result.errors.len(),
            "curation cycle recorded"
        );
        Ok(())
    }

    /// Current counters. Never fails: read errors yield a zeroed snapshot.
    pub async fn snapshot(&self) -> PerformanceSnapshot {
        match self.read_counters().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "failed to read performance counters");
                PerformanceSnapshot::empty(Utc::now())
            }
        }
    }

    async fn read_counters(&self) -> Result<PerformanceSnapshot> {
        Ok(PerformanceSnapshot::new(
            self.gateway.read_stat(Stat::TotalRequests).await?,
            self.gateway.read_stat(Stat::CacheHits).await?,
            self.gateway.read_stat(Stat::CacheMisses).await?,
            self.gateway.read_stat(Stat::AiPredictions).await?,
            Utc::now(),
        ))
    }
}
