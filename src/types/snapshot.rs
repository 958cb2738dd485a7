//! Point-in-time view of the persistent cache counters.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cache effectiveness counters read from the `stats:*` namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `cache_hits / total_requests`, or 0 when no requests were recorded.
    pub cache_hit_rate: f64,
    pub ai_predictions: u64,
    pub timestamp: DateTime<Utc>,
}

impl PerformanceSnapshot {
    pub fn new(
        total_requests: u64,
        cache_hits: u64,
        cache_misses: u64,
        ai_predictions: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            total_requests,
            cache_hits,
            cache_misses,
            cache_hit_rate: hit_rate(cache_hits, total_requests),
            ai_predictions,
            timestamp,
        }
    }

    /// All-zero snapshot, returned when the counters cannot be read.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self::new(0, 0, 0, 0, timestamp)
    }
}

/// Hit ratio, defined as 0 for an empty denominator.
pub fn hit_rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
