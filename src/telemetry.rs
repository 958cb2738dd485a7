//! Telemetry metric name constants.
//!
//! Centralised metric names for curation. Consumers install their own
//! `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! These are process-level signals. The persistent `stats:*` counters the
//! proxy reads live in the record store and are maintained by
//! [`MetricsTracker`](crate::tracker::MetricsTracker).
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation` — intelligence capability ("safety", "retention", "expiration")
//! - `status` — outcome: "ok" or "error"
//! - `reason` — why a record was deleted ("classified" or "superseded")

/// Completed curation passes.
///
/// Labels: `status` ("ok" | "error").
pub const CYCLES_TOTAL: &str = "muninn_cycles_total";

/// Wall-clock duration of a curation pass in seconds.
pub const CYCLE_DURATION_SECONDS: &str = "muninn_cycle_duration_seconds";

/// Records successfully curated.
pub const RECORDS_PROCESSED_TOTAL: &str = "muninn_records_processed_total";

/// Records whose processing failed and was contained.
pub const RECORD_ERRORS_TOTAL: &str = "muninn_record_errors_total";

/// Records removed from the store.
///
/// Labels: `reason` ("classified" | "superseded").
pub const RECORDS_DELETED_TOTAL: &str = "muninn_records_deleted_total";

/// Intelligence calls issued.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const INTELLIGENCE_REQUESTS_TOTAL: &str = "muninn_intelligence_requests_total";

/// Fail-safe defaults applied after an intelligence failure.
///
/// Labels: `operation`.
pub const INTELLIGENCE_FALLBACKS_TOTAL: &str = "muninn_intelligence_fallbacks_total";

/// Retry attempts (not counting the initial call).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "muninn_retries_total";

/// Safety verdicts served from the verdict cache.
pub const SAFETY_CACHE_HITS_TOTAL: &str = "muninn_safety_cache_hits_total";

/// Safety verdicts that had to be computed.
pub const SAFETY_CACHE_MISSES_TOTAL: &str = "muninn_safety_cache_misses_total";
