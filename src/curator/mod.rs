//! The curation pass.
//!
//! [`Curator::run_cycle`] walks a snapshot of the cache keys taken at pass
//! start and, for each key independently:
//!
//! 1. reads the record (vanished keys are skipped),
//! 2. checks the URL with the safety classifier (unsafe records are left
//!    untouched),
//! 3. classifies retention: delete the record, or mark it `refresh`/`keep`,
//! 4. retunes the TTL of single-use records idle past the threshold,
//! 5. for POSTs, deletes superseded same-URL records and marks related GETs
//!    for refresh,
//! 6. bumps the record's access counter and notifies the training sink.
//!
//! A failure on one key is recorded in the [`CurationCycleResult`] and the
//! pass moves on. Only store unavailability aborts the pass.

pub mod reconcile;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::intelligence::GuardedIntelligence;
use crate::scheduler::CurationCycle;
use crate::store::{DEFAULT_KEY_PATTERN, RecordGateway};
use crate::telemetry;
use crate::tracker::MetricsTracker;
use crate::training::{NoopTrainingSink, TrainingSink};
use crate::types::{
    CacheRecord, CurationCycleResult, Purpose, RecordField, RecordOutcome, RequestMethod,
    RetentionAction, SafetyVerdict, SkipReason,
};
use crate::{MuninnError, Result};

/// Default idle time after which a single-use record gets a predicted TTL.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(72 * 3600);

/// What to do when the safety classifier cannot give a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownSafetyPolicy {
    /// Leave the record untouched, as if it were unsafe.
    #[default]
    Skip,
    /// Curate the record as if it were safe.
    Proceed,
}

/// Curation policy knobs.
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// Store pattern enumerated each pass.
    pub key_pattern: String,
    /// Idle time past which a single-use record is retuned.
    pub idle_threshold: Duration,
    pub unknown_safety: UnknownSafetyPolicy,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            unknown_safety: UnknownSafetyPolicy::default(),
        }
    }
}

/// Keys and deletions of the pass in flight.
struct Pass {
    keys: Vec<String>,
    deleted: HashSet<String>,
    now: f64,
}

/// The decision engine.
pub struct Curator {
    gateway: RecordGateway,
    intelligence: GuardedIntelligence,
    tracker: MetricsTracker,
    sink: Arc<dyn TrainingSink>,
    config: CuratorConfig,
}

impl Curator {
    pub fn new(
        gateway: RecordGateway,
        intelligence: GuardedIntelligence,
        config: CuratorConfig,
    ) -> Self {
        Self {
            tracker: MetricsTracker::new(gateway.clone()),
            gateway,
            intelligence,
            sink: Arc::new(NoopTrainingSink),
            config,
        }
    }

    /// Notify `sink` of every record the curator finishes with.
    pub fn with_training_sink(mut self, sink: Arc<dyn TrainingSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tracker(&self) -> &MetricsTracker {
        &self.tracker
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Run one pass with the current wall-clock time.
    pub async fn run_cycle(&self) -> Result<CurationCycleResult> {
        self.run_cycle_at(unix_now()).await
    }

    /// Run one pass as of `now` (Unix seconds).
    pub async fn run_cycle_at(&self, now: f64) -> Result<CurationCycleResult> {
        let started = Instant::now();
        let outcome = self.sweep(now).await;
        metrics::histogram!(telemetry::CYCLE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(result) => {
                metrics::counter!(telemetry::CYCLES_TOTAL, "status" => "ok").increment(1);
                if let Err(e) = self.tracker.record_cycle(&result).await {
                    error!(error = %e, "failed to persist cycle counters");
                }
                Ok(result)
            }
            Err(e) => {
                metrics::counter!(telemetry::CYCLES_TOTAL, "status" => "error").increment(1);
                Err(e)
            }
        }
    }

    async fn sweep(&self, now: f64) -> Result<CurationCycleResult> {
        let keys = self.gateway.list_keys(&self.config.key_pattern).await?;
        info!(
            keys = keys.len(),
            backend = self.gateway.backend(),
            "curation cycle started"
        );

        let mut result = CurationCycleResult::new(keys.len());
        let mut pass = Pass {
            keys,
            deleted: HashSet::new(),
            now,
        };

        for idx in 0..pass.keys.len() {
            let key = pass.keys[idx].clone();
            match self.process_record(&key, &mut pass).await {
                Err(e) if e.is_systemic() => {
                    error!(key, error = %e, "store unavailable, aborting curation cycle");
                    return Err(e);
                }
                outcome => {
                    if let Err(e) = &outcome {
                        error!(key, error = %e, "error curating record");
                    }
                    result.absorb(&key, outcome);
                }
            }
        }
        // Supersession removes keys other than the one being processed.
        result.deleted_count = pass.deleted.len();

        info!(
            processed = result.processed_count,
            ai_predictions = result.ai_prediction_count,
            errors = result.errors.len(),
            "curation cycle finished"
        );
        Ok(result)
    }

    async fn process_record(&self, key: &str, pass: &mut Pass) -> Result<RecordOutcome> {
        if pass.deleted.contains(key) {
            return Ok(RecordOutcome::Skipped(SkipReason::AlreadyDeleted));
        }

        let record = match self.gateway.read_record(key).await {
            Ok(record) => record,
            Err(MuninnError::NotFound(_)) => {
                debug!(key, "record vanished before it could be read");
                return Ok(RecordOutcome::Skipped(SkipReason::Missing));
            }
            Err(e) => return Err(e),
        };

        match self.intelligence.is_safe(&record.url).await {
            SafetyVerdict::Safe => {}
            SafetyVerdict::Unsafe => {
                warn!(key, "record contains inappropriate content and will be ignored");
                return Ok(RecordOutcome::Skipped(SkipReason::Unsafe));
            }
            SafetyVerdict::Unknown => match self.config.unknown_safety {
                UnknownSafetyPolicy::Skip => {
                    warn!(key, "safety unknown, record left untouched");
                    return Ok(RecordOutcome::Skipped(SkipReason::SafetyUnknown));
                }
                UnknownSafetyPolicy::Proceed => {
                    debug!(key, "safety unknown, curating anyway");
                }
            },
        }

        let action = self.intelligence.classify_retention(&record).await;
        match action {
            RetentionAction::Delete => {
                info!(key, "record flagged for deletion");
                self.gateway.delete_record(key).await?;
                pass.deleted.insert(key.to_string());
                metrics::counter!(telemetry::RECORDS_DELETED_TOTAL, "reason" => "classified")
                    .increment(1);
                return Ok(RecordOutcome::Processed {
                    ai_assisted: true,
                    deleted: true,
                });
            }
            RetentionAction::Refresh => {
                info!(key, "record marked for refreshing");
                self.gateway.set_purpose(key, Purpose::Refresh).await?;
            }
            RetentionAction::Keep => {
                info!(key, "record will be kept");
                self.gateway.set_purpose(key, Purpose::Keep).await?;
            }
        }

        if record.is_stale_one_off(pass.now, self.config.idle_threshold) {
            let ttl_secs = self.intelligence.predict_expiration(&record).await;
            info!(key, ttl_secs, "setting predicted TTL");
            self.gateway.set_expiration(key, ttl_secs).await?;
        }

        if record.method == RequestMethod::Post {
            info!(key, url = %record.url, "POST request detected, reconciling");
            self.reconcile_post(&record, pass).await?;
            if pass.deleted.contains(key) {
                // Superseded by a newer record for the same URL.
                return Ok(RecordOutcome::Processed {
                    ai_assisted: true,
                    deleted: true,
                });
            }
        }

        self.gateway
            .increment_counter(key, RecordField::RequestCount, 1)
            .await?;
        self.sink.record_processed(&record).await;

        Ok(RecordOutcome::Processed {
            ai_assisted: true,
            deleted: false,
        })
    }

    /// Apply the reconciliation plan for `post` over the pass's keys as they
    /// stand in the store now.
    async fn reconcile_post(&self, post: &CacheRecord, pass: &mut Pass) -> Result<()> {
        let current = self.current_records(pass).await?;
        let plan = reconcile::plan(&post.url, &current);

        for key in &plan.superseded {
            info!(key, url = %post.url, "deleting older request");
            self.gateway.delete_record(key).await?;
            pass.deleted.insert(key.clone());
            metrics::counter!(telemetry::RECORDS_DELETED_TOTAL, "reason" => "superseded")
                .increment(1);
        }

        for key in &plan.refresh {
            info!(key, url = %post.url, "marking related GET request for refresh");
            self.gateway.set_purpose(key, Purpose::Refresh).await?;
        }
        Ok(())
    }

    /// Read every not-yet-deleted key of the pass. Records that vanished or
    /// no longer parse are left out of the view.
    async fn current_records(&self, pass: &Pass) -> Result<Vec<CacheRecord>> {
        let mut current = Vec::with_capacity(pass.keys.len());
        for key in pass.keys.iter().filter(|k| !pass.deleted.contains(*k)) {
            match self.gateway.read_record(key).await {
                Ok(record) => current.push(record),
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => debug!(key, error = %e, "record left out of reconciliation view"),
            }
        }
        Ok(current)
    }
}

#[async_trait]
impl CurationCycle for Curator {
    async fn run_cycle(&self) -> Result<CurationCycleResult> {
        Curator::run_cycle(self).await
    }
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
