//! Fixed-cadence driver for curation passes.
//!
//! Two states:
//!
//! ```text
//!            cycle returned (even with per-record errors)
//!          ┌────────────────────────┐
//!          ▼                        │ wait `interval`
//!      Running ──── cycle failed ──▶ Backoff
//!          ▲                        │
//!          └──── wait `backoff` ────┘
//! ```
//!
//! Shutdown is observed at loop boundaries and interrupts any wait. A cycle
//! in flight is never cancelled by the scheduler; the process bounds it with
//! a grace period instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use crate::Result;
use crate::types::CurationCycleResult;

/// Default pause between successful passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Default pause after a failed pass.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

/// One curation pass. Implemented by [`Curator`](crate::curator::Curator).
#[async_trait]
pub trait CurationCycle: Send + Sync {
    /// `Err` means the pass as a whole failed (e.g. store unreachable).
    async fn run_cycle(&self) -> Result<CurationCycleResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Backoff,
}

/// State after a pass with the given outcome.
pub fn next_state(outcome: &Result<CurationCycleResult>) -> SchedulerState {
    match outcome {
        Ok(_) => SchedulerState::Running,
        Err(_) => SchedulerState::Backoff,
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl SchedulerConfig {
    /// How long to wait in `state` before the next pass.
    pub fn wait_for(&self, state: SchedulerState) -> Duration {
        match state {
            SchedulerState::Running => self.interval,
            SchedulerState::Backoff => self.backoff,
        }
    }
}

/// Totals reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
}

pub struct CurationScheduler {
    cycle: Arc<dyn CurationCycle>,
    config: SchedulerConfig,
}

impl CurationScheduler {
    pub fn new(cycle: Arc<dyn CurationCycle>, config: SchedulerConfig) -> Self {
        Self { cycle, config }
    }

    /// Run passes until `shutdown` becomes true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        info!(
            interval_secs = self.config.interval.as_secs(),
            backoff_secs = self.config.backoff.as_secs(),
            "curation scheduler started"
        );

        while !*shutdown.borrow() {
            let outcome = self.cycle.run_cycle().await;
            let state = next_state(&outcome);
            match outcome {
                Ok(result) => {
                    report.cycles_succeeded += 1;
                    info!(
                        processed = result.processed_count,
                        errors = result.errors.len(),
                        "curation cycle succeeded"
                    );
                }
                Err(e) => {
                    report.cycles_failed += 1;
                    error!(
                        error = %e,
                        retry_in_secs = self.config.backoff.as_secs(),
                        "curation cycle failed, backing off"
                    );
                }
            }

            // After either wait the scheduler is back in `Running`.
            if wait_or_shutdown(&mut shutdown, self.config.wait_for(state)).await {
                break;
            }
        }

        info!(
            succeeded = report.cycles_succeeded,
            failed = report.cycles_failed,
            "curation scheduler stopped"
        );
        report
    }
}

/// Sleep for `delay`. Returns true early if shutdown was requested.
pub(crate) async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
