//! Per-pass curation outcomes.

use serde::Serialize;

use crate::MuninnError;

/// Why a record was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The key vanished between enumeration and read.
    Missing,
    /// Deleted earlier in the same pass.
    AlreadyDeleted,
    /// The safety check flagged the URL.
    Unsafe,
    /// The safety check failed and policy says skip.
    SafetyUnknown,
}

/// Result of curating one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed {
        /// Content intelligence contributed to the decision.
        ai_assisted: bool,
        /// The record itself was removed (classified or superseded).
        deleted: bool,
    },
    Skipped(SkipReason),
}

/// A contained per-record failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub key: String,
    pub cause: String,
}

/// Aggregate outcome of one curation pass.
///
/// Built at pass start, folded into the metrics tracker, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationCycleResult {
    /// Keys enumerated at pass start.
    pub scanned_count: usize,
    /// Keys curated successfully, including deletions.
    pub processed_count: usize,
    /// Processed keys whose decision consulted content intelligence.
    pub ai_prediction_count: usize,
    /// Records removed, by classification or supersession.
    pub deleted_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<RecordError>,
}

impl CurationCycleResult {
    pub fn new(scanned_count: usize) -> Self {
        Self {
            scanned_count,
            ..Self::default()
        }
    }

    /// Fold one key's result into the pass totals.
    pub fn absorb(&mut self, key: &str, outcome: std::result::Result<RecordOutcome, MuninnError>) {
        match outcome {
            Ok(RecordOutcome::Processed {
                ai_assisted,
                deleted,
            }) => {
                self.processed_count += 1;
                if ai_assisted {
                    self.ai_prediction_count += 1;
                }
                if deleted {
                    self.deleted_count += 1;
                }
            }
            Ok(RecordOutcome::Skipped(_)) => self.skipped_count += 1,
            Err(e) => self.errors.push(RecordError {
                key: key.to_string(),
                cause: e.to_string(),
            }),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
