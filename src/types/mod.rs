//! Public types for the Muninn API.

mod cycle;
mod decision;
mod record;
mod snapshot;

pub use cycle::{CurationCycleResult, RecordError, RecordOutcome, SkipReason};
pub use decision::{RetentionAction, SafetyVerdict};
pub use record::{CacheRecord, Purpose, RecordField, RequestMethod};
pub use snapshot::{PerformanceSnapshot, hit_rate};
