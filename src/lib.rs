//! Muninn - background curation for an LLM-assisted HTTP cache
//!
//! A caching proxy stores every request/response pair it serves as a hash
//! under `proxy:*` in a shared key-value store. Muninn walks that inventory
//! on a fixed cadence and, per record, asks a content-intelligence model
//! whether to delete it, mark it for refresh or keep it, retunes the TTL of
//! stale one-off entries, and reconciles cached GETs after a POST to the
//! same resource.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use muninn::curator::{Curator, CuratorConfig};
//! use muninn::intelligence::{ChatIntelligence, GuardedIntelligence};
//! use muninn::store::{MemoryStore, RecordGateway};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let gateway = RecordGateway::new(Arc::new(MemoryStore::new()));
//!     let model = ChatIntelligence::new(
//!         "http://localhost:11434",
//!         "llama3.2:1b",
//!         "llama-guard3:1b",
//!         Duration::from_secs(60),
//!     )?;
//!     let curator = Curator::new(
//!         gateway,
//!         GuardedIntelligence::new(Arc::new(model)),
//!         CuratorConfig::default(),
//!     );
//!
//!     let result = curator.run_cycle().await?;
//!     println!("processed {} records", result.processed_count);
//!     Ok(())
//! }
//! ```

#[cfg(feature = "daemon")]
pub mod config;
pub mod curator;
pub mod error;
pub mod intelligence;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod tracker;
pub mod training;
pub mod types;
mod version;

// Re-export main types at crate root
pub use error::{MuninnError, Result};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};

pub use curator::{Curator, CuratorConfig, UnknownSafetyPolicy};
pub use intelligence::{ContentIntelligence, GuardedIntelligence};
pub use scheduler::{CurationCycle, CurationScheduler, SchedulerConfig, SchedulerState};
pub use store::{MemoryStore, RecordGateway, RecordStore};
pub use tracker::MetricsTracker;

pub use types::{
    CacheRecord, CurationCycleResult, PerformanceSnapshot, Purpose, RecordError, RecordField,
    RecordOutcome, RequestMethod, RetentionAction, SafetyVerdict, SkipReason,
};
