//! Content intelligence: safety, retention, and expiration calls.
//!
//! [`ContentIntelligence`] is the raw capability boundary; implementations
//! may be slow and may fail. Decorators stack on top of it:
//!
//! ```text
//! GuardedIntelligence            <- timeouts + fail-safe defaults (what the curator calls)
//!   └── CachingIntelligence      <- safety verdict cache
//!         └── RetryingIntelligence  <- backoff on transient errors
//!               └── ChatIntelligence   <- HTTP chat completions
//! ```

pub mod cache;
pub mod client;
pub mod policy;
pub mod prompt;
pub mod retry;

pub use cache::CachingIntelligence;
pub use client::ChatIntelligence;
pub use policy::{
    DEFAULT_RETENTION, DEFAULT_TTL_SECONDS, GuardedIntelligence, MAX_TTL_SECONDS, MIN_TTL_SECONDS,
    clamp_ttl,
};
pub use retry::{RetryConfig, RetryingIntelligence};

use async_trait::async_trait;

use crate::Result;
use crate::types::{CacheRecord, RetentionAction};

/// Text classification and prediction capability used by the curator.
///
/// Implementations report failures as errors; fail-safe defaults are applied
/// by [`GuardedIntelligence`], not here.
#[async_trait]
pub trait ContentIntelligence: Send + Sync {
    /// Implementation name for logging.
    fn name(&self) -> &str;

    /// `false` if the text is judged inappropriate.
    async fn check_safety(&self, text: &str) -> Result<bool>;

    /// Recommend what to do with a record, from its method, URL, headers,
    /// response size, access count and recency.
    async fn classify_retention(&self, record: &CacheRecord) -> Result<RetentionAction>;

    /// Raw TTL prediction in seconds. May be out of range; callers clamp.
    async fn predict_expiration(&self, record: &CacheRecord) -> Result<i64>;
}
