//! Access to the shared key-value store.
//!
//! The store is the single source of truth shared by the proxy, the curator
//! and the retraining job. It guarantees atomicity per key only; nothing here
//! caches reads or spans keys in a transaction.
//!
//! Two layers:
//!
//! - [`RecordStore`]: the raw hash/counter commands a backend must provide
//!   (Redis in production, [`MemoryStore`] for tests and embedding).
//! - [`RecordGateway`]: typed access in terms of [`CacheRecord`](crate::CacheRecord)
//!   fields and `stats:*` counters.

mod gateway;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use gateway::{DEFAULT_KEY_PATTERN, RecordGateway, Stat};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::Result;

/// Raw commands of a Redis-like hash/counter store.
///
/// Every method may fail with
/// [`StoreUnavailable`](crate::MuninnError::StoreUnavailable). Operations are
/// independent; callers must not assume atomicity across calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// All keys matching a glob pattern (`*`, `?`). No ordering guarantee.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// All fields of a hash as raw bytes. A missing key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>>;

    /// Set one hash field, creating the hash if needed.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Add `delta` to an integer hash field, returning the new value.
    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Expire `key` after `seconds`. Returns false if the key does not exist.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    /// Remove `key`. Returns false if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Read a scalar counter; a missing key reads as 0.
    async fn get_counter(&self, key: &str) -> Result<i64>;

    /// Add `delta` to a scalar counter, returning the new value.
    async fn increment_counter(&self, key: &str, delta: i64) -> Result<i64>;
}
