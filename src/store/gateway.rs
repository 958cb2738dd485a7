//! Typed record and counter access over a [`RecordStore`].

use std::sync::Arc;

use super::RecordStore;
use crate::types::{CacheRecord, Purpose, RecordField};
use crate::{MuninnError, Result};

/// Key namespace the proxy writes cache records under.
pub const DEFAULT_KEY_PATTERN: &str = "proxy:*";

/// Persistent effectiveness counters in the `stats:*` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    TotalRequests,
    CacheHits,
    CacheMisses,
    AiPredictions,
}

impl Stat {
    pub fn key(self) -> &'static str {
        match self {
            Stat::TotalRequests => "stats:total_requests",
            Stat::CacheHits => "stats:cache_hits",
            Stat::CacheMisses => "stats:cache_misses",
            Stat::AiPredictions => "stats:ai_predictions",
        }
    }
}

/// Pass-through typed access to the shared store.
///
/// Holds no data of its own: every read reflects the store at call time.
#[derive(Clone)]
pub struct RecordGateway {
    store: Arc<dyn RecordStore>,
}

impl RecordGateway {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Name of the underlying backend.
    pub fn backend(&self) -> &str {
        self.store.name()
    }

    pub async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.store.keys(pattern).await
    }

    /// Read and parse a record.
    ///
    /// Fails with [`MuninnError::NotFound`] when the key no longer exists.
    pub async fn read_record(&self, key: &str) -> Result<CacheRecord> {
        let fields = self.store.hash_get_all(key).await?;
        if fields.is_empty() {
            return Err(MuninnError::NotFound(key.to_string()));
        }
        CacheRecord::from_fields(key, &fields)
    }

    pub async fn write_field(&self, key: &str, field: RecordField, value: &str) -> Result<()> {
        self.store.hash_set(key, field.as_str(), value).await
    }

    pub async fn set_purpose(&self, key: &str, purpose: Purpose) -> Result<()> {
        self.write_field(key, RecordField::Purpose, purpose.as_str())
            .await
    }

    pub async fn increment_counter(&self, key: &str, field: RecordField, delta: i64) -> Result<i64> {
        self.store.hash_increment(key, field.as_str(), delta).await
    }

    /// Returns false if the key vanished before the TTL could be applied.
    pub async fn set_expiration(&self, key: &str, seconds: u64) -> Result<bool> {
        self.store.expire(key, seconds).await
    }

    /// Returns false if the key was already gone.
    pub async fn delete_record(&self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }

    pub async fn read_stat(&self, stat: Stat) -> Result<u64> {
        let value = self.store.get_counter(stat.key()).await?;
        Ok(u64::try_from(value).unwrap_or(0))
    }

    pub async fn increment_stat(&self, stat: Stat, delta: u64) -> Result<u64> {
        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        let value = self.store.increment_counter(stat.key(), delta).await?;
        Ok(u64::try_from(value).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::RequestMethod;

    fn gateway_with(store: Arc<MemoryStore>) -> RecordGateway {
        RecordGateway::new(store)
    }

    #[tokio::test]
    async fn read_record_parses_fields() {
        let store = Arc::new(MemoryStore::new());
        store.insert_hash(
            "proxy:/post",
            &[
                ("request_method", "POST"),
                ("request_url", "/post"),
                ("request_count", "4"),
            ],
        );
        let gateway = gateway_with(store);
        let record = gateway.read_record("proxy:/post").await.unwrap();
        assert_eq!(record.method, RequestMethod::Post);
        assert_eq!(record.request_count, 4);
    }

    #[tokio::test]
    async fn vanished_key_is_not_found() {
        let gateway = gateway_with(Arc::new(MemoryStore::new()));
        let err = gateway.read_record("proxy:gone").await.unwrap_err();
        assert!(matches!(err, MuninnError::NotFound(key) if key == "proxy:gone"));
    }

    #[tokio::test]
    async fn purpose_and_counter_writes_land_in_hash() {
        let store = Arc::new(MemoryStore::new());
        store.insert_hash("proxy:a", &[("request_method", "GET"), ("request_url", "/a")]);
        let gateway = gateway_with(store.clone());

        gateway.set_purpose("proxy:a", Purpose::Refresh).await.unwrap();
        gateway
            .increment_counter("proxy:a", RecordField::RequestCount, 1)
            .await
            .unwrap();

        assert_eq!(store.field("proxy:a", "purpose").as_deref(), Some("refresh"));
        assert_eq!(store.field("proxy:a", "request_count").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn stats_live_under_stats_namespace() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway_with(store.clone());
        gateway.increment_stat(Stat::AiPredictions, 7).await.unwrap();
        assert_eq!(gateway.read_stat(Stat::AiPredictions).await.unwrap(), 7);
        assert!(store.contains("stats:ai_predictions"));
        assert_eq!(gateway.read_stat(Stat::CacheHits).await.unwrap(), 0);
    }
}
