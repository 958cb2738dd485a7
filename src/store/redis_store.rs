//! Redis-backed [`RecordStore`].
//!
//! Uses a multiplexed [`ConnectionManager`], which reconnects on its own
//! after transient failures. Every Redis error surfaces as
//! [`StoreUnavailable`](MuninnError::StoreUnavailable) except `WRONGTYPE`
//! and reply decoding failures, which are properties of one key rather than
//! of the store. Hash values are read as bytes; the proxy stores response
//! bodies verbatim.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RecordStore;
use crate::{MuninnError, Result};

/// Record store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| MuninnError::Configuration(format!("invalid redis URL: {e}")))?;
        let conn = ConnectionManager::new(client).await?;
        info!(url = %redact(url), "connected to redis");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

/// Map a command error for `key`, keeping per-key type errors contained.
fn keyed(key: &str) -> impl FnOnce(redis::RedisError) -> MuninnError + '_ {
    move |err| {
        if err.code() == Some("WRONGTYPE") || err.kind() == redis::ErrorKind::TypeError {
            MuninnError::MalformedRecord {
                key: key.to_string(),
                reason: err.to_string(),
            }
        } else {
            MuninnError::StoreUnavailable(err.to_string())
        }
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.conn().keys(pattern).await?)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        self.conn().hgetall(key).await.map_err(keyed(key))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.conn()
            .hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(keyed(key))
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.conn()
            .hincr(key, field, delta)
            .await
            .map_err(keyed(key))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.conn().expire(key, seconds).await.map_err(keyed(key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: u64 = self.conn().del(key).await.map_err(keyed(key))?;
        Ok(removed > 0)
    }

    async fn get_counter(&self, key: &str) -> Result<i64> {
        let value: Option<i64> = self.conn().get(key).await.map_err(keyed(key))?;
        Ok(value.unwrap_or(0))
    }

    async fn increment_counter(&self, key: &str, delta: i64) -> Result<i64> {
        self.conn().incr(key, delta).await.map_err(keyed(key))
    }
}
