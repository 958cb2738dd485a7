//! In-process [`RecordStore`] backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::RecordStore;
use crate::{MuninnError, Result};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, Vec<u8>>),
    Counter(i64),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Option<(u64, Instant)>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.ttl
            .is_some_and(|(secs, set_at)| now.duration_since(set_at) >= Duration::from_secs(secs))
    }
}

/// Thread-safe in-memory store with Redis-like hash and counter semantics.
///
/// Expirations are enforced lazily on access. Used by the test suite and by
/// consumers that embed the curator without an external store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a hash from field/value pairs.
    pub fn insert_hash(&self, key: &str, fields: &[(&str, &str)]) {
        let fields: Vec<(&str, &[u8])> = fields.iter().map(|(f, v)| (*f, v.as_bytes())).collect();
        self.insert_raw_hash(key, &fields);
    }

    /// Insert or replace a hash whose values are arbitrary bytes.
    pub fn insert_raw_hash(&self, key: &str, fields: &[(&str, &[u8])]) {
        let hash = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_vec()))
            .collect();
        self.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Hash(hash),
                ttl: None,
            },
        );
    }

    /// Set a scalar counter.
    pub fn set_counter(&self, key: &str, value: i64) {
        self.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Counter(value),
                ttl: None,
            },
        );
    }

    /// Copy of a hash, if present.
    pub fn hash(&self, key: &str) -> Option<HashMap<String, Vec<u8>>> {
        match self.live(key)?.value {
            Value::Hash(hash) => Some(hash),
            Value::Counter(_) => None,
        }
    }

    /// One hash field as text, if present.
    pub fn field(&self, key: &str, field: &str) -> Option<String> {
        let hash = self.hash(key)?;
        hash.get(field)
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
    }

    /// TTL last applied to `key`, in seconds.
    pub fn ttl(&self, key: &str) -> Option<u64> {
        self.live(key)?.ttl.map(|(secs, _)| secs)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.live(key).is_some()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| !e.expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock leaves the map itself consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone of a non-expired entry, evicting it if it has expired.
    fn live(&self, key: &str) -> Option<Entry> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        entries.get(key).cloned()
    }
}

fn evict_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    if entries.get(key).is_some_and(|e| e.expired(Instant::now())) {
        entries.remove(key);
    }
}

fn wrong_type(key: &str) -> MuninnError {
    MuninnError::MalformedRecord {
        key: key.to_string(),
        reason: "WRONGTYPE operation against a key holding the wrong kind of value".to_string(),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| !e.expired(now));
        Ok(entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(Value::Counter(_)) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            ttl: None,
        });
        match &mut entry.value {
            Value::Hash(hash) => {
                hash.insert(field.to_string(), value.as_bytes().to_vec());
                Ok(())
            }
            Value::Counter(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            ttl: None,
        });
        let Value::Hash(hash) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        let current = match hash.get(field) {
            Some(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|text| text.parse::<i64>().ok())
                .ok_or_else(|| MuninnError::MalformedRecord {
                    key: key.to_string(),
                    reason: format!("hash value of '{field}' is not an integer"),
                })?,
            None => 0,
        };
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.ttl = Some((seconds, Instant::now()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        Ok(entries.remove(key).is_some())
    }

    async fn get_counter(&self, key: &str) -> Result<i64> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Counter(n)) => Ok(*n),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn increment_counter(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.lock();
        evict_if_expired(&mut entries, key);
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Counter(0),
            ttl: None,
        });
        match &mut entry.value {
            Value::Counter(n) => {
                *n += delta;
                Ok(*n)
            }
            Value::Hash(_) => Err(wrong_type(key)),
        }
    }
}

/// Redis `KEYS`-style glob match supporting `*` and `?`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` and the text index it was matched against.
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
