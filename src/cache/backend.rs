//! Cache backend seam.
//!
//! `CacheBackend` is the string get/set-with-expiry contract any store
//! (in-process, distributed) has to meet. `CacheHandle` layers the typed
//! `CacheValue` encoding on top and applies the fail-open policy: a failed
//! read is a miss and a failed write is logged and dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::keys::Key;
use crate::model::{EntityName, Record};

// == Cache Backend ==
/// Minimal cache store contract. No delete is needed: sentinels replace
/// deletion.
pub trait CacheBackend: Send + Sync {
    /// Returns the live value at `key`, `Ok(None)` on a miss.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` at `key`; `ttl` in seconds, None for the store default.
    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<(), StoreError>;
}

// == Cache Value ==
/// What a key can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Found(Record),
    /// Confirmed absent, distinct from a miss
    NotFound,
    List(Vec<Record>),
}

// == Cache Handle ==
#[derive(Clone)]
pub struct CacheHandle {
    backend: Arc<dyn CacheBackend>,
    ttls: Arc<HashMap<EntityName, u64>>,
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl CacheHandle {
    /// `ttls` holds per-entity TTL overrides; other keys use the backend default.
    pub fn new(backend: Arc<dyn CacheBackend>, ttls: HashMap<EntityName, u64>) -> Self {
        Self {
            backend,
            ttls: Arc::new(ttls),
        }
    }

    /// Reads and decodes `key`. Transport and decode failures read as a miss.
    pub fn read(&self, key: &Key) -> Option<CacheValue> {
        let raw = match self.backend.get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Reads a list entry; any other shape is treated as a miss.
    pub fn read_list(&self, key: &Key) -> Option<Vec<Record>> {
        match self.read(key)? {
            CacheValue::List(records) => Some(records),
            other => {
                warn!(key = %key, "expected a list entry, found {:?}", shape(&other));
                None
            }
        }
    }

    /// Encodes and stores `value`. Failures are swallowed: the entry stays
    /// stale or absent until the next read repopulates it.
    pub fn write(&self, key: &Key, value: &CacheValue) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to encode cache entry");
                return;
            }
        };

        let ttl = self.ttls.get(key.entity()).copied();
        if let Err(err) = self.backend.set(key.as_str(), encoded, ttl) {
            warn!(key = %key, error = %err, "cache write failed, entry left stale");
        }
    }

    pub fn write_list(&self, key: &Key, records: Vec<Record>) {
        self.write(key, &CacheValue::List(records));
    }
}

fn shape(value: &CacheValue) -> &'static str {
    match value {
        CacheValue::Found(_) => "found",
        CacheValue::NotFound => "not_found",
        CacheValue::List(_) => "list",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::keys::{record_key, relation_key};

    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Internal("connection refused".into()))
        }

        fn set(&self, _key: &str, _value: String, _ttl: Option<u64>) -> Result<(), StoreError> {
            Err(StoreError::Internal("connection refused".into()))
        }
    }

    fn person() -> EntityName {
        EntityName::parse("library.Person").unwrap()
    }

    #[test]
    fn test_value_round_trips_through_backend() {
        let handle = CacheHandle::new(Arc::new(MemoryCache::new(10, 60)), HashMap::new());
        let key = record_key(&person(), 1);
        let record = Record::new(person(), 1).with("name", "Charles Dickens");

        handle.write(&key, &CacheValue::Found(record.clone()));
        assert_eq!(handle.read(&key), Some(CacheValue::Found(record)));

        handle.write(&key, &CacheValue::NotFound);
        assert_eq!(handle.read(&key), Some(CacheValue::NotFound));
    }

    #[test]
    fn test_read_list_rejects_other_shapes() {
        let handle = CacheHandle::new(Arc::new(MemoryCache::new(10, 60)), HashMap::new());
        let key = relation_key(&person(), 1, "book_set");

        handle.write(&key, &CacheValue::NotFound);
        assert!(handle.read_list(&key).is_none());

        handle.write_list(&key, vec![]);
        assert_eq!(handle.read_list(&key), Some(vec![]));
    }

    #[test]
    fn test_broken_backend_fails_open() {
        let handle = CacheHandle::new(Arc::new(BrokenBackend), HashMap::new());
        let key = record_key(&person(), 1);

        handle.write(&key, &CacheValue::NotFound);
        assert!(handle.read(&key).is_none());
    }

    #[test]
    fn test_garbage_entry_is_a_miss() {
        let backend = MemoryCache::new(10, 60);
        backend.set("library:Person:1", "not json".into(), None).unwrap();
        let handle = CacheHandle::new(Arc::new(backend), HashMap::new());

        assert!(handle.read(&record_key(&person(), 1)).is_none());
    }

    #[test]
    fn test_encoded_shape() {
        let json = serde_json::to_value(CacheValue::NotFound).unwrap();
        assert_eq!(json, serde_json::json!({"state": "not_found"}));
    }
}
