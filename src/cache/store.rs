//! Cache Store Module
//!
//! In-memory cache engine: HashMap storage with LRU tracking and TTL
//! expiration, plus `MemoryCache`, the shareable handle that plugs it into
//! the relation layer as a `CacheBackend`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::cache::{
    CacheBackend, CacheEntry, CacheStats, LruTracker, MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};
use crate::error::StoreError;

type StoreResult<T> = std::result::Result<T, StoreError>;

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL in seconds for writes that carry none
    default_ttl: u64,
}

impl CacheStore {
    // == Constructor ==
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold
    /// * `default_ttl` - Default TTL in seconds for entries without explicit TTL
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry and resetting its TTL.
    /// At capacity the least recently used entry is evicted first.
    pub fn set(&mut self, key: String, value: String, ttl: Option<u64>) -> StoreResult<()> {
        if key.len() > MAX_KEY_LENGTH {
            self.stats.record_rejected_write();
            return Err(StoreError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.len() > MAX_VALUE_SIZE {
            self.stats.record_rejected_write();
            return Err(StoreError::InvalidRequest(format!(
                "Value for '{}' exceeds maximum size of {} bytes",
                key, MAX_VALUE_SIZE
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            match self.lru.evict_oldest() {
                Some(evicted_key) => {
                    self.entries.remove(&evicted_key);
                    self.stats.record_eviction();
                }
                None => {
                    return Err(StoreError::CacheFull(
                        "Cache is full and eviction failed".to_string(),
                    ));
                }
            }
        }

        let effective_ttl = Some(ttl.unwrap_or(self.default_ttl));
        self.entries
            .insert(key.clone(), CacheEntry::new(value, effective_ttl));
        self.lru.touch(&key);

        self.stats.record_write();
        self.stats.set_total_entries(self.entries.len());
        Ok(())
    }

    // == Get ==
    /// Returns the live value at `key`. Expired entries are dropped on the
    /// spot and reported as `Expired`.
    pub fn get(&mut self, key: &str) -> StoreResult<String> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return Err(StoreError::KeyNotFound(key.to_string()));
        };

        if entry.is_expired() {
            self.entries.remove(key);
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
            self.stats.record_miss();
            return Err(StoreError::Expired(key.to_string()));
        }

        let value = entry.value.clone();
        self.stats.record_hit();
        self.lru.touch(key);
        Ok(value)
    }

    // == Delete ==
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
            Ok(())
        } else {
            Err(StoreError::KeyNotFound(key.to_string()))
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.set_total_entries(self.entries.len());
        expired_keys.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Memory Cache ==
/// Cloneable, thread-safe handle to a `CacheStore`.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<CacheStore>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self::from_store(CacheStore::new(max_entries, default_ttl))
    }

    pub fn from_store(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    fn lock(&self) -> StoreResult<RwLockWriteGuard<'_, CacheStore>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("cache store lock poisoned".to_string()))
    }

    /// Drops one key; a missing key is not an error.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        match self.lock()?.delete(key) {
            Err(err) if err.is_miss() => Ok(()),
            other => other,
        }
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn cleanup_expired(&self) -> StoreResult<usize> {
        Ok(self.lock()?.cleanup_expired())
    }

    pub fn stats(&self) -> StoreResult<CacheStats> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Internal("cache store lock poisoned".to_string()))?;
        Ok(guard.stats())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|store| store.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.lock()?.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_miss() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: String, ttl: Option<u64>) -> StoreResult<()> {
        self.lock()?.set(key.to_string(), value, ttl)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new(100, 300);
        store.set("key1".to_string(), "value1".to_string(), None).unwrap();

        assert_eq!(store.get("key1").unwrap(), "value1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new(100, 300);
        assert!(matches!(store.get("nope"), Err(StoreError::KeyNotFound(_))));
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new(100, 300);
        store.set("key1".to_string(), "value1".to_string(), None).unwrap();
        store.set("key1".to_string(), "value2".to_string(), None).unwrap();

        assert_eq!(store.get("key1").unwrap(), "value2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = CacheStore::new(100, 300);
        store.set("key1".to_string(), "value1".to_string(), Some(1)).unwrap();
        assert!(store.get("key1").is_ok());

        sleep(Duration::from_millis(1100));

        assert!(matches!(store.get("key1"), Err(StoreError::Expired(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = CacheStore::new(3, 300);
        store.set("key1".to_string(), "v".to_string(), None).unwrap();
        store.set("key2".to_string(), "v".to_string(), None).unwrap();
        store.set("key3".to_string(), "v".to_string(), None).unwrap();

        // key1 becomes most recently used, key2 is now the oldest
        store.get("key1").unwrap();
        store.set("key4".to_string(), "v".to_string(), None).unwrap();

        assert_eq!(store.len(), 3);
        assert!(store.get("key1").is_ok());
        assert!(matches!(store.get("key2"), Err(StoreError::KeyNotFound(_))));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100, 300);
        store.set("short".to_string(), "v".to_string(), Some(1)).unwrap();
        store.set("long".to_string(), "v".to_string(), Some(10)).unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_ok());
    }

    #[test]
    fn test_store_rejects_oversized_value() {
        let mut store = CacheStore::new(100, 300);
        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);

        let result = store.set("key".to_string(), large_value, None);
        assert!(matches!(result, Err(StoreError::InvalidRequest(_))));
        assert_eq!(store.stats().rejected_writes, 1);
    }

    #[test]
    fn test_store_rejects_long_key() {
        let mut store = CacheStore::new(100, 300);
        let result = store.set("k".repeat(MAX_KEY_LENGTH + 1), "v".to_string(), None);
        assert!(matches!(result, Err(StoreError::InvalidRequest(_))));
    }

    #[test]
    fn test_memory_cache_backend_miss_is_none() {
        let cache = MemoryCache::new(10, 60);
        assert_eq!(cache.get("missing").unwrap(), None);

        cache.set("k", "v".to_string(), None).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));

        cache.remove("k").unwrap();
        cache.remove("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_cache_clones_share_state() {
        let cache = MemoryCache::new(10, 60);
        let other = cache.clone();
        cache.set("k", "v".to_string(), None).unwrap();

        assert_eq!(other.len(), 1);
        other.clear().unwrap();
        assert!(cache.is_empty());
    }
}
