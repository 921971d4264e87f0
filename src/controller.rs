//! Record Cache Controller
//!
//! Caches single records by primary key. Misses fall through to the backing
//! store and the result, including "does not exist", is cached.

use std::sync::Arc;

use tracing::debug;

use crate::backing::BackingStore;
use crate::cache::{CacheHandle, CacheValue};
use crate::error::{CacheError, Result};
use crate::keys::record_key;
use crate::model::{EntityName, Pk, Record};

#[derive(Clone)]
pub struct RecordCacheController {
    cache: CacheHandle,
    backing: Arc<dyn BackingStore>,
}

impl RecordCacheController {
    pub fn new(cache: CacheHandle, backing: Arc<dyn BackingStore>) -> Self {
        Self { cache, backing }
    }

    // == Get ==
    /// Returns the record, from cache when possible. A cached sentinel or a
    /// backing-store miss both yield `CacheError::NotFound`.
    pub fn get(&self, entity: &EntityName, pk: Pk) -> Result<Record> {
        let key = record_key(entity, pk);

        match self.cache.read(&key) {
            Some(CacheValue::Found(record)) => return Ok(record),
            Some(CacheValue::NotFound) => return Err(CacheError::not_found(entity, pk)),
            Some(CacheValue::List(_)) => {
                debug!(key = %key, "list stored at a record key, refetching");
            }
            None => {}
        }

        match self.backing.fetch_by_key(entity, pk)? {
            Some(record) => {
                self.cache.write(&key, &CacheValue::Found(record.clone()));
                Ok(record)
            }
            None => {
                self.cache.write(&key, &CacheValue::NotFound);
                Err(CacheError::not_found(entity, pk))
            }
        }
    }

    /// Peeks at the cached snapshot without touching the backing store.
    pub fn cached(&self, entity: &EntityName, pk: Pk) -> Option<Record> {
        match self.cache.read(&record_key(entity, pk)) {
            Some(CacheValue::Found(record)) => Some(record),
            _ => None,
        }
    }

    pub fn on_record_saved(&self, record: &Record) {
        let key = record_key(&record.entity, record.pk);
        self.cache.write(&key, &CacheValue::Found(record.clone()));
    }

    pub fn on_record_deleted(&self, record: &Record) {
        let key = record_key(&record.entity, record.pk);
        self.cache.write(&key, &CacheValue::NotFound);
    }
}
