//! Relation Cache
//!
//! Front door of the crate. Wires the record controller, the relation
//! accessor and the invalidation engine onto one cache backend and one
//! backing store, and receives the host's change notifications.

use std::sync::Arc;

use tracing::debug;

use crate::accessor::{Related, RelationAccessor};
use crate::backing::BackingStore;
use crate::cache::{CacheBackend, CacheHandle};
use crate::controller::RecordCacheController;
use crate::engine::InvalidationEngine;
use crate::error::{ConfigurationError, Result};
use crate::loader::RelationLoader;
use crate::model::{EntityName, Pk, Record};
use crate::notify::{AssociationChange, ChangeEvent, ChangeListener};
use crate::registry::Registry;
use crate::shadow::{ShadowTracker, DEFAULT_SHADOW_CAPACITY};

// == Relation Cache ==
pub struct RelationCache {
    registry: Arc<Registry>,
    records: RecordCacheController,
    accessor: RelationAccessor,
    engine: InvalidationEngine,
    loader: RelationLoader,
    shadow: Arc<ShadowTracker>,
}

impl RelationCache {
    pub fn new(
        registry: Arc<Registry>,
        backend: Arc<dyn CacheBackend>,
        backing: Arc<dyn BackingStore>,
    ) -> Self {
        Self::with_shadow_capacity(registry, backend, backing, DEFAULT_SHADOW_CAPACITY)
    }

    /// Like [`RelationCache::new`], tracking at most `capacity` previous
    /// foreign-key values.
    pub fn with_shadow_capacity(
        registry: Arc<Registry>,
        backend: Arc<dyn CacheBackend>,
        backing: Arc<dyn BackingStore>,
        capacity: usize,
    ) -> Self {
        let cache = CacheHandle::new(backend, registry.ttl_overrides());
        let shadow = Arc::new(ShadowTracker::with_capacity(capacity));

        let records = RecordCacheController::new(cache.clone(), backing.clone());
        let loader = RelationLoader::new(
            registry.clone(),
            cache.clone(),
            backing.clone(),
            shadow.clone(),
        );
        let accessor = RelationAccessor::new(
            registry.clone(),
            cache.clone(),
            records.clone(),
            loader.clone(),
        );
        let engine = InvalidationEngine::new(
            registry.clone(),
            cache,
            backing,
            records.clone(),
            loader.clone(),
            shadow.clone(),
        );

        Self {
            registry,
            records,
            accessor,
            engine,
            loader,
            shadow,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // == Reads ==
    /// Direct record access.
    pub fn get(&self, entity: &EntityName, pk: Pk) -> Result<Record> {
        if !self.registry.contains(entity) {
            return Err(ConfigurationError::UnknownEntity(entity.clone()).into());
        }
        let record = self.records.get(entity, pk)?;
        self.loader.observe(&record);
        Ok(record)
    }

    /// Relation access by forward field or reverse accessor name.
    pub fn get_related(&self, record: &Record, name: &str) -> Result<Related> {
        self.accessor.get(record, name)
    }

    // == Notifications ==
    pub fn on_record_saved(&self, record: &Record) -> Result<()> {
        debug!("Record saved: {} {}", record.entity, record.pk);
        self.engine.prime(record);
        self.records.on_record_saved(record);
        self.engine.on_record_saved(record)
    }

    pub fn on_record_deleted(&self, record: &Record) -> Result<()> {
        debug!("Record deleted: {} {}", record.entity, record.pk);
        self.records.on_record_deleted(record);
        self.engine.on_record_deleted(record)
    }

    pub fn on_association_changed(&self, change: &AssociationChange) -> Result<()> {
        self.engine.on_association_changed(change)
    }
}

impl ChangeListener for RelationCache {
    fn on_change(&self, event: &ChangeEvent) -> Result<()> {
        match event {
            ChangeEvent::RecordSaved(record) => self.on_record_saved(record),
            ChangeEvent::RecordDeleted(record) => self.on_record_deleted(record),
            ChangeEvent::AssociationChanged(change) => self.on_association_changed(change),
        }
    }
}
