//! Relation cache population.
//!
//! Fetches a relation's current value from the backing store and caches it.
//! Shared by the read path (cache misses) and by invalidation (lists that
//! must exist before they can be patched).

use std::sync::Arc;

use crate::backing::{BackingStore, Filter};
use crate::cache::{CacheHandle, CacheValue};
use crate::error::{CacheError, Result};
use crate::keys::relation_key;
use crate::model::{Pk, Record, Relation, Side};
use crate::registry::Registry;
use crate::shadow::ShadowTracker;

#[derive(Clone)]
pub struct RelationLoader {
    registry: Arc<Registry>,
    cache: CacheHandle,
    backing: Arc<dyn BackingStore>,
    shadow: Arc<ShadowTracker>,
}

impl RelationLoader {
    pub fn new(
        registry: Arc<Registry>,
        cache: CacheHandle,
        backing: Arc<dyn BackingStore>,
        shadow: Arc<ShadowTracker>,
    ) -> Self {
        Self {
            registry,
            cache,
            backing,
            shadow,
        }
    }

    /// Caches and returns the owning-type records pointing at `owner`.
    pub fn reverse_collection(&self, relation: &Relation, owner: Pk) -> Result<Vec<Record>> {
        let records = self.backing.fetch_filtered(
            relation.owning(),
            &Filter::eq(relation.field(), owner),
            &relation.ordering,
        )?;
        records.iter().for_each(|record| self.observe(record));

        let key = relation_key(&relation.related, owner, &relation.accessor);
        self.cache.write_list(&key, records.clone());
        Ok(records)
    }

    /// Caches and returns the one-to-one peer of `owner`. Absence is cached
    /// as a sentinel before `NotFound` is returned.
    pub fn reverse_single(&self, relation: &Relation, owner: Pk) -> Result<Record> {
        let key = relation_key(&relation.related, owner, &relation.accessor);
        let found = self
            .backing
            .fetch_filtered(
                relation.owning(),
                &Filter::eq(relation.field(), owner),
                &relation.ordering,
            )?
            .into_iter()
            .next();

        match found {
            Some(record) => {
                self.observe(&record);
                self.cache.write(&key, &CacheValue::Found(record.clone()));
                Ok(record)
            }
            None => {
                self.cache.write(&key, &CacheValue::NotFound);
                Err(CacheError::not_found_by(
                    relation.owning(),
                    format!("{}={}", relation.field(), owner),
                ))
            }
        }
    }

    /// Caches and returns the association list of the `side` record `pk`.
    pub fn members(&self, relation: &Relation, side: Side, pk: Pk) -> Result<Vec<Record>> {
        let entity = relation.near_entity(side);
        let name = relation.name_on(side);
        let records = self.backing.fetch_association_members(
            entity,
            pk,
            name,
            relation.ordering_on(side),
        )?;
        records.iter().for_each(|record| self.observe(record));

        self.cache.write_list(&relation_key(entity, pk, name), records.clone());
        Ok(records)
    }

    /// Seeds the shadow tracker with the foreign keys of a record that came
    /// from the backing store.
    pub fn observe(&self, record: &Record) {
        for (relation, side) in self.registry.subscriptions(&record.entity) {
            if relation.kind.is_foreign_key() && side == Side::Forward {
                self.shadow
                    .observe(&relation.id, record.pk, record.foreign_key(relation.field()));
            }
        }
    }
}
