//! Instance Relation Accessor
//!
//! Reads a relation of one record by name, from cache when possible.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheHandle, CacheValue};
use crate::controller::RecordCacheController;
use crate::error::{CacheError, Result};
use crate::keys::relation_key;
use crate::loader::RelationLoader;
use crate::model::{Record, Relation, RelationKind, Side};
use crate::registry::Registry;

/// Value of a relation seen from one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Related {
    One(Record),
    Many(Vec<Record>),
}

impl Related {
    pub fn into_one(self) -> Option<Record> {
        match self {
            Related::One(record) => Some(record),
            Related::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<Record>> {
        match self {
            Related::Many(records) => Some(records),
            Related::One(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct RelationAccessor {
    registry: Arc<Registry>,
    cache: CacheHandle,
    records: RecordCacheController,
    loader: RelationLoader,
}

impl RelationAccessor {
    pub fn new(
        registry: Arc<Registry>,
        cache: CacheHandle,
        records: RecordCacheController,
        loader: RelationLoader,
    ) -> Self {
        Self {
            registry,
            cache,
            records,
            loader,
        }
    }

    // == Get ==
    /// Resolves `name` (a forward field or a reverse accessor) on `record`.
    pub fn get(&self, record: &Record, name: &str) -> Result<Related> {
        let (relation, side) = self.registry.resolve(&record.entity, name)?;

        match (relation.kind, side) {
            (RelationKind::ManyToMany, _) => self.members(relation, side, record),
            (_, Side::Forward) => self.forward(relation, record),
            (RelationKind::OneToOne, Side::Reverse) => self.reverse_single(relation, record),
            (RelationKind::OneToMany, Side::Reverse) => self.reverse_collection(relation, record),
        }
    }

    /// Follows a foreign key through the direct record cache.
    fn forward(&self, relation: &Relation, record: &Record) -> Result<Related> {
        let owner = record.foreign_key(relation.field()).ok_or_else(|| {
            CacheError::not_found_by(&relation.related, format!("{} is null", relation.id))
        })?;
        self.records.get(&relation.related, owner).map(Related::One)
    }

    fn reverse_single(&self, relation: &Relation, record: &Record) -> Result<Related> {
        let key = relation_key(&record.entity, record.pk, &relation.accessor);
        match self.cache.read(&key) {
            Some(CacheValue::Found(peer)) => Ok(Related::One(peer)),
            Some(CacheValue::NotFound) => Err(CacheError::not_found_by(
                relation.owning(),
                format!("{}={}", relation.field(), record.pk),
            )),
            _ => self
                .loader
                .reverse_single(relation, record.pk)
                .map(Related::One),
        }
    }

    fn reverse_collection(&self, relation: &Relation, record: &Record) -> Result<Related> {
        let key = relation_key(&record.entity, record.pk, &relation.accessor);
        match self.cache.read_list(&key) {
            Some(records) => Ok(Related::Many(records)),
            None => self
                .loader
                .reverse_collection(relation, record.pk)
                .map(Related::Many),
        }
    }

    fn members(&self, relation: &Relation, side: Side, record: &Record) -> Result<Related> {
        let key = relation_key(&record.entity, record.pk, relation.name_on(side));
        match self.cache.read_list(&key) {
            Some(records) => Ok(Related::Many(records)),
            None => self
                .loader
                .members(relation, side, record.pk)
                .map(Related::Many),
        }
    }
}
