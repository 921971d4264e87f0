//! One-to-one and one-to-many invalidation.
//!
//! The owning record holds the foreign key; the cached value lives under
//! the owner's key (`related:pk:accessor`) and is either the single peer or
//! the ordered collection of owning records.

use tracing::debug;

use super::{upsert, InvalidationEngine};
use crate::cache::CacheValue;
use crate::error::Result;
use crate::keys::relation_key;
use crate::model::{Pk, Record, Relation, RelationKind};
use crate::shadow::Previous;

/// What to do when the entry to remove a record from is not cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnMiss {
    /// Populate it from the backing store (which no longer lists the record)
    Repopulate,
    /// Leave it absent for the next read to fill
    Skip,
}

impl InvalidationEngine {
    // == Saved ==
    pub(super) fn foreign_key_saved(&self, relation: &Relation, record: &Record) -> Result<()> {
        let current = record.foreign_key(relation.field());

        if let Previous::Known(Some(previous)) = self.shadow.previous(&relation.id, record.pk) {
            if Some(previous) != current {
                debug!(
                    "{} {} moved from {} to {:?} via {}",
                    record.entity, record.pk, previous, current, relation.id
                );
                self.detach(relation, previous, record, OnMiss::Repopulate)?;
            }
        }

        if let Some(owner) = current {
            self.attach(relation, owner, record)?;
        }

        // A repeated notification for the same change now finds nothing to move.
        self.shadow.remember(&relation.id, record.pk, current);
        Ok(())
    }

    // == Deleted ==
    pub(super) fn foreign_key_deleted(&self, relation: &Relation, record: &Record) -> Result<()> {
        if let Some(owner) = record.foreign_key(relation.field()) {
            self.detach(relation, owner, record, OnMiss::Skip)?;
        }
        self.shadow.forget(&relation.id, record.pk);
        Ok(())
    }

    /// Makes `record` visible under `owner`.
    fn attach(&self, relation: &Relation, owner: Pk, record: &Record) -> Result<()> {
        let key = relation_key(&relation.related, owner, &relation.accessor);

        if relation.kind == RelationKind::OneToOne {
            self.cache.write(&key, &CacheValue::Found(record.clone()));
            return Ok(());
        }

        match self.cache.read_list(&key) {
            Some(mut records) => {
                upsert(&mut records, record);
                relation.ordering.sort(&mut records);
                debug!(key = %key, len = records.len(), "patched reverse collection");
                self.cache.write_list(&key, records);
            }
            None => {
                self.loader.reverse_collection(relation, owner)?;
            }
        }
        Ok(())
    }

    /// Removes `record` from what `owner` sees.
    fn detach(
        &self,
        relation: &Relation,
        owner: Pk,
        record: &Record,
        on_miss: OnMiss,
    ) -> Result<()> {
        let key = relation_key(&relation.related, owner, &relation.accessor);

        if relation.kind == RelationKind::OneToOne {
            self.cache.write(&key, &CacheValue::NotFound);
            return Ok(());
        }

        match self.cache.read_list(&key) {
            Some(mut records) => {
                let before = records.len();
                records.retain(|r| r.pk != record.pk);
                if records.len() != before {
                    debug!(key = %key, len = records.len(), "removed from reverse collection");
                    self.cache.write_list(&key, records);
                }
            }
            None if on_miss == OnMiss::Repopulate => {
                self.loader.reverse_collection(relation, owner)?;
            }
            None => {}
        }
        Ok(())
    }
}
