//! Relation Invalidation Engine
//!
//! Applies change notifications to every relation cache entry the registry
//! says is reachable from the changed record. Entries are patched in place
//! (replace, append, remove, then re-sort) rather than dropped, so readers
//! keep hitting the cache after a write.
//!
//! Each patch is a read-modify-write against the cache store and is not
//! atomic. Two concurrent writers to the same entry can lose one update;
//! the entry stays stale until its TTL runs out and it is repopulated from
//! the backing store.

mod foreign_key;
mod many_to_many;


use std::sync::Arc;

use tracing::{debug, warn};

use crate::backing::BackingStore;
use crate::cache::CacheHandle;
use crate::controller::RecordCacheController;
use crate::error::{CacheError, Result};
use crate::loader::RelationLoader;
use crate::model::{Record, RelationKind, Side};
use crate::notify::AssociationChange;
use crate::registry::Registry;
use crate::shadow::{Previous, ShadowTracker};

#[derive(Clone)]
pub struct InvalidationEngine {
    registry: Arc<Registry>,
    cache: CacheHandle,
    backing: Arc<dyn BackingStore>,
    records: RecordCacheController,
    loader: RelationLoader,
    shadow: Arc<ShadowTracker>,
}

impl InvalidationEngine {
    pub fn new(
        registry: Arc<Registry>,
        cache: CacheHandle,
        backing: Arc<dyn BackingStore>,
        records: RecordCacheController,
        loader: RelationLoader,
        shadow: Arc<ShadowTracker>,
    ) -> Self {
        Self {
            registry,
            cache,
            backing,
            records,
            loader,
            shadow,
        }
    }

    // == Prime ==
    /// Takes the previous foreign keys of `record` from its cached snapshot
    /// when there is one. The snapshot is shared by every process on the
    /// cache store, so it wins over a locally tracked value that another
    /// process's write may have outdated. Without a snapshot the tracked
    /// value stands.
    ///
    /// Must run before the direct cache entry is overwritten with the new
    /// state, otherwise the previous owner is lost.
    pub fn prime(&self, record: &Record) {
        let mut snapshot: Option<Option<Record>> = None;

        for (relation, side) in self.registry.subscriptions(&record.entity) {
            if !relation.kind.is_foreign_key() || side != Side::Forward {
                continue;
            }

            let cached =
                snapshot.get_or_insert_with(|| self.records.cached(&record.entity, record.pk));
            if let Some(old) = cached {
                let previous = old.foreign_key(relation.field());
                if self.shadow.previous(&relation.id, record.pk) != Previous::Known(previous) {
                    debug!(
                        "{} {} primed from cached snapshot via {}: {:?}",
                        record.entity, record.pk, relation.id, previous
                    );
                }
                self.shadow.remember(&relation.id, record.pk, previous);
            }
        }
    }

    // == Record Saved ==
    pub fn on_record_saved(&self, record: &Record) -> Result<()> {
        let mut outcome = Ok(());

        for (relation, side) in self.registry.subscriptions(&record.entity) {
            let result = match relation.kind {
                RelationKind::OneToOne | RelationKind::OneToMany => {
                    self.foreign_key_saved(relation, record)
                }
                RelationKind::ManyToMany => self.member_saved(relation, side, record),
            };
            keep_first_error(&mut outcome, result, &relation.id.to_string());
        }

        outcome
    }

    // == Record Deleted ==
    pub fn on_record_deleted(&self, record: &Record) -> Result<()> {
        let mut outcome = Ok(());

        for (relation, side) in self.registry.subscriptions(&record.entity) {
            let result = match relation.kind {
                RelationKind::OneToOne | RelationKind::OneToMany => {
                    self.foreign_key_deleted(relation, record)
                }
                RelationKind::ManyToMany => {
                    self.member_deleted(relation, side, record);
                    Ok(())
                }
            };
            keep_first_error(&mut outcome, result, &relation.id.to_string());
        }

        outcome
    }

    // == Association Changed ==
    pub fn on_association_changed(&self, change: &AssociationChange) -> Result<()> {
        let relation = self
            .registry
            .relation(&change.relation)
            .filter(|relation| relation.kind == RelationKind::ManyToMany)
            .ok_or_else(|| CacheError::UnknownRelation {
                entity: change.relation.owning.clone(),
                name: change.relation.field.clone(),
            })?;

        self.association_changed(relation, change)
    }
}

/// Records the first failure; the remaining relations are still processed.
fn keep_first_error(outcome: &mut Result<()>, result: Result<()>, relation: &str) {
    if let Err(err) = result {
        warn!("Invalidation through {} failed: {}", relation, err);
        if outcome.is_ok() {
            *outcome = Err(err);
        }
    }
}

/// Replaces the record with the same pk, or appends it.
fn upsert(records: &mut Vec<Record>, record: &Record) {
    match records.iter_mut().find(|r| r.pk == record.pk) {
        Some(slot) => *slot = record.clone(),
        None => records.push(record.clone()),
    }
}
