//! Many-to-many invalidation.
//!
//! An association is visible from both ends: the declaring side caches it
//! under its field name, the target side under the reverse accessor. Every
//! change is normalized to "whose list is being updated" first, so the code
//! below does not care which end reported it.

use tracing::{debug, warn};

use super::{upsert, InvalidationEngine};
use crate::error::Result;
use crate::keys::relation_key;
use crate::model::{Pk, Record, Relation, Side};
use crate::notify::{AssociationAction, AssociationChange};

impl InvalidationEngine {
    // == Association Changed ==
    pub(super) fn association_changed(
        &self,
        relation: &Relation,
        change: &AssociationChange,
    ) -> Result<()> {
        let local = if change.reverse {
            Side::Reverse
        } else {
            Side::Forward
        };

        if &change.instance.entity != relation.near_entity(local) {
            warn!(
                "Association change on {} reported by a {} record, ignoring",
                relation.id, change.instance.entity
            );
            return Ok(());
        }

        debug!(
            "{:?} {:?} on {} {} via {}",
            change.action,
            change.members,
            change.instance.entity,
            change.instance.pk,
            relation.name_on(local)
        );

        match change.action {
            AssociationAction::MembersAdded => {
                self.add_local(relation, local, &change.instance, &change.members)?;
                let remote = local.opposite();
                self.add_remote(relation, remote, &change.instance, &change.members)
            }
            AssociationAction::MembersRemoved => {
                self.remove_local(relation, local, &change.instance, &change.members)?;
                let remote = local.opposite();
                self.remove_remote(relation, remote, &change.instance, &change.members)
            }
        }
    }

    /// Adds `members` to the instance's own list.
    fn add_local(
        &self,
        relation: &Relation,
        side: Side,
        instance: &Record,
        members: &[Pk],
    ) -> Result<()> {
        let key = relation_key(&instance.entity, instance.pk, relation.name_on(side));
        let Some(mut records) = self.cache.read_list(&key) else {
            self.loader.members(relation, side, instance.pk)?;
            return Ok(());
        };

        let far = relation.far_entity(side);
        for &pk in members {
            if records.iter().any(|r| r.pk == pk) {
                continue;
            }
            match self.records.get(far, pk) {
                Ok(member) => records.push(member),
                Err(err) if err.is_not_found() => {
                    debug!("Skipping vanished member {} {}", far, pk);
                }
                Err(err) => return Err(err),
            }
        }

        relation.ordering_on(side).sort(&mut records);
        self.cache.write_list(&key, records);
        Ok(())
    }

    /// Adds the instance to each member's list.
    fn add_remote(
        &self,
        relation: &Relation,
        side: Side,
        instance: &Record,
        members: &[Pk],
    ) -> Result<()> {
        let entity = relation.near_entity(side);
        let name = relation.name_on(side);

        for &pk in members {
            let key = relation_key(entity, pk, name);
            match self.cache.read_list(&key) {
                Some(mut records) => {
                    if !records.iter().any(|r| r.pk == instance.pk) {
                        records.push(instance.clone());
                        relation.ordering_on(side).sort(&mut records);
                    }
                    self.cache.write_list(&key, records);
                }
                None => {
                    self.loader.members(relation, side, pk)?;
                }
            }
        }
        Ok(())
    }

    /// Drops `members` from the instance's own list.
    fn remove_local(
        &self,
        relation: &Relation,
        side: Side,
        instance: &Record,
        members: &[Pk],
    ) -> Result<()> {
        let key = relation_key(&instance.entity, instance.pk, relation.name_on(side));
        match self.cache.read_list(&key) {
            Some(mut records) => {
                records.retain(|r| !members.contains(&r.pk));
                self.cache.write_list(&key, records);
            }
            None => {
                self.loader.members(relation, side, instance.pk)?;
            }
        }
        Ok(())
    }

    /// Drops the instance from each member's list.
    fn remove_remote(
        &self,
        relation: &Relation,
        side: Side,
        instance: &Record,
        members: &[Pk],
    ) -> Result<()> {
        let entity = relation.near_entity(side);
        let name = relation.name_on(side);

        for &pk in members {
            let key = relation_key(entity, pk, name);
            match self.cache.read_list(&key) {
                Some(mut records) => {
                    records.retain(|r| r.pk != instance.pk);
                    self.cache.write_list(&key, records);
                }
                None => {
                    self.loader.members(relation, side, pk)?;
                }
            }
        }
        Ok(())
    }

    // == Member Saved ==
    /// A record on `side` changed: refresh its snapshot in every cached list
    /// on the other side that holds it, keeping those lists sorted.
    pub(super) fn member_saved(
        &self,
        relation: &Relation,
        side: Side,
        record: &Record,
    ) -> Result<()> {
        let complement = self.backing.fetch_association_members(
            &record.entity,
            record.pk,
            relation.name_on(side),
            relation.ordering_on(side),
        )?;

        let remote = side.opposite();
        let entity = relation.near_entity(remote);
        let name = relation.name_on(remote);

        for other in complement {
            let key = relation_key(entity, other.pk, name);
            if let Some(mut records) = self.cache.read_list(&key) {
                upsert(&mut records, record);
                relation.ordering_on(remote).sort(&mut records);
                self.cache.write_list(&key, records);
            }
        }
        Ok(())
    }

    // == Member Deleted ==
    /// The join rows of a deleted record are already gone, so the only
    /// record of its associations is its own cached list.
    pub(super) fn member_deleted(&self, relation: &Relation, side: Side, record: &Record) {
        let own_key = relation_key(&record.entity, record.pk, relation.name_on(side));
        let remote = side.opposite();
        let entity = relation.near_entity(remote);
        let name = relation.name_on(remote);

        if let Some(others) = self.cache.read_list(&own_key) {
            for other in others {
                let key = relation_key(entity, other.pk, name);
                if let Some(mut records) = self.cache.read_list(&key) {
                    records.retain(|r| r.pk != record.pk);
                    self.cache.write_list(&key, records);
                }
            }
        }

        self.cache.write_list(&own_key, Vec::new());
    }
}
