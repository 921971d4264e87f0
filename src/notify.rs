//! Change notifications.
//!
//! The hosting application reports every committed mutation through a
//! `ChangeListener`; nothing here assumes a global dispatcher.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::{record_key, relation_key, Key};
use crate::model::{Pk, Record, RelationId, Side};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationAction {
    MembersAdded,
    MembersRemoved,
}

/// Members were added to or removed from a many-to-many association.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationChange {
    /// The association (declaring type and field)
    pub relation: RelationId,
    /// The record whose collection was edited
    pub instance: Record,
    pub action: AssociationAction,
    /// Primary keys of the records on the far side that actually changed
    pub members: Vec<Pk>,
    /// True when `instance` is of the relation's target type, i.e. the
    /// change was made through the reverse accessor
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    RecordSaved(Record),
    RecordDeleted(Record),
    AssociationChanged(AssociationChange),
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::RecordSaved(_) => "record_saved",
            ChangeEvent::RecordDeleted(_) => "record_deleted",
            ChangeEvent::AssociationChanged(_) => "association_changed",
        }
    }

    /// Cache keys this event is applied to, as far as the event itself
    /// shows. The old owner of a moved record is not among them.
    pub fn cache_keys(&self, registry: &Registry) -> Vec<Key> {
        match self {
            ChangeEvent::RecordSaved(record) | ChangeEvent::RecordDeleted(record) => {
                let mut keys = vec![record_key(&record.entity, record.pk)];
                for (relation, side) in registry.subscriptions(&record.entity) {
                    if !relation.kind.is_foreign_key() {
                        keys.push(relation_key(&record.entity, record.pk, relation.name_on(side)));
                    } else if let Some(owner) = record.foreign_key(relation.field()) {
                        keys.push(relation_key(&relation.related, owner, &relation.accessor));
                    }
                }
                keys
            }
            ChangeEvent::AssociationChanged(change) => {
                let Some(relation) = registry.relation(&change.relation) else {
                    return Vec::new();
                };
                let local = if change.reverse { Side::Reverse } else { Side::Forward };
                let remote = local.opposite();
                let instance = &change.instance;

                let mut keys = vec![relation_key(
                    &instance.entity,
                    instance.pk,
                    relation.name_on(local),
                )];
                keys.extend(change.members.iter().map(|&member| {
                    relation_key(relation.near_entity(remote), member, relation.name_on(remote))
                }));
                keys
            }
        }
    }
}

/// Receives change events synchronously, once per committed mutation.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent) -> Result<()>;
}
