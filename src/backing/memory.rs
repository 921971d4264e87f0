//! In-memory reference database.
//!
//! Tables and join tables are derived from the registry. Every committed
//! mutation is reported to the subscribed listeners after the table lock is
//! released, since listeners query the database while handling the event.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::backing::{BackingStore, Filter};
use crate::error::{CacheError, ConfigurationError, Result};
use crate::model::{EntityName, Pk, Record, Relation, RelationId, RelationKind, Side, SortOrder};
use crate::notify::{AssociationAction, AssociationChange, ChangeEvent, ChangeListener};
use crate::registry::Registry;

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<EntityName, BTreeMap<Pk, Record>>,
    /// Join rows per many-to-many relation, as (owning pk, related pk)
    links: HashMap<RelationId, BTreeSet<(Pk, Pk)>>,
    next_pk: HashMap<EntityName, Pk>,
}

impl Tables {
    fn table(&self, entity: &EntityName) -> Result<&BTreeMap<Pk, Record>> {
        self.rows
            .get(entity)
            .ok_or_else(|| ConfigurationError::UnknownEntity(entity.clone()).into())
    }

    fn table_mut(&mut self, entity: &EntityName) -> Result<&mut BTreeMap<Pk, Record>> {
        self.rows
            .get_mut(entity)
            .ok_or_else(|| ConfigurationError::UnknownEntity(entity.clone()).into())
    }

    fn exists(&self, entity: &EntityName, pk: Pk) -> bool {
        self.rows
            .get(entity)
            .is_some_and(|table| table.contains_key(&pk))
    }

    fn allocate(&mut self, entity: &EntityName) -> Pk {
        let next = self.next_pk.entry(entity.clone()).or_insert(1);
        let pk = *next;
        *next += 1;
        pk
    }
}

// == Memory Database ==
pub struct MemoryDatabase {
    registry: Arc<Registry>,
    tables: RwLock<Tables>,
    listeners: RwLock<Vec<Weak<dyn ChangeListener>>>,
    queries: AtomicU64,
}

impl MemoryDatabase {
    pub fn new(registry: Arc<Registry>) -> Self {
        let mut tables = Tables::default();
        for entity in registry.entities() {
            tables.rows.insert(entity.clone(), BTreeMap::new());
        }
        for relation in registry.relations() {
            if relation.kind == RelationKind::ManyToMany {
                tables.links.insert(relation.id.clone(), BTreeSet::new());
            }
        }

        Self {
            registry,
            tables: RwLock::new(tables),
            listeners: RwLock::new(Vec::new()),
            queries: AtomicU64::new(0),
        }
    }

    /// Delivers change events to `listener` for as long as it is alive.
    pub fn subscribe<L: ChangeListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn ChangeListener> = listener.clone();
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(Arc::downgrade(&listener));
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CacheError::Backing("database lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CacheError::Backing("database lock poisoned".to_string()))
    }

    // == Mutations ==
    /// Inserts a new record with the next free primary key.
    pub fn insert(&self, entity: &EntityName, fields: Map<String, Value>) -> Result<Record> {
        let record = {
            let mut tables = self.write()?;
            tables.table(entity)?;
            self.check_foreign_keys(&tables, entity, None, &fields)?;

            let pk = tables.allocate(entity);
            let record = Record {
                entity: entity.clone(),
                pk,
                fields,
            };
            tables.table_mut(entity)?.insert(pk, record.clone());
            record
        };

        debug!("Inserted {} {}", record.entity, record.pk);
        self.notify(ChangeEvent::RecordSaved(record.clone()));
        Ok(record)
    }

    /// Writes `record` as given, creating or replacing the row.
    pub fn save(&self, record: &Record) -> Result<()> {
        {
            let mut tables = self.write()?;
            tables.table(&record.entity)?;
            let pk = Some(record.pk);
            self.check_foreign_keys(&tables, &record.entity, pk, &record.fields)?;

            let next = tables.next_pk.entry(record.entity.clone()).or_insert(1);
            *next = (*next).max(record.pk + 1);
            tables
                .table_mut(&record.entity)?
                .insert(record.pk, record.clone());
        }

        debug!("Saved {} {}", record.entity, record.pk);
        self.notify(ChangeEvent::RecordSaved(record.clone()));
        Ok(())
    }

    /// Merges `fields` into an existing record.
    pub fn update(
        &self,
        entity: &EntityName,
        pk: Pk,
        fields: Map<String, Value>,
    ) -> Result<Record> {
        let record = {
            let mut tables = self.write()?;
            let mut record = tables
                .table(entity)?
                .get(&pk)
                .cloned()
                .ok_or_else(|| CacheError::not_found(entity, pk))?;
            record.fields.extend(fields);
            self.check_foreign_keys(&tables, entity, Some(pk), &record.fields)?;

            tables.table_mut(entity)?.insert(pk, record.clone());
            record
        };

        debug!("Updated {} {}", entity, pk);
        self.notify(ChangeEvent::RecordSaved(record.clone()));
        Ok(record)
    }

    /// Deletes a record along with its join rows. A record still referenced
    /// through a foreign key cannot be deleted. Cleared join rows are
    /// reported as removed members before the delete itself.
    pub fn delete(&self, entity: &EntityName, pk: Pk) -> Result<Record> {
        let mut cleared = Vec::new();
        let record = {
            let mut tables = self.write()?;
            if !tables.table(entity)?.contains_key(&pk) {
                return Err(CacheError::not_found(entity, pk));
            }

            for relation in self.registry.relations() {
                if !relation.kind.is_foreign_key() || &relation.related != entity {
                    continue;
                }
                let filter = Filter::eq(relation.field(), pk);
                let referenced = tables
                    .table(relation.owning())?
                    .values()
                    .any(|row| filter.matches(row));
                if referenced {
                    return Err(CacheError::InvalidRequest(format!(
                        "{} {} is still referenced by {}",
                        entity, pk, relation.id
                    )));
                }
            }

            let record = tables
                .table_mut(entity)?
                .remove(&pk)
                .ok_or_else(|| CacheError::not_found(entity, pk))?;

            for relation in self.registry.relations() {
                if relation.kind != RelationKind::ManyToMany {
                    continue;
                }
                let Some(links) = tables.links.get_mut(&relation.id) else {
                    continue;
                };
                for side in [Side::Forward, Side::Reverse] {
                    if relation.near_entity(side) != entity {
                        continue;
                    }
                    let mut members = Vec::new();
                    links.retain(|&(from, to)| {
                        let (near, far) = match side {
                            Side::Forward => (from, to),
                            Side::Reverse => (to, from),
                        };
                        if near == pk {
                            members.push(far);
                        }
                        near != pk
                    });
                    if !members.is_empty() {
                        cleared.push(AssociationChange {
                            relation: relation.id.clone(),
                            instance: record.clone(),
                            action: AssociationAction::MembersRemoved,
                            members,
                            reverse: side == Side::Reverse,
                        });
                    }
                }
            }
            record
        };

        debug!("Deleted {} {}", entity, pk);
        for change in cleared {
            self.notify(ChangeEvent::AssociationChanged(change));
        }
        self.notify(ChangeEvent::RecordDeleted(record.clone()));
        Ok(record)
    }

    /// Associates `members` with the record through the many-to-many name
    /// `name`. Returns the members that were not associated before.
    pub fn add_members(
        &self,
        entity: &EntityName,
        pk: Pk,
        name: &str,
        members: &[Pk],
    ) -> Result<Vec<Pk>> {
        self.edit_members(entity, pk, name, members, AssociationAction::MembersAdded)
    }

    /// Dissociates `members`. Returns the members that were associated.
    pub fn remove_members(
        &self,
        entity: &EntityName,
        pk: Pk,
        name: &str,
        members: &[Pk],
    ) -> Result<Vec<Pk>> {
        self.edit_members(entity, pk, name, members, AssociationAction::MembersRemoved)
    }

    fn edit_members(
        &self,
        entity: &EntityName,
        pk: Pk,
        name: &str,
        members: &[Pk],
        action: AssociationAction,
    ) -> Result<Vec<Pk>> {
        let (relation, side) = self.association(entity, name)?;

        let (instance, changed) = {
            let mut tables = self.write()?;
            let instance = tables
                .table(entity)?
                .get(&pk)
                .cloned()
                .ok_or_else(|| CacheError::not_found(entity, pk))?;

            let far = relation.far_entity(side);
            if action == AssociationAction::MembersAdded {
                if let Some(&missing) = members.iter().find(|&&m| !tables.exists(far, m)) {
                    return Err(CacheError::not_found(far, missing));
                }
            }

            let links = tables.links.entry(relation.id.clone()).or_default();
            let mut changed = Vec::new();
            for &member in members {
                let link = match side {
                    Side::Forward => (pk, member),
                    Side::Reverse => (member, pk),
                };
                let applied = match action {
                    AssociationAction::MembersAdded => links.insert(link),
                    AssociationAction::MembersRemoved => links.remove(&link),
                };
                if applied && !changed.contains(&member) {
                    changed.push(member);
                }
            }
            (instance, changed)
        };

        if !changed.is_empty() {
            debug!("{:?} {:?} on {} {} via {}", action, changed, entity, pk, name);
            self.notify(ChangeEvent::AssociationChanged(AssociationChange {
                relation: relation.id.clone(),
                instance,
                action,
                members: changed.clone(),
                reverse: side == Side::Reverse,
            }));
        }
        Ok(changed)
    }

    // == Reads ==
    /// Reads a row without counting it as a query.
    pub fn get(&self, entity: &EntityName, pk: Pk) -> Option<Record> {
        self.read()
            .ok()
            .and_then(|tables| tables.rows.get(entity)?.get(&pk).cloned())
    }

    /// Number of `BackingStore` queries served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::Relaxed);
    }

    fn count_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    fn association(&self, entity: &EntityName, name: &str) -> Result<(&Relation, Side)> {
        let (relation, side) = self.registry.resolve(entity, name)?;
        if relation.kind != RelationKind::ManyToMany {
            return Err(CacheError::InvalidRequest(format!(
                "{} on {} is not a many-to-many relation",
                name, entity
            )));
        }
        Ok((relation, side))
    }

    /// Validates the foreign-key columns of a row about to be written;
    /// `pk` is the row's own key, `None` for an insert.
    fn check_foreign_keys(
        &self,
        tables: &Tables,
        entity: &EntityName,
        pk: Option<Pk>,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        for (relation, side) in self.registry.subscriptions(entity) {
            if !relation.kind.is_foreign_key() || side != Side::Forward {
                continue;
            }
            let owner = match fields.get(relation.field()) {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_u64().ok_or_else(|| {
                    CacheError::InvalidRequest(format!(
                        "{} must be a primary key, got {}",
                        relation.id, value
                    ))
                })?),
            };

            match owner {
                None if !relation.nullable => {
                    return Err(CacheError::InvalidRequest(format!(
                        "{} may not be null",
                        relation.id
                    )));
                }
                Some(owner) if !tables.exists(&relation.related, owner) => {
                    return Err(CacheError::not_found(&relation.related, owner));
                }
                Some(owner) if relation.kind == RelationKind::OneToOne => {
                    let filter = Filter::eq(relation.field(), owner);
                    let taken = tables
                        .table(entity)?
                        .values()
                        .any(|row| filter.matches(row) && Some(row.pk) != pk);
                    if taken {
                        return Err(CacheError::InvalidRequest(format!(
                            "{} {} already has a {}",
                            relation.related, owner, relation.accessor
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn notify(&self, event: ChangeEvent) {
        let listeners: Vec<Arc<dyn ChangeListener>> = match self.listeners.write() {
            Ok(mut listeners) => {
                listeners.retain(|listener| listener.strong_count() > 0);
                listeners.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => return,
        };

        for listener in listeners {
            if let Err(err) = listener.on_change(&event) {
                warn!("Listener failed to handle {}: {}", event.kind(), err);
                let keys: Vec<String> = event
                    .cache_keys(&self.registry)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                debug!(?keys, "entries may stay stale until they expire");
            }
        }
    }
}

// == Backing Store Implementation ==
impl BackingStore for MemoryDatabase {
    fn fetch_by_key(&self, entity: &EntityName, pk: Pk) -> Result<Option<Record>> {
        self.count_query();
        Ok(self.read()?.table(entity)?.get(&pk).cloned())
    }

    fn fetch_filtered(
        &self,
        entity: &EntityName,
        filter: &Filter,
        ordering: &SortOrder,
    ) -> Result<Vec<Record>> {
        self.count_query();
        let mut records: Vec<Record> = self
            .read()?
            .table(entity)?
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        ordering.sort(&mut records);
        Ok(records)
    }

    fn fetch_association_members(
        &self,
        entity: &EntityName,
        pk: Pk,
        name: &str,
        ordering: &SortOrder,
    ) -> Result<Vec<Record>> {
        self.count_query();
        let (relation, side) = self.association(entity, name)?;

        let tables = self.read()?;
        let far = tables.table(relation.far_entity(side))?;
        let mut records: Vec<Record> = tables
            .links
            .get(&relation.id)
            .into_iter()
            .flatten()
            .filter_map(|&(from, to)| match side {
                Side::Forward if from == pk => Some(to),
                Side::Reverse if to == pk => Some(from),
                _ => None,
            })
            .filter_map(|member| far.get(&member).cloned())
            .collect();
        ordering.sort(&mut records);
        Ok(records)
    }
}
