//! Relation Registry
//!
//! Registration happens in two phases. During startup a `RegistryBuilder`
//! collects entity types one at a time; a relation naming a type that has
//! not been registered yet is parked in the pending-lookup table and
//! resolved the moment that type arrives. `build` then freezes everything
//! into a read-only `Registry` shared by the cache layer at steady state.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{CacheError, ConfigurationError};
use crate::model::{
    validate_segment, EntityName, EntityType, Relation, RelationDecl, RelationId, RelationKind,
    Side, SortOrder,
};

type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Per-type settings kept after registration.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    pub ordering: SortOrder,
    pub ttl: Option<u64>,
}

/// One end of a relation, as reachable by name from an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub relation: RelationId,
    pub side: Side,
}

/// A relation waiting for its target type.
#[derive(Debug, Clone)]
struct PendingRelation {
    owner: EntityName,
    decl: RelationDecl,
}

/// Lookup outcome for a relation target.
enum TargetRef {
    Resolved(EntityName),
    Pending(EntityName),
}

// == Registry Builder ==
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: HashMap<EntityName, TypeInfo>,
    relations: BTreeMap<RelationId, Relation>,
    names: HashMap<EntityName, HashMap<String, Endpoint>>,
    subscriptions: HashMap<EntityName, Vec<Endpoint>>,
    pending: BTreeMap<EntityName, Vec<PendingRelation>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register Type ==
    /// Registers an entity type, resolves every relation whose endpoints
    /// are now both known, and parks the rest.
    pub fn register(&mut self, entity: EntityType) -> ConfigResult<EntityName> {
        let name = EntityName::parse(&entity.name)?;
        if self.types.contains_key(&name) {
            return Err(ConfigurationError::DuplicateType(name));
        }

        let mut fields = HashSet::new();
        let mut declared = Vec::with_capacity(entity.relations.len());
        for decl in entity.relations {
            validate_segment(&decl.field)?;
            if let Some(related_name) = &decl.related_name {
                validate_segment(related_name)?;
            }
            if !fields.insert(decl.field.clone()) {
                return Err(ConfigurationError::DuplicateName {
                    entity: name.clone(),
                    name: decl.field,
                });
            }
            let target = EntityName::resolve_reference(&decl.target, &name)?;
            declared.push((decl, target));
        }

        self.types.insert(
            name.clone(),
            TypeInfo {
                ordering: entity.ordering,
                ttl: entity.ttl,
            },
        );
        info!("Registered entity type {}", name);

        for (decl, target) in declared {
            match self.lookup(target, &name) {
                TargetRef::Resolved(target) => self.add_relation(&name, decl, target)?,
                TargetRef::Pending(target) => {
                    debug!(
                        "Deferring {}.{} until {} is registered",
                        name, decl.field, target
                    );
                    self.pending.entry(target).or_default().push(PendingRelation {
                        owner: name.clone(),
                        decl,
                    });
                }
            }
        }

        if let Some(waiting) = self.pending.remove(&name) {
            for pending in waiting {
                self.add_relation(&pending.owner, pending.decl, name.clone())?;
            }
        }

        Ok(name)
    }

    fn lookup(&self, target: EntityName, owner: &EntityName) -> TargetRef {
        if &target == owner || self.types.contains_key(&target) {
            TargetRef::Resolved(target)
        } else {
            TargetRef::Pending(target)
        }
    }

    // == Add Relation ==
    /// Resolves a declaration into a `Relation`, claims both of its names and
    /// subscribes its endpoints to change notifications. Adding the same
    /// relation twice is a no-op.
    fn add_relation(
        &mut self,
        owner: &EntityName,
        decl: RelationDecl,
        target: EntityName,
    ) -> ConfigResult<()> {
        let id = RelationId::new(owner.clone(), decl.field.clone());
        if self.relations.contains_key(&id) {
            debug!("Relation {} already registered, skipping", id);
            return Ok(());
        }

        let owner_info = self
            .types
            .get(owner)
            .ok_or_else(|| ConfigurationError::UnknownEntity(owner.clone()))?;
        let target_info = self
            .types
            .get(&target)
            .ok_or_else(|| ConfigurationError::UnknownEntity(target.clone()))?;

        let accessor = decl.related_name.unwrap_or_else(|| match decl.kind {
            RelationKind::OneToOne => owner.default_accessor(),
            RelationKind::OneToMany | RelationKind::ManyToMany => {
                format!("{}_set", owner.default_accessor())
            }
        });

        let relation = Relation {
            id: id.clone(),
            kind: decl.kind,
            related: target.clone(),
            accessor,
            nullable: decl.nullable,
            ordering: decl.order_by.unwrap_or_else(|| owner_info.ordering.clone()),
            forward_ordering: target_info.ordering.clone(),
        };

        // Check both names before claiming either so a failure leaves no trace.
        self.ensure_unclaimed(owner, relation.field())?;
        self.ensure_unclaimed(&target, &relation.accessor)?;
        if owner == &target && relation.field() == relation.accessor {
            return Err(ConfigurationError::DuplicateName {
                entity: target,
                name: relation.accessor,
            });
        }

        let forward = Endpoint {
            relation: id.clone(),
            side: Side::Forward,
        };
        let reverse = Endpoint {
            relation: id.clone(),
            side: Side::Reverse,
        };

        self.names
            .entry(owner.clone())
            .or_default()
            .insert(relation.field().to_string(), forward.clone());
        self.names
            .entry(target.clone())
            .or_default()
            .insert(relation.accessor.clone(), reverse.clone());

        // Foreign keys only change through saves of the owning side; both
        // ends of an association can change what the other end displays.
        self.subscriptions.entry(owner.clone()).or_default().push(forward);
        if relation.kind == RelationKind::ManyToMany {
            self.subscriptions.entry(target).or_default().push(reverse);
        }

        info!(
            "Registered {:?} relation {} (reverse accessor '{}' on {})",
            relation.kind, relation.id, relation.accessor, relation.related
        );
        self.relations.insert(id, relation);
        Ok(())
    }

    fn ensure_unclaimed(&self, entity: &EntityName, name: &str) -> ConfigResult<()> {
        let taken = self
            .names
            .get(entity)
            .is_some_and(|names| names.contains_key(name));
        if taken {
            Err(ConfigurationError::DuplicateName {
                entity: entity.clone(),
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    // == Build ==
    /// Freezes the registry. Fails if any relation still points at a type
    /// that was never registered.
    pub fn build(self) -> ConfigResult<Registry> {
        if let Some((target, waiting)) = self.pending.iter().next() {
            let first = &waiting[0];
            return Err(ConfigurationError::UnresolvedReference {
                owner: first.owner.clone(),
                field: first.decl.field.clone(),
                target: target.clone(),
            });
        }

        Ok(Registry {
            types: self.types,
            relations: self.relations,
            names: self.names,
            subscriptions: self.subscriptions,
        })
    }
}

// == Registry ==
/// Frozen relation registry, shared read-only after startup.
#[derive(Debug)]
pub struct Registry {
    types: HashMap<EntityName, TypeInfo>,
    relations: BTreeMap<RelationId, Relation>,
    names: HashMap<EntityName, HashMap<String, Endpoint>>,
    subscriptions: HashMap<EntityName, Vec<Endpoint>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn contains(&self, entity: &EntityName) -> bool {
        self.types.contains_key(entity)
    }

    pub fn type_info(&self, entity: &EntityName) -> Option<&TypeInfo> {
        self.types.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityName> {
        self.types.keys()
    }

    pub fn relation(&self, id: &RelationId) -> Option<&Relation> {
        self.relations.get(id)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Looks up `name` as seen from an instance of `entity`; forward field
    /// names and reverse accessor names are both valid.
    pub fn resolve(
        &self,
        entity: &EntityName,
        name: &str,
    ) -> Result<(&Relation, Side), CacheError> {
        if !self.contains(entity) {
            return Err(ConfigurationError::UnknownEntity(entity.clone()).into());
        }

        self.names
            .get(entity)
            .and_then(|names| names.get(name))
            .and_then(|endpoint| {
                self.relations
                    .get(&endpoint.relation)
                    .map(|relation| (relation, endpoint.side))
            })
            .ok_or_else(|| CacheError::UnknownRelation {
                entity: entity.clone(),
                name: name.to_string(),
            })
    }

    /// Relations a change to an `entity` record has to be propagated through.
    pub fn subscriptions<'a>(
        &'a self,
        entity: &EntityName,
    ) -> impl Iterator<Item = (&'a Relation, Side)> + 'a {
        self.subscriptions
            .get(entity)
            .into_iter()
            .flatten()
            .filter_map(|endpoint| {
                self.relations
                    .get(&endpoint.relation)
                    .map(|relation| (relation, endpoint.side))
            })
    }

    /// Relation names reachable from `entity`, sorted.
    pub fn relation_names(&self, entity: &EntityName) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .names
            .get(entity)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Per-type TTL overrides for the cache handle.
    pub fn ttl_overrides(&self) -> HashMap<EntityName, u64> {
        self.types
            .iter()
            .filter_map(|(name, info)| info.ttl.map(|ttl| (name.clone(), ttl)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> EntityName {
        EntityName::parse(s).unwrap()
    }

    fn person() -> EntityType {
        EntityType::new("library.Person").with_ordering(["name"])
    }

    fn book() -> EntityType {
        EntityType::new("library.Book")
            .with_ordering(["-rank", "title"])
            .with_relation(RelationDecl::foreign_key("author", "Person"))
            .with_relation(RelationDecl::many_to_many("editors", "Person").related_name("edited"))
    }

    #[test]
    fn test_forward_reference_is_deferred_then_resolved() {
        let mut builder = Registry::builder();
        builder.register(book()).unwrap();
        assert!(builder.relations.is_empty());
        assert_eq!(builder.pending[&name("library.Person")].len(), 2);

        builder.register(person()).unwrap();
        assert!(builder.pending.is_empty());
        assert_eq!(builder.relations.len(), 2);

        let registry = builder.build().unwrap();
        let (relation, side) = registry.resolve(&name("library.Person"), "book_set").unwrap();
        assert_eq!(side, Side::Reverse);
        assert_eq!(relation.kind, RelationKind::OneToMany);
        assert_eq!(relation.ordering, SortOrder::parse(["-rank", "title"]));
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let mut a = Registry::builder();
        a.register(book()).unwrap();
        a.register(person()).unwrap();
        let a = a.build().unwrap();

        let mut b = Registry::builder();
        b.register(person()).unwrap();
        b.register(book()).unwrap();
        let b = b.build().unwrap();

        assert_eq!(
            a.relations().cloned().collect::<Vec<_>>(),
            b.relations().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_names_resolve_on_both_sides() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        builder.register(book()).unwrap();
        let registry = builder.build().unwrap();

        let (editors, side) = registry.resolve(&name("library.Book"), "editors").unwrap();
        assert_eq!(side, Side::Forward);
        assert_eq!(editors.forward_ordering, SortOrder::parse(["name"]));

        let (edited, side) = registry.resolve(&name("library.Person"), "edited").unwrap();
        assert_eq!(side, Side::Reverse);
        assert_eq!(edited.id, editors.id);

        assert_eq!(
            registry.relation_names(&name("library.Person")),
            ["book_set", "edited"]
        );
    }

    #[test]
    fn test_unknown_relation() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        let registry = builder.build().unwrap();

        let err = registry
            .resolve(&name("library.Person"), "not_a_relation")
            .unwrap_err();
        assert!(matches!(err, CacheError::UnknownRelation { .. }));
    }

    #[test]
    fn test_unresolved_reference_fails_build() {
        let mut builder = Registry::builder();
        builder.register(book()).unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnresolvedReference { ref target, .. }
                if target == &name("library.Person")
        ));
    }

    #[test]
    fn test_duplicate_accessor_is_rejected() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        builder.register(book()).unwrap();

        let magazine = EntityType::new("library.Magazine")
            .with_relation(RelationDecl::foreign_key("editor", "Person").related_name("edited"));
        let err = builder.register(magazine).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateName {
                entity: name("library.Person"),
                name: "edited".into()
            }
        );
    }

    #[test]
    fn test_duplicate_type_is_rejected() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        assert_eq!(
            builder.register(person()).unwrap_err(),
            ConfigurationError::DuplicateType(name("library.Person"))
        );
    }

    #[test]
    fn test_adding_the_same_relation_twice_is_idempotent() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        builder.register(book()).unwrap();

        let decl = RelationDecl::foreign_key("author", "Person");
        builder
            .add_relation(&name("library.Book"), decl, name("library.Person"))
            .unwrap();

        let registry = builder.build().unwrap();
        assert_eq!(registry.relations().count(), 2);
        assert_eq!(registry.subscriptions(&name("library.Book")).count(), 2);
    }

    #[test]
    fn test_subscriptions() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        builder.register(book()).unwrap();
        let registry = builder.build().unwrap();

        // Person saves only matter to the association, not to the foreign key
        let person_subs: Vec<_> = registry
            .subscriptions(&name("library.Person"))
            .map(|(r, side)| (r.field().to_string(), side))
            .collect();
        assert_eq!(person_subs, [("editors".to_string(), Side::Reverse)]);
    }

    #[test]
    fn test_one_to_one_default_accessor_and_ttl() {
        let mut builder = Registry::builder();
        builder.register(person()).unwrap();
        builder.register(book()).unwrap();
        builder
            .register(
                EntityType::new("library.Volume")
                    .with_ttl(60)
                    .with_relation(RelationDecl::one_to_one("book", "Book")),
            )
            .unwrap();
        let registry = builder.build().unwrap();

        let (volume, side) = registry.resolve(&name("library.Book"), "volume").unwrap();
        assert_eq!(side, Side::Reverse);
        assert_eq!(volume.kind, RelationKind::OneToOne);
        assert_eq!(registry.ttl_overrides().get(&name("library.Volume")), Some(&60));

        let info = registry.type_info(&name("library.Book")).unwrap();
        assert_eq!(info.ttl, None);
        assert_eq!(info.ordering, SortOrder::parse(["-rank", "title"]));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let mut builder = Registry::builder();
        assert!(builder.register(EntityType::new("Person")).is_err());
        assert!(builder
            .register(
                EntityType::new("library.Book")
                    .with_relation(RelationDecl::foreign_key("au:thor", "Person"))
            )
            .is_err());
    }

    #[test]
    fn test_self_referential_relation() {
        let mut builder = Registry::builder();
        builder
            .register(
                EntityType::new("library.Person")
                    .with_relation(RelationDecl::foreign_key("mentor", "Person").nullable()),
            )
            .unwrap();
        let registry = builder.build().unwrap();

        let (relation, side) = registry.resolve(&name("library.Person"), "person_set").unwrap();
        assert_eq!(side, Side::Reverse);
        assert!(relation.nullable);
    }
}
