//! Relation declarations and resolved relation descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{EntityName, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationKind {
    /// True for relations stored as a foreign-key column on the owning type.
    pub fn is_foreign_key(self) -> bool {
        !matches!(self, RelationKind::ManyToMany)
    }
}

// == Relation Declaration ==
/// A relation as written on the owning (declaring) type. The target is a
/// type name that may not be registered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    pub kind: RelationKind,
    pub field: String,
    pub target: String,
    pub related_name: Option<String>,
    pub nullable: bool,
    pub order_by: Option<SortOrder>,
}

impl RelationDecl {
    fn new(kind: RelationKind, field: &str, target: &str) -> Self {
        Self {
            kind,
            field: field.to_string(),
            target: target.to_string(),
            related_name: None,
            nullable: false,
            order_by: None,
        }
    }

    /// Foreign key `field` on the owning type; the target sees a collection.
    pub fn foreign_key(field: &str, target: &str) -> Self {
        Self::new(RelationKind::OneToMany, field, target)
    }

    /// Unique foreign key `field`; the target sees a single record.
    pub fn one_to_one(field: &str, target: &str) -> Self {
        Self::new(RelationKind::OneToOne, field, target)
    }

    /// Association stored in a join table; both sides see collections.
    pub fn many_to_many(field: &str, target: &str) -> Self {
        Self::new(RelationKind::ManyToMany, field, target)
    }

    /// Reverse accessor name used from the target type.
    pub fn related_name(mut self, name: &str) -> Self {
        self.related_name = Some(name.to_string());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Ordering of the reverse collection, overriding the owning type's default.
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.order_by = Some(SortOrder::parse(fields));
        self
    }
}

// == Relation Id ==
/// Identity of a relation: the declaring type and its field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId {
    pub owning: EntityName,
    pub field: String,
}

impl RelationId {
    pub fn new(owning: EntityName, field: impl Into<String>) -> Self {
        Self {
            owning,
            field: field.into(),
        }
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owning, self.field)
    }
}

/// Which end of a relation a name or an instance sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The declaring type, reached through `field`
    Forward,
    /// The target type, reached through `accessor`
    Reverse,
}

// == Relation ==
/// A resolved relation. Created once at registration, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub id: RelationId,
    pub kind: RelationKind,
    pub related: EntityName,
    pub accessor: String,
    pub nullable: bool,
    /// Ordering of owning-type records in the reverse collection
    pub ordering: SortOrder,
    /// Ordering of related-type records in the forward many-to-many list
    pub forward_ordering: SortOrder,
}

impl Relation {
    pub fn owning(&self) -> &EntityName {
        &self.id.owning
    }

    pub fn field(&self) -> &str {
        &self.id.field
    }

    /// Entity type seen at the far end when standing on `side`.
    pub fn far_entity(&self, side: Side) -> &EntityName {
        match side {
            Side::Forward => &self.related,
            Side::Reverse => self.owning(),
        }
    }

    /// Type the instance belongs to when standing on `side`.
    pub fn near_entity(&self, side: Side) -> &EntityName {
        match side {
            Side::Forward => self.owning(),
            Side::Reverse => &self.related,
        }
    }

    /// Name of the relation as seen from `side`.
    pub fn name_on(&self, side: Side) -> &str {
        match side {
            Side::Forward => self.field(),
            Side::Reverse => &self.accessor,
        }
    }

    /// Ordering of the collection held by an instance on `side`.
    pub fn ordering_on(&self, side: Side) -> &SortOrder {
        match side {
            Side::Forward => &self.forward_ordering,
            Side::Reverse => &self.ordering,
        }
    }
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Forward => Side::Reverse,
            Side::Reverse => Side::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editors() -> Relation {
        let book = EntityName::parse("library.Book").unwrap();
        Relation {
            id: RelationId::new(book, "editors"),
            kind: RelationKind::ManyToMany,
            related: EntityName::parse("library.Person").unwrap(),
            accessor: "edited".into(),
            nullable: false,
            ordering: SortOrder::parse(["-rank", "title"]),
            forward_ordering: SortOrder::parse(["name"]),
        }
    }

    #[test]
    fn test_decl_builders() {
        let decl = RelationDecl::foreign_key("author", "Person")
            .related_name("books")
            .nullable();
        assert_eq!(decl.kind, RelationKind::OneToMany);
        assert_eq!(decl.related_name.as_deref(), Some("books"));
        assert!(decl.nullable);
    }

    #[test]
    fn test_sides() {
        let rel = editors();
        assert_eq!(rel.name_on(Side::Forward), "editors");
        assert_eq!(rel.name_on(Side::Reverse), "edited");
        assert_eq!(rel.far_entity(Side::Forward).model(), "Person");
        assert_eq!(rel.near_entity(Side::Forward).model(), "Book");
        assert_eq!(rel.ordering_on(Side::Forward), &SortOrder::parse(["name"]));
        assert_eq!(Side::Forward.opposite(), Side::Reverse);
    }

    #[test]
    fn test_relation_id_display() {
        assert_eq!(editors().id.to_string(), "library.Book.editors");
    }
}
