//! Data Model
//!
//! Entity types, records, relations and collection ordering.

mod entity;
mod ordering;
mod record;
mod relation;

pub use entity::{validate_segment, EntityName, EntityType};
pub use ordering::{OrderKey, SortOrder};
pub use record::{Pk, Record};
pub use relation::{Relation, RelationDecl, RelationId, RelationKind, Side};
