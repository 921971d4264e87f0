//! Backing Store
//!
//! The authoritative store the cache sits in front of. The relation layer
//! only ever issues the three queries below.

mod memory;

pub use memory::MemoryDatabase;

use crate::error::Result;
use crate::model::{EntityName, Pk, Record, SortOrder};

/// Equality filter on a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub equals: Pk,
}

impl Filter {
    pub fn eq(field: &str, equals: Pk) -> Self {
        Self {
            field: field.to_string(),
            equals,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.foreign_key(&self.field) == Some(self.equals)
    }
}

pub trait BackingStore: Send + Sync {
    /// Returns the record, or `None` if it does not exist.
    fn fetch_by_key(&self, entity: &EntityName, pk: Pk) -> Result<Option<Record>>;

    /// Returns every `entity` record matching `filter`, sorted by `ordering`.
    fn fetch_filtered(
        &self,
        entity: &EntityName,
        filter: &Filter,
        ordering: &SortOrder,
    ) -> Result<Vec<Record>>;

    /// Returns the records associated with `(entity, pk)` through the
    /// many-to-many endpoint `name`, sorted by `ordering`.
    fn fetch_association_members(
        &self,
        entity: &EntityName,
        pk: Pk,
        name: &str,
        ordering: &SortOrder,
    ) -> Result<Vec<Record>>;
}
