//! Key Builder
//!
//! Maps `(entity type, pk[, relation name])` to cache key strings of the
//! form `app:Model:pk` and `app:Model:pk:name`. Entity and relation names
//! are validated at registration to never contain the `:` delimiter, so
//! two distinct inputs never produce the same key.

use std::fmt;

use crate::model::{EntityName, Pk};

pub const DELIMITER: char = ':';

// == Key ==
/// A cache key together with the entity type whose TTL applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    entity: EntityName,
    value: String,
}

impl Key {
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Key of the direct record cache.
pub fn record_key(entity: &EntityName, pk: Pk) -> Key {
    Key {
        entity: entity.clone(),
        value: format!(
            "{app}{d}{model}{d}{pk}",
            app = entity.app(),
            model = entity.model(),
            d = DELIMITER,
        ),
    }
}

/// Key of a relation cache entry reached through `name` from a record.
pub fn relation_key(entity: &EntityName, pk: Pk, name: &str) -> Key {
    let mut key = record_key(entity, pk);
    key.value.push(DELIMITER);
    key.value.push_str(name);
    key
}
