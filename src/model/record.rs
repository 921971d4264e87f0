//! Record snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::EntityName;

/// Primary key type shared by every entity.
pub type Pk = u64;

// == Record ==
/// Snapshot of one row of an entity type. The backing store owns the
/// authoritative state; the cache only ever holds copies of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity: EntityName,
    pub pk: Pk,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(entity: EntityName, pk: Pk) -> Self {
        Self {
            entity,
            pk,
            fields: Map::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Reads a foreign-key column. Missing, null and non-integer values all
    /// read as "no owner".
    pub fn foreign_key(&self, field: &str) -> Option<Pk> {
        self.fields.get(field).and_then(Value::as_u64)
    }

    /// Points a foreign-key column at `owner` (or null).
    pub fn set_foreign_key(&mut self, field: &str, owner: Option<Pk>) {
        let value = owner.map(Value::from).unwrap_or(Value::Null);
        self.fields.insert(field.to_string(), value);
    }

    pub fn is(&self, entity: &EntityName, pk: Pk) -> bool {
        self.pk == pk && &self.entity == entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book() -> EntityName {
        EntityName::parse("library.Book").unwrap()
    }

    #[test]
    fn test_foreign_key_reads() {
        let record = Record::new(book(), 1)
            .with("author", 7)
            .with("editor", Value::Null)
            .with("title", "Bleak House");

        assert_eq!(record.foreign_key("author"), Some(7));
        assert_eq!(record.foreign_key("editor"), None);
        assert_eq!(record.foreign_key("title"), None);
        assert_eq!(record.foreign_key("missing"), None);
    }

    #[test]
    fn test_set_foreign_key() {
        let mut record = Record::new(book(), 1);
        record.set_foreign_key("author", Some(3));
        assert_eq!(record.get("author"), Some(&json!(3)));
        record.set_foreign_key("author", None);
        assert_eq!(record.get("author"), Some(&Value::Null));
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record::new(book(), 2).with("rank", 1);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            json!({"entity": "library.Book", "pk": 2, "fields": {"rank": 1}})
        );
    }
}
