//! Request DTOs for the demo server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::Pk;

/// Request body for creating or updating a record
/// (POST /records/:entity, PUT /records/:entity/:pk)
///
/// # Fields
/// - `fields`: Column values; foreign keys are primary keys or null
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRecordRequest {
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl WriteRecordRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.fields.contains_key("pk") {
            return Some("The primary key cannot be written".to_string());
        }
        if let Some(name) = self.fields.keys().find(|name| name.is_empty()) {
            return Some(format!("Invalid field name '{}'", name));
        }
        None
    }
}

/// Request body for editing a many-to-many association
/// (POST /records/:entity/:pk/:relation/add and .../remove)
#[derive(Debug, Clone, Deserialize)]
pub struct MembersRequest {
    /// Primary keys of the records on the other side
    pub members: Vec<Pk>,
}

impl MembersRequest {
    pub fn validate(&self) -> Option<String> {
        if self.members.is_empty() {
            return Some("Members cannot be empty".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_request_deserialize() {
        let json = r#"{"fields": {"title": "Bleak House", "author": 1}}"#;
        let req: WriteRecordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.fields["title"], "Bleak House");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_write_request_defaults_to_no_fields() {
        let req: WriteRecordRequest = serde_json::from_str("{}").unwrap();
        assert!(req.fields.is_empty());
    }

    #[test]
    fn test_validate_rejects_pk() {
        let req: WriteRecordRequest = serde_json::from_str(r#"{"fields": {"pk": 3}}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_empty_members() {
        let req = MembersRequest { members: vec![] };
        assert!(req.validate().is_some());

        let req = MembersRequest { members: vec![1, 2] };
        assert!(req.validate().is_none());
    }
}
