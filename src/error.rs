//! Error types for the relation cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::model::{EntityName, Pk};
use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Errors raised by a cache store.
///
/// `KeyNotFound` and `Expired` are plain misses; every other variant is a
/// transport failure that the relation layer swallows (fail-open).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Key has expired
    #[error("Key expired: {0}")]
    Expired(String),

    /// Key or value rejected by the store
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache is full and eviction failed
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Internal store failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// True when the error only means "nothing usable is stored at this key".
    pub fn is_miss(&self) -> bool {
        matches!(self, StoreError::KeyNotFound(_) | StoreError::Expired(_))
    }
}

// == Configuration Error Enum ==
/// Registration-time errors. These are fatal: ignoring one would let two
/// relations overwrite each other's cache entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("entity type {0} is already registered")]
    DuplicateType(EntityName),

    #[error("relation name '{name}' is claimed twice on {entity}")]
    DuplicateName { entity: EntityName, name: String },

    #[error("relation {owner}.{field} references {target}, which was never registered")]
    UnresolvedReference {
        owner: EntityName,
        field: String,
        target: EntityName,
    },

    #[error("unknown entity type {0}")]
    UnknownEntity(EntityName),
}

// == Cache Error Enum ==
/// Unified error type for the relation cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The record is confirmed absent (sentinel hit or backing-store miss)
    #[error("{entity} matching {lookup} does not exist")]
    NotFound { entity: EntityName, lookup: String },

    /// The relation name is not registered for the type
    #[error("unknown relation '{name}' on {entity}")]
    UnknownRelation { entity: EntityName, name: String },

    /// Invalid schema declaration
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Backing store failure
    #[error("backing store error: {0}")]
    Backing(String),

    /// Cache store failure that could not be swallowed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Absence of the `entity` record with primary key `pk`.
    pub fn not_found(entity: &EntityName, pk: Pk) -> Self {
        Self::not_found_by(entity, format!("pk={}", pk))
    }

    /// Absence of an `entity` record matched some other way, e.g. `book=3`.
    pub fn not_found_by(entity: &EntityName, lookup: impl Into<String>) -> Self {
        CacheError::NotFound {
            entity: entity.clone(),
            lookup: lookup.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::UnknownRelation { .. } => StatusCode::BAD_REQUEST,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Configuration(ConfigurationError::UnknownEntity(_)) => {
                StatusCode::NOT_FOUND
            }
            CacheError::Store(StoreError::CacheFull(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Configuration(_) | CacheError::Backing(_) | CacheError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the relation cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_miss_classification() {
        assert!(StoreError::KeyNotFound("k".into()).is_miss());
        assert!(StoreError::Expired("k".into()).is_miss());
        assert!(!StoreError::Internal("boom".into()).is_miss());
        assert!(!StoreError::InvalidRequest("too big".into()).is_miss());
    }

    #[test]
    fn test_status_codes() {
        let entity = EntityName::parse("library.Book").unwrap();
        assert_eq!(
            CacheError::not_found(&entity, 3).to_string(),
            "library.Book matching pk=3 does not exist"
        );
        let resp = CacheError::not_found(&entity, 3).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = CacheError::UnknownRelation {
            entity,
            name: "nope".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::Store(StoreError::CacheFull("full".into())).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
