//! Response DTOs for the demo server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::accessor::Related;
use crate::cache::CacheStats;
use crate::model::{Pk, Record};

/// Response body for single record reads and writes
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub record: Record,
}

impl RecordResponse {
    pub fn new(record: Record) -> Self {
        Self { record }
    }
}

/// Response body for GET /records/:entity/:pk/:relation
#[derive(Debug, Clone, Serialize)]
pub struct RelatedResponse {
    /// The relation name that was followed
    pub relation: String,
    #[serde(flatten)]
    pub related: Related,
}

impl RelatedResponse {
    pub fn new(relation: impl Into<String>, related: Related) -> Self {
        Self {
            relation: relation.into(),
            related,
        }
    }
}

/// Response body for association edits
#[derive(Debug, Clone, Serialize)]
pub struct MembersResponse {
    /// Success message
    pub message: String,
    /// Members whose association actually changed
    pub changed: Vec<Pk>,
}

impl MembersResponse {
    pub fn new(relation: &str, changed: Vec<Pk>) -> Self {
        Self {
            message: format!("{} member(s) of '{}' changed", changed.len(), relation),
            changed,
        }
    }
}

/// Response body for DELETE /records/:entity/:pk
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The record as it was before deletion
    pub record: Record,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(record: Record) -> Self {
        Self {
            message: format!("{} {} deleted successfully", record.entity, record.pk),
            record,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of accepted cache writes
    pub writes: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Queries served by the backing store
    pub backing_queries: u64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: &CacheStats, backing_queries: u64) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            backing_queries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityName;
    use serde_json::json;

    fn book() -> Record {
        Record::new(EntityName::parse("library.Book").unwrap(), 4).with("title", "Dombey and Son")
    }

    #[test]
    fn test_related_response_shape() {
        let resp = RelatedResponse::new("book_set", Related::Many(vec![book()]));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["relation"], "book_set");
        assert_eq!(json["kind"], "many");
        assert_eq!(json["value"][0]["pk"], 4);
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new(book());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("library.Book 4 deleted"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new(&stats, 3);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.backing_queries, 3);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new(&CacheStats::default(), 0);
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_members_response_message() {
        let resp = MembersResponse::new("editors", vec![2, 3]);
        assert_eq!(serde_json::to_value(&resp).unwrap()["changed"], json!([2, 3]));
        assert!(resp.message.contains("2 member(s)"));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
