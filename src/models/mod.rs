//! Request and Response models for the demo server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{MembersRequest, WriteRecordRequest};
pub use responses::{
    DeleteResponse, ErrorResponse, HealthResponse, MembersResponse, RecordResponse,
    RelatedResponse, StatsResponse,
};
