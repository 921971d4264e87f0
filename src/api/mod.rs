//! API Module
//!
//! HTTP handlers and routing for the demo server. Writes go to the
//! in-memory database, which reports them to the relation cache; reads go
//! through the relation cache.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache and backing store statistics
//! - `GET /records/:entity/:pk` - Read a record
//! - `GET /records/:entity/:pk/:relation` - Follow a relation
//! - `POST /records/:entity` - Create a record
//! - `PUT /records/:entity/:pk` - Update a record
//! - `DELETE /records/:entity/:pk` - Delete a record
//! - `POST /records/:entity/:pk/:relation/add` - Associate members
//! - `POST /records/:entity/:pk/:relation/remove` - Dissociate members

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
