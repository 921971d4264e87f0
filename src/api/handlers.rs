//! API Handlers
//!
//! HTTP request handlers for each demo server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::accessor::Related;
use crate::backing::MemoryDatabase;
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::error::{CacheError, ConfigurationError, Result, StoreError};
use crate::layer::RelationCache;
use crate::model::{EntityName, Pk};
use crate::models::{
    DeleteResponse, HealthResponse, MembersRequest, MembersResponse, RecordResponse,
    RelatedResponse, StatsResponse, WriteRecordRequest,
};
use crate::registry::Registry;
use crate::sample::Library;

/// Application state shared across all handlers.
///
/// The database and the relation cache are synchronous and lock
/// `std::sync::RwLock`s. Writes fan out through every affected relation, so
/// write handlers run them on the blocking pool via [`run_blocking`]; reads
/// are single cache lookups and stay on the async workers.
#[derive(Clone)]
pub struct AppState {
    /// Read path: records and relations, cache first
    pub relations: Arc<RelationCache>,
    /// Write path and backing store
    pub db: Arc<MemoryDatabase>,
    /// The cache store behind `relations`, for stats and cleanup
    pub store: MemoryCache,
}

impl AppState {
    /// Wires a database and a relation cache over `store` and subscribes
    /// the cache to the database's change events.
    pub fn new(registry: Registry, store: MemoryCache) -> Self {
        let registry = Arc::new(registry);
        let db = Arc::new(MemoryDatabase::new(registry.clone()));
        let relations = Arc::new(RelationCache::new(
            registry,
            Arc::new(store.clone()),
            db.clone(),
        ));
        db.subscribe(&relations);

        Self {
            relations,
            db,
            store,
        }
    }

    /// Creates the state for the sample library schema from configuration.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigurationError> {
        let library = Library::build()?;
        let store = MemoryCache::new(config.max_entries, config.default_ttl);
        Ok(Self::new(library.registry, store))
    }

    /// Parses an entity name from the path and checks it is registered.
    fn entity(&self, name: &str) -> Result<EntityName> {
        let entity = EntityName::parse(name).map_err(|err| match err {
            ConfigurationError::InvalidName { .. } => CacheError::InvalidRequest(err.to_string()),
            other => other.into(),
        })?;
        if !self.relations.registry().contains(&entity) {
            return Err(ConfigurationError::UnknownEntity(entity).into());
        }
        Ok(entity)
    }
}

/// Runs a call into the synchronous core on the blocking thread pool.
async fn run_blocking<T, F>(call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|err| StoreError::Internal(format!("write task failed: {}", err)))?
}

/// Handler for GET /records/:entity/:pk
pub async fn get_record_handler(
    State(state): State<AppState>,
    Path((entity, pk)): Path<(String, Pk)>,
) -> Result<Json<RecordResponse>> {
    let entity = state.entity(&entity)?;
    let record = state.relations.get(&entity, pk)?;

    Ok(Json(RecordResponse::new(record)))
}

/// Handler for GET /records/:entity/:pk/:relation
pub async fn get_related_handler(
    State(state): State<AppState>,
    Path((entity, pk, relation)): Path<(String, Pk, String)>,
) -> Result<Json<RelatedResponse>> {
    let entity = state.entity(&entity)?;
    let record = state.relations.get(&entity, pk)?;
    let related: Related = state.relations.get_related(&record, &relation)?;

    Ok(Json(RelatedResponse::new(relation, related)))
}

/// Handler for POST /records/:entity
pub async fn create_record_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(req): Json<WriteRecordRequest>,
) -> Result<(StatusCode, Json<RecordResponse>)> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entity = state.entity(&entity)?;
    let db = state.db.clone();
    let record = run_blocking(move || db.insert(&entity, req.fields)).await?;

    Ok((StatusCode::CREATED, Json(RecordResponse::new(record))))
}

/// Handler for PUT /records/:entity/:pk
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path((entity, pk)): Path<(String, Pk)>,
    Json(req): Json<WriteRecordRequest>,
) -> Result<Json<RecordResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entity = state.entity(&entity)?;
    let db = state.db.clone();
    let record = run_blocking(move || db.update(&entity, pk, req.fields)).await?;

    Ok(Json(RecordResponse::new(record)))
}

/// Handler for DELETE /records/:entity/:pk
pub async fn delete_record_handler(
    State(state): State<AppState>,
    Path((entity, pk)): Path<(String, Pk)>,
) -> Result<Json<DeleteResponse>> {
    let entity = state.entity(&entity)?;
    let db = state.db.clone();
    let record = run_blocking(move || db.delete(&entity, pk)).await?;

    Ok(Json(DeleteResponse::new(record)))
}

/// Handler for POST /records/:entity/:pk/:relation/add
pub async fn add_members_handler(
    State(state): State<AppState>,
    Path((entity, pk, relation)): Path<(String, Pk, String)>,
    Json(req): Json<MembersRequest>,
) -> Result<Json<MembersResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entity = state.entity(&entity)?;
    let db = state.db.clone();
    let name = relation.clone();
    let changed =
        run_blocking(move || db.add_members(&entity, pk, &name, &req.members)).await?;

    Ok(Json(MembersResponse::new(&relation, changed)))
}

/// Handler for POST /records/:entity/:pk/:relation/remove
pub async fn remove_members_handler(
    State(state): State<AppState>,
    Path((entity, pk, relation)): Path<(String, Pk, String)>,
    Json(req): Json<MembersRequest>,
) -> Result<Json<MembersResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entity = state.entity(&entity)?;
    let db = state.db.clone();
    let name = relation.clone();
    let changed =
        run_blocking(move || db.remove_members(&entity, pk, &name, &req.members)).await?;

    Ok(Json(MembersResponse::new(&relation, changed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.store.stats()?;

    Ok(Json(StatsResponse::new(&stats, state.db.query_count())))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
