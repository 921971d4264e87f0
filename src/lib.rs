//! relcache - relation-aware cache coherence
//!
//! Caches records and the relations between them (one-to-one, one-to-many,
//! many-to-many) in a key-value store, and keeps the cached relation
//! collections coherent as records are saved, deleted, or re-associated.
//!
//! The host declares its entity types in a [`Registry`], wires a
//! [`RelationCache`] over a [`CacheBackend`] and a [`BackingStore`], and
//! reports every committed mutation through [`ChangeListener`].

pub mod accessor;
pub mod api;
pub mod backing;
pub mod cache;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod keys;
pub mod layer;
pub mod loader;
pub mod model;
pub mod models;
pub mod notify;
pub mod registry;
pub mod sample;
pub mod shadow;
pub mod tasks;

pub use accessor::Related;
pub use api::AppState;
pub use backing::{BackingStore, Filter, MemoryDatabase};
pub use cache::{CacheBackend, CacheValue, MemoryCache};
pub use config::Config;
pub use error::{CacheError, ConfigurationError, Result, StoreError};
pub use layer::RelationCache;
pub use model::{EntityName, EntityType, Pk, Record, RelationDecl, RelationKind};
pub use notify::{AssociationAction, AssociationChange, ChangeEvent, ChangeListener};
pub use registry::Registry;
pub use tasks::spawn_cleanup_task;
