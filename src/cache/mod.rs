//! Cache Module
//!
//! The cache store seam plus an in-memory store with TTL expiration and
//! LRU eviction.

mod backend;
mod entry;
mod lru;
mod stats;
mod store;


pub use backend::{CacheBackend, CacheHandle, CacheValue};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheStore, MemoryCache};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
