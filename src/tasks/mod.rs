//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//! The relation cache itself spawns nothing; these belong to the host.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
