//! Infrastructure Layer
//!
//! Store and cache implementations.

pub mod memory_cache;
pub mod memory_store;
pub mod postgres;

pub use memory_cache::{MemoryAdminSessionCache, MemorySessionCache};
pub use memory_store::{MemoryAdminSessionRepository, MemorySessionRepository};
pub use postgres::PgSessionRepository;
