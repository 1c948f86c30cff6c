//! Session Lifecycle Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, store and cache traits
//! - `application/` - Lifecycle managers, reaper, store purge
//! - `infra/` - In-memory and PostgreSQL implementations
//!
//! ## Features
//! - Access/refresh token pairs with rotation on refresh
//! - Inactivity timeout and absolute lifespan independent of token TTLs
//! - Per-user session cap and rate-limited creation
//! - Write-through cache indexed by access token, refresh token and id
//! - Fixed-lifetime admin sessions with a root credential bypass
//!
//! ## Consistency Model
//! - The store is authoritative; the cache changes only after the store did
//! - Operations on one session are serialized; unrelated users run in parallel
//! - The cache reaper only evicts sessions expired in every dimension

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::{
    AdminLogin, AdminSessionConfig, AdminSessionLifecycleManager, CacheStats, SessionConfig,
    SessionLifecycleManager, StorePurger,
};
pub use error::{SessionError, SessionResult};
pub use infra::postgres::PgSessionRepository;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
}

pub mod store {
    pub use crate::infra::memory_store::{MemoryAdminSessionRepository, MemorySessionRepository};
    pub use crate::infra::postgres::PgSessionRepository as SessionStore;
}

#[cfg(test)]
mod tests;
