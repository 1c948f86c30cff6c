//! Application Layer
//!
//! Session lifecycle managers and their background tasks.

pub mod admin_session_manager;
pub mod config;
pub mod keyed_lock;
pub mod purge;
pub mod reaper;
pub mod session_manager;

// Re-exports
pub use admin_session_manager::{AdminLogin, AdminSessionLifecycleManager};
pub use config::{AdminSessionConfig, RateLimitScope, RootCredentials, SessionConfig};
pub use purge::{PurgeReport, StorePurger};
pub use reaper::ReaperHandle;
pub use session_manager::{CacheStats, SessionLifecycleManager};
