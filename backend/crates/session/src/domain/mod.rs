//! Domain Layer
//!
//! Contains entities, value objects, and the store and cache traits.

pub mod cache;
pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use cache::{AdminSessionCache, SessionCache};
pub use entity::{
    admin_session::{AdminSession, NewAdminSession, RootSession},
    session::{NewSession, Session},
};
pub use repository::{
    AdminCredentialVerifier, AdminSessionRepository, SessionCounts, SessionRepository,
};
pub use value_object::{expiry_policy::ExpiryPolicy, token::TokenPair};
