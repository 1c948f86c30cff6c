//! Repository Traits
//!
//! Interfaces for session persistence. Implementations are in the
//! infrastructure layer.

use chrono::{DateTime, Utc};
use kernel::id::{AdminId, AdminSessionId, SessionId, UserId};
use serde::Serialize;

use crate::domain::entity::{
    admin_session::{AdminSession, NewAdminSession},
    session::{NewSession, Session},
};
use crate::error::SessionResult;

/// Store-wide session counters for dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub total: u64,
    /// Refresh window still open
    pub active: u64,
    pub inactive: u64,
}

/// User session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Persist a new session and return it with its assigned id.
    ///
    /// Fails if either token collides with an existing record.
    async fn save(&self, session: NewSession) -> SessionResult<Session>;

    /// Find session by access token
    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<Session>>;

    /// Find session by refresh token
    async fn get_by_refresh_token(&self, token: &str) -> SessionResult<Option<Session>>;

    /// Replace the stored record with the same id
    async fn update(&self, session: &Session) -> SessionResult<Session>;

    /// Delete by id, returning whether a record existed
    async fn delete(&self, id: SessionId) -> SessionResult<bool>;

    /// Sessions of a user whose refresh window is still open at `now`
    async fn get_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<Session>>;

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts>;

    /// Delete every record whose refresh window has ended
    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64>;
}

/// Admin session repository trait
#[trait_variant::make(AdminSessionRepository: Send)]
pub trait LocalAdminSessionRepository {
    async fn save(&self, session: NewAdminSession) -> SessionResult<AdminSession>;

    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<AdminSession>>;

    async fn update(&self, session: &AdminSession) -> SessionResult<AdminSession>;

    async fn delete(&self, id: AdminSessionId) -> SessionResult<bool>;

    /// Unexpired sessions of an admin at `now`
    async fn get_active_by_admin_id(
        &self,
        admin_id: &AdminId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<AdminSession>>;

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts>;

    /// Delete every record whose access window has ended
    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64>;
}

/// Resolves admin credentials to an admin id.
///
/// Password hashing and the admin directory live outside this crate.
#[trait_variant::make(AdminCredentialVerifier: Send)]
pub trait LocalAdminCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> SessionResult<Option<AdminId>>;
}
