//! Cache Traits
//!
//! In-process lookaside caches in front of the session stores. The cache is
//! never authoritative; every mutation reaches it only after the store
//! accepted the change.

use chrono::{DateTime, Utc};
use kernel::id::{AdminSessionId, SessionId};

use crate::domain::entity::{admin_session::AdminSession, session::Session};
use crate::domain::value_object::expiry_policy::ExpiryPolicy;

/// User session cache, indexed by access token, refresh token and id
#[trait_variant::make(SessionCache: Send)]
pub trait LocalSessionCache {
    /// Insert or replace, dropping stale index entries for the same id
    async fn put(&self, session: Session);

    async fn get_by_access_token(&self, token: &str) -> Option<Session>;

    async fn get_by_refresh_token(&self, token: &str) -> Option<Session>;

    async fn get_by_id(&self, id: SessionId) -> Option<Session>;

    /// Remove every index entry of the given session
    async fn remove(&self, session: &Session);

    /// Evict fully expired sessions, returning how many were dropped
    async fn sweep(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> usize;

    async fn len(&self) -> usize;
}

/// Admin session cache, indexed by access token and id
#[trait_variant::make(AdminSessionCache: Send)]
pub trait LocalAdminSessionCache {
    async fn put(&self, session: AdminSession);

    async fn get_by_access_token(&self, token: &str) -> Option<AdminSession>;

    async fn get_by_id(&self, id: AdminSessionId) -> Option<AdminSession>;

    async fn remove(&self, session: &AdminSession);

    /// Evict sessions expired at `now`
    async fn sweep(&self, now: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}
