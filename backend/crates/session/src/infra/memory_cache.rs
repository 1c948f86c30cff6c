//! In-memory session caches
//!
//! A single `RwLock` guards all indexes of a cache so a record is never
//! visible through one index and missing from another.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kernel::id::{AdminSessionId, SessionId};
use parking_lot::RwLock;

use crate::domain::cache::{AdminSessionCache, SessionCache};
use crate::domain::entity::{admin_session::AdminSession, session::Session};
use crate::domain::value_object::expiry_policy::ExpiryPolicy;

#[derive(Default)]
struct SessionIndexes {
    by_access_token: HashMap<String, Session>,
    /// refresh token -> access token
    by_refresh_token: HashMap<String, String>,
    /// id -> access token
    by_id: HashMap<SessionId, String>,
}

impl SessionIndexes {
    fn insert(&mut self, session: Session) {
        if let Some(stale_access) = self.by_id.get(&session.id).cloned() {
            if let Some(stale) = self.by_access_token.remove(&stale_access) {
                self.by_refresh_token.remove(&stale.refresh_token);
            }
        }
        self.by_refresh_token
            .insert(session.refresh_token.clone(), session.access_token.clone());
        self.by_id.insert(session.id, session.access_token.clone());
        self.by_access_token
            .insert(session.access_token.clone(), session);
    }

    fn remove_by_id(&mut self, id: SessionId) -> Option<Session> {
        let access = self.by_id.remove(&id)?;
        let session = self.by_access_token.remove(&access)?;
        self.by_refresh_token.remove(&session.refresh_token);
        Some(session)
    }
}

/// Three-index cache for user sessions
#[derive(Default)]
pub struct MemorySessionCache {
    inner: RwLock<SessionIndexes>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    async fn put(&self, session: Session) {
        self.inner.write().insert(session);
    }

    async fn get_by_access_token(&self, token: &str) -> Option<Session> {
        self.inner.read().by_access_token.get(token).cloned()
    }

    async fn get_by_refresh_token(&self, token: &str) -> Option<Session> {
        let inner = self.inner.read();
        let access = inner.by_refresh_token.get(token)?;
        inner.by_access_token.get(access).cloned()
    }

    async fn get_by_id(&self, id: SessionId) -> Option<Session> {
        let inner = self.inner.read();
        let access = inner.by_id.get(&id)?;
        inner.by_access_token.get(access).cloned()
    }

    async fn remove(&self, session: &Session) {
        let mut inner = self.inner.write();
        inner.remove_by_id(session.id);
        // Entries left behind under the caller's copy of the tokens
        if let Some(access) = inner.by_refresh_token.remove(&session.refresh_token) {
            inner.by_access_token.remove(&access);
        }
        if let Some(orphan) = inner.by_access_token.remove(&session.access_token) {
            inner.by_refresh_token.remove(&orphan.refresh_token);
            inner.by_id.remove(&orphan.id);
        }
    }

    async fn sweep(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> usize {
        let candidates: Vec<SessionId> = {
            let inner = self.inner.read();
            inner
                .by_access_token
                .values()
                .filter(|s| s.is_fully_expired(now, policy))
                .map(|s| s.id)
                .collect()
        };

        if candidates.is_empty() {
            return 0;
        }

        let mut inner = self.inner.write();
        let mut evicted = 0;
        for id in candidates {
            // Re-check: the record may have been refreshed since the snapshot
            let still_expired = inner
                .by_id
                .get(&id)
                .and_then(|access| inner.by_access_token.get(access))
                .is_some_and(|s| s.is_fully_expired(now, policy));
            if still_expired && inner.remove_by_id(id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    async fn len(&self) -> usize {
        self.inner.read().by_access_token.len()
    }
}

#[derive(Default)]
struct AdminIndexes {
    by_access_token: HashMap<String, AdminSession>,
    by_id: HashMap<AdminSessionId, String>,
}

impl AdminIndexes {
    fn remove_by_id(&mut self, id: AdminSessionId) -> Option<AdminSession> {
        let access = self.by_id.remove(&id)?;
        self.by_access_token.remove(&access)
    }
}

/// Two-index cache for admin sessions
#[derive(Default)]
pub struct MemoryAdminSessionCache {
    inner: RwLock<AdminIndexes>,
}

impl MemoryAdminSessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdminSessionCache for MemoryAdminSessionCache {
    async fn put(&self, session: AdminSession) {
        let mut inner = self.inner.write();
        if let Some(stale) = inner.by_id.get(&session.id).cloned() {
            inner.by_access_token.remove(&stale);
        }
        inner.by_id.insert(session.id, session.access_token.clone());
        inner
            .by_access_token
            .insert(session.access_token.clone(), session);
    }

    async fn get_by_access_token(&self, token: &str) -> Option<AdminSession> {
        self.inner.read().by_access_token.get(token).cloned()
    }

    async fn get_by_id(&self, id: AdminSessionId) -> Option<AdminSession> {
        let inner = self.inner.read();
        let access = inner.by_id.get(&id)?;
        inner.by_access_token.get(access).cloned()
    }

    async fn remove(&self, session: &AdminSession) {
        let mut inner = self.inner.write();
        inner.remove_by_id(session.id);
        if let Some(orphan) = inner.by_access_token.remove(&session.access_token) {
            inner.by_id.remove(&orphan.id);
        }
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let candidates: Vec<AdminSessionId> = {
            let inner = self.inner.read();
            inner
                .by_access_token
                .values()
                .filter(|s| s.is_expired(now))
                .map(|s| s.id)
                .collect()
        };

        if candidates.is_empty() {
            return 0;
        }

        let mut inner = self.inner.write();
        let mut evicted = 0;
        for id in candidates {
            let still_expired = inner
                .by_id
                .get(&id)
                .and_then(|access| inner.by_access_token.get(access))
                .is_some_and(|s| s.is_expired(now));
            if still_expired && inner.remove_by_id(id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    async fn len(&self) -> usize {
        self.inner.read().by_access_token.len()
    }
}
