//! In-memory session stores
//!
//! Process-local implementations of the repository traits for tests and
//! single-node deployments. Token uniqueness is enforced on every write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kernel::id::{AdminId, AdminSessionId, SessionId, UserId};
use parking_lot::RwLock;

use crate::domain::entity::{
    admin_session::{AdminSession, NewAdminSession},
    session::{NewSession, Session},
};
use crate::domain::repository::{AdminSessionRepository, SessionCounts, SessionRepository};
use crate::error::{SessionError, SessionResult};

/// In-memory user session repository
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn token_taken(
        sessions: &HashMap<SessionId, Session>,
        except: Option<SessionId>,
        access: &str,
        refresh: &str,
    ) -> bool {
        sessions.values().any(|s| {
            Some(s.id) != except
                && (s.access_token == access
                    || s.refresh_token == refresh
                    || s.access_token == refresh
                    || s.refresh_token == access)
        })
    }
}

impl SessionRepository for MemorySessionRepository {
    async fn save(&self, session: NewSession) -> SessionResult<Session> {
        let mut sessions = self.sessions.write();
        if Self::token_taken(&sessions, None, &session.access_token, &session.refresh_token) {
            return Err(SessionError::internal("Duplicate session token"));
        }

        let session = session.with_id(SessionId::new());
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.access_token == token)
            .cloned())
    }

    async fn get_by_refresh_token(&self, token: &str) -> SessionResult<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.refresh_token == token)
            .cloned())
    }

    async fn update(&self, session: &Session) -> SessionResult<Session> {
        let mut sessions = self.sessions.write();
        if !sessions.contains_key(&session.id) {
            return Err(SessionError::SessionNotFound);
        }
        if Self::token_taken(
            &sessions,
            Some(session.id),
            &session.access_token,
            &session.refresh_token,
        ) {
            return Err(SessionError::internal("Duplicate session token"));
        }

        sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn delete(&self, id: SessionId) -> SessionResult<bool> {
        Ok(self.sessions.write().remove(&id).is_some())
    }

    async fn get_active_by_user_id(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == *user_id && !s.is_refresh_expired(now))
            .cloned()
            .collect())
    }

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts> {
        let sessions = self.sessions.read();
        let total = sessions.len() as u64;
        let active = sessions
            .values()
            .filter(|s| !s.is_refresh_expired(now))
            .count() as u64;
        Ok(SessionCounts {
            total,
            active,
            inactive: total - active,
        })
    }

    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_refresh_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// In-memory admin session repository
#[derive(Default)]
pub struct MemoryAdminSessionRepository {
    sessions: RwLock<HashMap<AdminSessionId, AdminSession>>,
}

impl MemoryAdminSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdminSessionRepository for MemoryAdminSessionRepository {
    async fn save(&self, session: NewAdminSession) -> SessionResult<AdminSession> {
        let mut sessions = self.sessions.write();
        if sessions
            .values()
            .any(|s| s.access_token == session.access_token)
        {
            return Err(SessionError::internal("Duplicate admin session token"));
        }

        let session = session.with_id(AdminSessionId::new());
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<AdminSession>> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.access_token == token)
            .cloned())
    }

    async fn update(&self, session: &AdminSession) -> SessionResult<AdminSession> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&session.id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(session.clone())
            }
            None => Err(SessionError::SessionNotFound),
        }
    }

    async fn delete(&self, id: AdminSessionId) -> SessionResult<bool> {
        Ok(self.sessions.write().remove(&id).is_some())
    }

    async fn get_active_by_admin_id(
        &self,
        admin_id: &AdminId,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<AdminSession>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.admin_id == *admin_id && !s.is_expired(now))
            .cloned()
            .collect())
    }

    async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts> {
        let sessions = self.sessions.read();
        let total = sessions.len() as u64;
        let active = sessions.values().filter(|s| !s.is_expired(now)).count() as u64;
        Ok(SessionCounts {
            total,
            active,
            inactive: total - active,
        })
    }

    async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::token::TokenPair;
    use chrono::Duration;

    fn new_session(user_id: UserId, now: DateTime<Utc>, access: &str, refresh: &str) -> NewSession {
        NewSession::new(
            user_id,
            TokenPair {
                access: access.to_string(),
                refresh: refresh.to_string(),
            },
            now,
            Duration::minutes(30),
            Duration::hours(24),
        )
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_tokens() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let user = UserId::new();

        repo.save(new_session(user, now, "a1", "r1")).await.unwrap();
        let err = repo
            .save(new_session(user, now, "a2", "r1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_counts_and_purge() {
        let repo = MemorySessionRepository::new();
        let now = Utc::now();
        let user = UserId::new();

        repo.save(new_session(user, now, "a1", "r1")).await.unwrap();
        let mut stale = new_session(user, now, "a2", "r2");
        stale.refresh_expires_at = now - Duration::seconds(1);
        repo.save(stale).await.unwrap();

        let counts = repo.count_sessions(now).await.unwrap();
        assert_eq!(
            counts,
            SessionCounts {
                total: 2,
                active: 1,
                inactive: 1
            }
        );
        assert_eq!(repo.get_active_by_user_id(&user, now).await.unwrap().len(), 1);

        // Access-expired but refreshable sessions survive the purge
        let later = now + Duration::hours(1);
        assert_eq!(repo.purge_invalid(later).await.unwrap(), 1);
        assert!(repo.get_by_refresh_token("r1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let repo = MemorySessionRepository::new();
        let session = new_session(UserId::new(), Utc::now(), "a1", "r1").with_id(SessionId::new());
        assert!(matches!(
            repo.update(&session).await,
            Err(SessionError::SessionNotFound)
        ));
        assert!(!repo.delete(session.id).await.unwrap());
    }
}
