//! Session Lifecycle Manager
//!
//! Issues, validates, refreshes and invalidates user sessions. The store is
//! authoritative; the cache only sees a change after the store accepted it.
//!
//! Locking:
//! - creation is serialized per user so two concurrent logins cannot both
//!   pass the cap check
//! - validate, refresh and invalidate are serialized per session id, and the
//!   token is re-resolved once the lock is held

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::{SessionId, UserId};
use platform::clock::Clock;
use platform::rate_limit::{RateLimitConfig, RateLimitStore};
use serde::Serialize;

use crate::application::config::{RateLimitScope, SessionConfig};
use crate::application::keyed_lock::KeyedLocks;
use crate::application::reaper::{self, ReaperHandle};
use crate::domain::cache::SessionCache;
use crate::domain::entity::session::{NewSession, Session};
use crate::domain::repository::{SessionCounts, SessionRepository};
use crate::domain::value_object::expiry_policy::ExpiryPolicy;
use crate::domain::value_object::token::{TokenPair, normalize};
use crate::error::{SessionError, SessionResult};

/// Rate limit bucket for session creation
pub const CREATE_RATE_LIMIT_KEY: &str = "session:create";

/// Cache occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub active_sessions: usize,
}

/// Run a store call under the configured budget
pub(crate) async fn with_timeout<T, F>(budget: Duration, op: &'static str, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(elapsed) => {
            tracing::error!(operation = op, budget_ms = budget.as_millis() as u64, "Session store call timed out");
            Err(elapsed.into())
        }
    }
}

/// Consume one creation token for `subject`
pub(crate) async fn admit<L>(
    limiter: &L,
    prefix: &str,
    scope: RateLimitScope,
    subject: &str,
    config: &RateLimitConfig,
) -> SessionResult<()>
where
    L: RateLimitStore + Send + Sync,
{
    let key = match scope {
        RateLimitScope::Global => prefix.to_string(),
        RateLimitScope::PerUser => format!("{prefix}:{subject}"),
    };

    let result = limiter.check_and_increment(&key, config).await?;
    if !result.allowed {
        tracing::warn!(
            key = %key,
            reset_at_ms = result.reset_at_ms,
            "Session creation rate limited"
        );
        return Err(SessionError::RateLimitExceeded);
    }

    Ok(())
}

/// Why a session can no longer be used, if it cannot
fn dead_reason(session: &Session, now: DateTime<Utc>, policy: &ExpiryPolicy) -> Option<&'static str> {
    if session.is_inactive(now, policy) {
        Some("inactive")
    } else if session.is_past_lifespan(now, policy) {
        Some("lifespan_exceeded")
    } else if session.is_refresh_expired(now) {
        Some("refresh_expired")
    } else {
        None
    }
}

/// User session lifecycle manager
pub struct SessionLifecycleManager<R, C, L>
where
    R: SessionRepository + Send + Sync + 'static,
    C: SessionCache + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    store: Arc<R>,
    cache: Arc<C>,
    limiter: Arc<L>,
    clock: Arc<dyn Clock>,
    config: Arc<SessionConfig>,
    user_locks: KeyedLocks,
    session_locks: KeyedLocks,
}

impl<R, C, L> SessionLifecycleManager<R, C, L>
where
    R: SessionRepository + Send + Sync + 'static,
    C: SessionCache + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<R>,
        cache: Arc<C>,
        limiter: Arc<L>,
        clock: Arc<dyn Clock>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            limiter,
            clock,
            config,
            user_locks: KeyedLocks::default(),
            session_locks: KeyedLocks::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Issue a new session for `user_id`
    pub async fn create_session(&self, user_id: UserId) -> SessionResult<Session> {
        let subject = user_id.to_string();
        admit(
            self.limiter.as_ref(),
            CREATE_RATE_LIMIT_KEY,
            self.config.rate_limit_scope,
            &subject,
            &self.config.rate_limit,
        )
        .await?;

        let _guard = self.user_locks.lock(&subject).await;

        let now = self.clock.now();
        let policy = self.config.expiry_policy();

        let active = with_timeout(
            self.config.store_timeout,
            "get_active_by_user_id",
            self.store.get_active_by_user_id(&user_id, now),
        )
        .await?;
        let active = active.iter().filter(|s| !s.is_dead(now, &policy)).count();

        if active >= self.config.max_sessions_per_user {
            tracing::warn!(
                user_id = %user_id,
                active_sessions = active,
                max_sessions = self.config.max_sessions_per_user,
                "Session cap reached"
            );
            return Err(SessionError::MaxSessionsReached);
        }

        let tokens = TokenPair::generate()?;
        let new_session = NewSession::new(
            user_id,
            tokens,
            now,
            self.config.access_token_ttl_chrono(),
            self.config.refresh_token_ttl_chrono(),
        );

        let session = with_timeout(
            self.config.store_timeout,
            "save",
            self.store.save(new_session),
        )
        .await?;
        self.cache.put(session.clone()).await;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            "Session created"
        );

        Ok(session)
    }

    /// Resolve an access token to a live session and record the activity
    pub async fn validate_access_token(&self, access_token: &str) -> SessionResult<Session> {
        let token = normalize(access_token).ok_or(SessionError::InvalidToken)?;

        let candidate = self
            .find_by_access_token(token)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        let _guard = self.session_locks.lock(&candidate.id.to_string()).await;

        let mut session = match self.find_by_access_token(token).await? {
            Some(s) if s.id == candidate.id => s,
            _ => return Err(SessionError::SessionNotFound),
        };

        let now = self.clock.now();
        let policy = self.config.expiry_policy();

        if session.is_inactive(now, &policy) {
            self.discard(&session, "inactive").await;
            return Err(SessionError::SessionExpired);
        }
        if session.is_past_lifespan(now, &policy) {
            self.discard(&session, "lifespan_exceeded").await;
            return Err(SessionError::SessionExpired);
        }
        if session.is_access_expired(now) {
            tracing::debug!(session_id = %session.id, "Access token expired");
            return Err(SessionError::TokenExpired);
        }

        let previous = session.clone();
        session.touch(now);
        self.persist(&session, &previous).await
    }

    /// Rotate the token pair of the session owning `refresh_token`
    pub async fn refresh_access_token(&self, refresh_token: &str) -> SessionResult<Session> {
        let token = normalize(refresh_token).ok_or(SessionError::InvalidToken)?;

        let candidate = self
            .find_by_refresh_token(token)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        let _guard = self.session_locks.lock(&candidate.id.to_string()).await;

        // A concurrent refresh may have rotated the pair while we waited
        let current = match self.find_by_refresh_token(token).await? {
            Some(s) if s.id == candidate.id => s,
            _ => return Err(SessionError::SessionNotFound),
        };

        let now = self.clock.now();
        let policy = self.config.expiry_policy();

        if let Some(reason) = dead_reason(&current, now, &policy) {
            self.discard(&current, reason).await;
            return Err(SessionError::TokenExpired);
        }

        let mut rotated = current.clone();
        rotated.rotate(
            TokenPair::generate()?,
            now,
            self.config.access_token_ttl_chrono(),
            self.config.refresh_token_ttl_chrono(),
        );

        let rotated = self.persist(&rotated, &current).await?;

        tracing::info!(
            session_id = %rotated.id,
            user_id = %rotated.user_id,
            "Session refreshed"
        );

        Ok(rotated)
    }

    /// Invalidate the session owning `token` (access or refresh)
    pub async fn invalidate_by_token(&self, token: &str) -> SessionResult<()> {
        let token = normalize(token).ok_or(SessionError::InvalidToken)?;

        let candidate = self
            .find_by_any_token(token)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        let _guard = self.session_locks.lock(&candidate.id.to_string()).await;

        // A concurrent invalidation may have won while we waited
        let session = match self.find_by_any_token(token).await? {
            Some(s) if s.id == candidate.id => s,
            _ => return Err(SessionError::SessionNotFound),
        };

        with_timeout(
            self.config.store_timeout,
            "delete",
            self.store.delete(session.id),
        )
        .await?;
        self.cache.remove(&session).await;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            "Session invalidated"
        );

        Ok(())
    }

    /// Invalidate a session by primary key
    pub async fn invalidate_by_id(&self, id: SessionId) -> SessionResult<()> {
        let _guard = self.session_locks.lock(&id.to_string()).await;

        let deleted = with_timeout(self.config.store_timeout, "delete", self.store.delete(id)).await?;
        let cached = self.cache.get_by_id(id).await;
        if let Some(cached) = &cached {
            self.cache.remove(cached).await;
        }

        if !deleted && cached.is_none() {
            return Err(SessionError::SessionNotFound);
        }

        tracing::info!(session_id = %id, "Session invalidated");

        Ok(())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            active_sessions: self.cache.len().await,
        }
    }

    /// Store-wide counters
    pub async fn session_counts(&self) -> SessionResult<SessionCounts> {
        let now = self.clock.now();
        with_timeout(
            self.config.store_timeout,
            "count_sessions",
            self.store.count_sessions(now),
        )
        .await
    }

    /// Evict fully expired sessions from the cache
    pub async fn sweep_cache(&self) -> usize {
        let now = self.clock.now();
        self.cache.sweep(now, &self.config.expiry_policy()).await
    }

    /// Start the periodic cache reaper
    pub fn spawn_reaper(self: &Arc<Self>) -> ReaperHandle {
        let manager = Arc::clone(self);
        reaper::spawn("session", self.config.sweep_interval, move || {
            let manager = Arc::clone(&manager);
            async move { manager.sweep_cache().await }
        })
    }

    async fn find_by_access_token(&self, token: &str) -> SessionResult<Option<Session>> {
        if let Some(session) = self.cache.get_by_access_token(token).await {
            return Ok(Some(session));
        }
        with_timeout(
            self.config.store_timeout,
            "get_by_access_token",
            self.store.get_by_access_token(token),
        )
        .await
    }

    async fn find_by_refresh_token(&self, token: &str) -> SessionResult<Option<Session>> {
        if let Some(session) = self.cache.get_by_refresh_token(token).await {
            return Ok(Some(session));
        }
        with_timeout(
            self.config.store_timeout,
            "get_by_refresh_token",
            self.store.get_by_refresh_token(token),
        )
        .await
    }

    /// Cache by access, cache by refresh, store by access, store by refresh
    async fn find_by_any_token(&self, token: &str) -> SessionResult<Option<Session>> {
        if let Some(session) = self.cache.get_by_access_token(token).await {
            return Ok(Some(session));
        }
        if let Some(session) = self.cache.get_by_refresh_token(token).await {
            return Ok(Some(session));
        }
        let by_access = with_timeout(
            self.config.store_timeout,
            "get_by_access_token",
            self.store.get_by_access_token(token),
        )
        .await?;
        if by_access.is_some() {
            return Ok(by_access);
        }
        with_timeout(
            self.config.store_timeout,
            "get_by_refresh_token",
            self.store.get_by_refresh_token(token),
        )
        .await
    }

    /// Write `session` to the store, then swap it into the cache
    async fn persist(&self, session: &Session, previous: &Session) -> SessionResult<Session> {
        match with_timeout(self.config.store_timeout, "update", self.store.update(session)).await {
            Ok(stored) => {
                self.cache.remove(previous).await;
                self.cache.put(stored.clone()).await;
                Ok(stored)
            }
            Err(SessionError::SessionNotFound) => {
                // Deleted underneath us
                self.cache.remove(previous).await;
                Err(SessionError::SessionNotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort removal of an expired session from store and cache
    async fn discard(&self, session: &Session, reason: &'static str) {
        if let Err(e) = with_timeout(
            self.config.store_timeout,
            "delete",
            self.store.delete(session.id),
        )
        .await
        {
            tracing::warn!(
                session_id = %session.id,
                error = %e,
                "Failed to delete expired session"
            );
        }
        self.cache.remove(session).await;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            reason,
            "Session expired"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{MemorySessionCache, MemorySessionRepository};
    use chrono::Duration as ChronoDuration;
    use platform::clock::ManualClock;
    use platform::rate_limit::MemoryRateLimitStore;

    type Manager =
        SessionLifecycleManager<MemorySessionRepository, MemorySessionCache, MemoryRateLimitStore>;

    fn manager(config: SessionConfig) -> (Manager, ManualClock) {
        let clock = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let manager = SessionLifecycleManager::new(
            Arc::new(MemorySessionRepository::new()),
            Arc::new(MemorySessionCache::new()),
            Arc::new(MemoryRateLimitStore::new(shared.clone())),
            shared,
            Arc::new(config),
        );
        (manager, clock)
    }

    #[tokio::test]
    async fn test_empty_tokens_are_rejected() {
        let (manager, _) = manager(SessionConfig::default());

        assert!(matches!(
            manager.validate_access_token("").await,
            Err(SessionError::InvalidToken)
        ));
        assert!(matches!(
            manager.refresh_access_token("  ").await,
            Err(SessionError::InvalidToken)
        ));
        assert!(matches!(
            manager.invalidate_by_token("").await,
            Err(SessionError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_global_rate_limit() {
        let config = SessionConfig {
            rate_limit: RateLimitConfig::new(2, 60),
            ..SessionConfig::default()
        };
        let (manager, _) = manager(config);

        manager.create_session(UserId::new()).await.unwrap();
        manager.create_session(UserId::new()).await.unwrap();
        assert!(matches!(
            manager.create_session(UserId::new()).await,
            Err(SessionError::RateLimitExceeded)
        ));
    }

    #[tokio::test]
    async fn test_per_user_rate_limit_scope() {
        let config = SessionConfig {
            rate_limit: RateLimitConfig::new(1, 60),
            rate_limit_scope: RateLimitScope::PerUser,
            ..SessionConfig::default()
        };
        let (manager, _) = manager(config);
        let user = UserId::new();

        manager.create_session(user).await.unwrap();
        assert!(matches!(
            manager.create_session(user).await,
            Err(SessionError::RateLimitExceeded)
        ));
        manager.create_session(UserId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_touches_last_activity() {
        let (manager, clock) = manager(SessionConfig::default());
        let session = manager.create_session(UserId::new()).await.unwrap();

        clock.advance(ChronoDuration::minutes(5));
        let validated = manager
            .validate_access_token(&session.access_token)
            .await
            .unwrap();

        assert_eq!(validated.id, session.id);
        assert_eq!(validated.last_activity, session.last_activity + ChronoDuration::minutes(5));
    }

    #[tokio::test]
    async fn test_invalidate_by_id() {
        let (manager, _) = manager(SessionConfig::default());
        let session = manager.create_session(UserId::new()).await.unwrap();

        manager.invalidate_by_id(session.id).await.unwrap();
        assert_eq!(manager.cache_stats().await.active_sessions, 0);
        assert!(matches!(
            manager.invalidate_by_id(session.id).await,
            Err(SessionError::SessionNotFound)
        ));
        assert!(matches!(
            manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_session_counts() {
        let (manager, clock) = manager(SessionConfig::default());
        manager.create_session(UserId::new()).await.unwrap();
        manager.create_session(UserId::new()).await.unwrap();

        let counts = manager.session_counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.active, 2);

        clock.advance(ChronoDuration::hours(25));
        let counts = manager.session_counts().await.unwrap();
        assert_eq!(counts.active, 0);
        assert_eq!(counts.inactive, 2);
    }
}
