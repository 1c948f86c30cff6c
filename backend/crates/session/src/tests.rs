//! Scenario tests for the session lifecycle
//! Each module drives the managers end to end over the in-memory store.

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use platform::clock::{Clock, ManualClock};
    use platform::rate_limit::{MemoryRateLimitStore, RateLimitConfig};

    use crate::application::{SessionConfig, SessionLifecycleManager};
    use crate::domain::repository::SessionRepository;
    use crate::domain::{NewSession, Session, SessionCounts};
    use crate::error::SessionResult;
    use crate::infra::{MemorySessionCache, MemorySessionRepository};
    use chrono::{DateTime, Utc};
    use kernel::id::{SessionId, UserId};

    pub type Manager<R = MemorySessionRepository> =
        SessionLifecycleManager<R, MemorySessionCache, MemoryRateLimitStore>;

    pub struct Harness<R = MemorySessionRepository>
    where
        R: SessionRepository + Send + Sync + 'static,
    {
        pub manager: Arc<Manager<R>>,
        pub store: Arc<R>,
        pub cache: Arc<MemorySessionCache>,
        pub clock: ManualClock,
    }

    /// Defaults with the creation limit out of the way
    pub fn relaxed_config() -> SessionConfig {
        SessionConfig {
            rate_limit: RateLimitConfig::new(10_000, 60),
            ..SessionConfig::default()
        }
    }

    pub fn harness(config: SessionConfig) -> Harness {
        harness_with(MemorySessionRepository::new(), config)
    }

    pub fn harness_with<R>(store: R, config: SessionConfig) -> Harness<R>
    where
        R: SessionRepository + Send + Sync + 'static,
    {
        let clock = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(store);
        let cache = Arc::new(MemorySessionCache::new());
        let manager = Arc::new(SessionLifecycleManager::new(
            store.clone(),
            cache.clone(),
            Arc::new(MemoryRateLimitStore::new(shared.clone())),
            shared,
            Arc::new(config),
        ));
        Harness {
            manager,
            store,
            cache,
            clock,
        }
    }

    /// Store whose token lookups and deletes take `delay` before answering
    pub struct SlowRepository {
        pub inner: MemorySessionRepository,
        pub delay: Duration,
    }

    impl SessionRepository for SlowRepository {
        async fn save(&self, session: NewSession) -> SessionResult<Session> {
            self.inner.save(session).await
        }

        async fn get_by_access_token(&self, token: &str) -> SessionResult<Option<Session>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_by_access_token(token).await
        }

        async fn get_by_refresh_token(&self, token: &str) -> SessionResult<Option<Session>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_by_refresh_token(token).await
        }

        async fn update(&self, session: &Session) -> SessionResult<Session> {
            self.inner.update(session).await
        }

        async fn delete(&self, id: SessionId) -> SessionResult<bool> {
            tokio::time::sleep(self.delay).await;
            self.inner.delete(id).await
        }

        async fn get_active_by_user_id(
            &self,
            user_id: &UserId,
            now: DateTime<Utc>,
        ) -> SessionResult<Vec<Session>> {
            self.inner.get_active_by_user_id(user_id, now).await
        }

        async fn count_sessions(&self, now: DateTime<Utc>) -> SessionResult<SessionCounts> {
            self.inner.count_sessions(now).await
        }

        async fn purge_invalid(&self, now: DateTime<Utc>) -> SessionResult<u64> {
            self.inner.purge_invalid(now).await
        }
    }
}

#[cfg(test)]
mod creation_tests {
    use std::collections::HashSet;

    use super::support::*;
    use crate::application::SessionConfig;
    use crate::error::SessionError;
    use kernel::id::UserId;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_issue_unique_tokens() {
        let h = harness(relaxed_config());

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let manager = h.manager.clone();
                tokio::spawn(async move { manager.create_session(UserId::new()).await })
            })
            .collect();

        let mut tokens = HashSet::new();
        for task in tasks {
            let session = task.await.unwrap().unwrap();
            assert!(tokens.insert(session.access_token));
            assert!(tokens.insert(session.refresh_token));
        }
        assert_eq!(tokens.len(), 128);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_respect_cap() {
        let h = harness(relaxed_config());
        let user = UserId::new();

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let manager = h.manager.clone();
                tokio::spawn(async move { manager.create_session(user).await })
            })
            .collect();

        let mut created = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(SessionError::MaxSessionsReached) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 5);
        assert_eq!(rejected, 7);
    }

    #[tokio::test]
    async fn test_dead_sessions_do_not_count_toward_cap() {
        let h = harness(relaxed_config());
        let user = UserId::new();

        for _ in 0..5 {
            h.manager.create_session(user).await.unwrap();
        }
        assert!(matches!(
            h.manager.create_session(user).await,
            Err(SessionError::MaxSessionsReached)
        ));

        // Inactive but still inside the refresh window
        h.clock.advance(chrono::Duration::hours(13));
        h.manager.create_session(user).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_frees_a_slot_at_cap() {
        let h = harness(relaxed_config());
        let user = UserId::new();

        let mut sessions = Vec::new();
        for _ in 0..5 {
            sessions.push(h.manager.create_session(user).await.unwrap());
        }
        assert!(matches!(
            h.manager.create_session(user).await,
            Err(SessionError::MaxSessionsReached)
        ));

        h.manager
            .invalidate_by_token(&sessions[0].access_token)
            .await
            .unwrap();
        h.manager.create_session(user).await.unwrap();
        assert!(matches!(
            h.manager.create_session(user).await,
            Err(SessionError::MaxSessionsReached)
        ));
    }

    #[tokio::test]
    async fn test_default_rate_limit_is_ten_per_minute() {
        let h = harness(SessionConfig::default());

        for _ in 0..10 {
            h.manager.create_session(UserId::new()).await.unwrap();
        }
        assert!(matches!(
            h.manager.create_session(UserId::new()).await,
            Err(SessionError::RateLimitExceeded)
        ));

        h.clock.advance(chrono::Duration::seconds(7));
        h.manager.create_session(UserId::new()).await.unwrap();
    }
}

#[cfg(test)]
mod expiry_tests {
    use super::support::*;
    use crate::application::SessionConfig;
    use crate::domain::cache::SessionCache;
    use crate::domain::repository::SessionRepository;
    use crate::error::SessionError;
    use chrono::Duration;
    use kernel::id::UserId;
    use platform::clock::Clock;

    #[tokio::test]
    async fn test_thirty_one_minute_scenario() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();
        assert_eq!(
            session.access_expires_at,
            session.created_at + Duration::minutes(30)
        );

        let validated = h
            .manager
            .validate_access_token(&session.access_token)
            .await
            .unwrap();
        assert_eq!(validated.last_activity, h.clock.now());

        h.clock.advance(Duration::minutes(31));
        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::TokenExpired)
        ));

        let refreshed = h
            .manager
            .refresh_access_token(&session.refresh_token)
            .await
            .unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionNotFound)
        ));
        h.manager
            .validate_access_token(&refreshed.access_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inactivity_wins_over_access_expiry() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.clock.advance(Duration::hours(13));
        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionExpired)
        ));

        // Deleted everywhere
        assert!(h.cache.get_by_id(session.id).await.is_none());
        assert!(
            h.store
                .get_by_access_token(&session.access_token)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_lifespan_checked_before_access_expiry() {
        let config = SessionConfig {
            max_lifespan: std::time::Duration::from_secs(20 * 60),
            ..relaxed_config()
        };
        let h = harness(config);
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.clock.advance(Duration::minutes(25));
        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionExpired)
        ));
        assert_eq!(h.manager.cache_stats().await.active_sessions, 0);
    }

    #[tokio::test]
    async fn test_lifespan_survives_refresh() {
        let config = SessionConfig {
            max_lifespan: std::time::Duration::from_secs(3600),
            ..relaxed_config()
        };
        let h = harness(config);
        let mut session = h.manager.create_session(UserId::new()).await.unwrap();
        let created_at = session.created_at;

        for _ in 0..2 {
            h.clock.advance(Duration::minutes(25));
            session = h
                .manager
                .refresh_access_token(&session.refresh_token)
                .await
                .unwrap();
            assert_eq!(session.created_at, created_at);
        }

        h.clock.advance(Duration::minutes(11));
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_after_refresh_window_is_token_expired() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.clock.advance(Duration::hours(24));
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::TokenExpired)
        ));
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::SessionNotFound)
        ));
    }
}

#[cfg(test)]
mod refresh_tests {
    use super::support::*;
    use crate::domain::cache::SessionCache;
    use crate::error::SessionError;
    use kernel::id::UserId;

    #[tokio::test]
    async fn test_refresh_rotates_tokens_and_keeps_identity() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.clock.advance(chrono::Duration::minutes(10));
        let refreshed = h
            .manager
            .refresh_access_token(&session.refresh_token)
            .await
            .unwrap();

        assert_eq!(refreshed.id, session.id);
        assert_eq!(refreshed.user_id, session.user_id);
        assert_eq!(refreshed.created_at, session.created_at);
        assert_ne!(refreshed.access_token, session.access_token);
        assert_ne!(refreshed.refresh_token, session.refresh_token);
        assert!(refreshed.access_expires_at > session.access_expires_at);

        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionNotFound)
        ));
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::SessionNotFound)
        ));
        assert!(h.cache.get_by_refresh_token(&session.refresh_token).await.is_none());
        assert_eq!(h.manager.cache_stats().await.active_sessions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = h.manager.clone();
                let token = session.refresh_token.clone();
                tokio::spawn(async move { manager.refresh_access_token(&token).await })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(SessionError::SessionNotFound) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners, 1);
    }
}

#[cfg(test)]
mod consistency_tests {
    use std::time::Duration;

    use super::support::*;
    use crate::domain::cache::SessionCache;
    use crate::error::SessionError;
    use crate::infra::MemorySessionRepository;
    use kernel::id::UserId;

    #[tokio::test]
    async fn test_store_fallback_after_cache_loss() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.cache.remove(&session).await;
        assert_eq!(h.manager.cache_stats().await.active_sessions, 0);

        let validated = h
            .manager
            .validate_access_token(&session.access_token)
            .await
            .unwrap();
        assert_eq!(validated.id, session.id);
        assert_eq!(h.cache.get_by_id(session.id).await, Some(validated));
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_store() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();
        h.cache.remove(&session).await;

        let refreshed = h
            .manager
            .refresh_access_token(&session.refresh_token)
            .await
            .unwrap();
        assert_eq!(
            h.cache.get_by_access_token(&refreshed.access_token).await,
            Some(refreshed)
        );
    }

    #[tokio::test]
    async fn test_invalidate_twice() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        h.manager
            .invalidate_by_token(&session.access_token)
            .await
            .unwrap();
        assert!(matches!(
            h.manager.invalidate_by_token(&session.access_token).await,
            Err(SessionError::SessionNotFound)
        ));
        assert!(matches!(
            h.manager.validate_access_token(&session.access_token).await,
            Err(SessionError::SessionNotFound)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_invalidations_succeed_once() {
        let store = SlowRepository {
            inner: MemorySessionRepository::new(),
            delay: Duration::from_millis(10),
        };
        let h = harness_with(store, relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();

        let (first, second) = tokio::join!(
            h.manager.invalidate_by_token(&session.access_token),
            h.manager.invalidate_by_token(&session.access_token),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(SessionError::SessionNotFound)))
                .count(),
            1
        );
        assert_eq!(h.manager.cache_stats().await.active_sessions, 0);
    }

    #[tokio::test]
    async fn test_invalidate_by_refresh_token_from_store() {
        let h = harness(relaxed_config());
        let session = h.manager.create_session(UserId::new()).await.unwrap();
        h.cache.remove(&session).await;

        h.manager
            .invalidate_by_token(&session.refresh_token)
            .await
            .unwrap();
        assert!(matches!(
            h.manager.refresh_access_token(&session.refresh_token).await,
            Err(SessionError::SessionNotFound)
        ));
    }
}

#[cfg(test)]
mod background_tests {
    use std::time::Duration;

    use super::support::*;
    use crate::application::SessionConfig;
    use crate::error::SessionError;
    use crate::infra::MemorySessionRepository;
    use kernel::id::UserId;

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_surfaces_as_internal() {
        let store = SlowRepository {
            inner: MemorySessionRepository::new(),
            delay: Duration::from_secs(30),
        };
        let h = harness_with(store, relaxed_config());

        let err = h
            .manager
            .validate_access_token("not-a-cached-token")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Internal { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_fully_expired_sessions() {
        let config = SessionConfig {
            sweep_interval: Duration::from_secs(60),
            ..relaxed_config()
        };
        let h = harness(config);
        let dead = h.manager.create_session(UserId::new()).await.unwrap();

        h.clock.advance(chrono::Duration::minutes(31));
        let live = h.manager.create_session(UserId::new()).await.unwrap();

        let reaper = h.manager.spawn_reaper();

        // Access expired but still refreshable: kept
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(h.manager.cache_stats().await.active_sessions, 2);

        // Past the inactivity window for the first session only
        h.clock.advance(chrono::Duration::minutes(11 * 60 + 45));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.manager.cache_stats().await.active_sessions, 1);

        reaper.shutdown();
        assert!(matches!(
            h.manager.validate_access_token(&live.access_token).await,
            Err(SessionError::TokenExpired)
        ));
        assert!(matches!(
            h.manager.refresh_access_token(&dead.refresh_token).await,
            Err(SessionError::TokenExpired)
        ));
    }
}
