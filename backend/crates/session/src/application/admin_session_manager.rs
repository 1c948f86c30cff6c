//! Admin Session Lifecycle Manager
//!
//! Administrator sessions have no refresh token and a fixed lifetime that
//! activity does not extend. Login can short-circuit through the root
//! credentials, which yields a non-persisted sentinel instead of a session.

use std::sync::Arc;

use kernel::id::{AdminId, AdminSessionId};
use platform::clock::Clock;
use platform::crypto::generate_token;
use platform::rate_limit::RateLimitStore;
use serde::Serialize;

use crate::application::config::AdminSessionConfig;
use crate::application::keyed_lock::KeyedLocks;
use crate::application::reaper::{self, ReaperHandle};
use crate::application::session_manager::{CacheStats, admit, with_timeout};
use crate::domain::cache::AdminSessionCache;
use crate::domain::entity::admin_session::{AdminSession, NewAdminSession, RootSession};
use crate::domain::repository::{AdminCredentialVerifier, AdminSessionRepository, SessionCounts};
use crate::domain::value_object::token::normalize;
use crate::error::{SessionError, SessionResult};

/// Rate limit bucket for admin session creation
pub const ADMIN_CREATE_RATE_LIMIT_KEY: &str = "admin_session:create";

/// Outcome of an admin login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AdminLogin {
    /// Root credentials matched; nothing was persisted
    Root(RootSession),
    Session(AdminSession),
}

/// Admin session lifecycle manager
pub struct AdminSessionLifecycleManager<R, C, L>
where
    R: AdminSessionRepository + Send + Sync + 'static,
    C: AdminSessionCache + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    store: Arc<R>,
    cache: Arc<C>,
    limiter: Arc<L>,
    clock: Arc<dyn Clock>,
    config: Arc<AdminSessionConfig>,
    admin_locks: KeyedLocks,
    session_locks: KeyedLocks,
}

impl<R, C, L> AdminSessionLifecycleManager<R, C, L>
where
    R: AdminSessionRepository + Send + Sync + 'static,
    C: AdminSessionCache + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<R>,
        cache: Arc<C>,
        limiter: Arc<L>,
        clock: Arc<dyn Clock>,
        config: Arc<AdminSessionConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            limiter,
            clock,
            config,
            admin_locks: KeyedLocks::default(),
            session_locks: KeyedLocks::default(),
        }
    }

    /// Authenticate and open a session.
    ///
    /// Root credentials are checked first and bypass the store, the cache,
    /// the rate limiter and the cap.
    pub async fn login<V>(
        &self,
        username: &str,
        password: &str,
        verifier: &V,
    ) -> SessionResult<AdminLogin>
    where
        V: AdminCredentialVerifier + Send + Sync,
    {
        if let Some(root) = &self.config.root {
            if root.matches(username, password) {
                tracing::info!("Root admin login");
                return Ok(AdminLogin::Root(RootSession::default()));
            }
        }

        let admin_id = with_timeout(
            self.config.store_timeout,
            "verify_admin_credentials",
            verifier.verify(username, password),
        )
        .await?
        .ok_or(SessionError::InvalidCredentials)?;

        self.create_session(admin_id).await.map(AdminLogin::Session)
    }

    /// Issue a new admin session
    pub async fn create_session(&self, admin_id: AdminId) -> SessionResult<AdminSession> {
        let subject = admin_id.to_string();
        admit(
            self.limiter.as_ref(),
            ADMIN_CREATE_RATE_LIMIT_KEY,
            self.config.rate_limit_scope,
            &subject,
            &self.config.rate_limit,
        )
        .await?;

        let _guard = self.admin_locks.lock(&subject).await;
        let now = self.clock.now();

        let active = with_timeout(
            self.config.store_timeout,
            "get_active_by_admin_id",
            self.store.get_active_by_admin_id(&admin_id, now),
        )
        .await?
        .len();

        if active >= self.config.max_sessions_per_admin {
            tracing::warn!(
                admin_id = %admin_id,
                active_sessions = active,
                max_sessions = self.config.max_sessions_per_admin,
                "Admin session cap reached"
            );
            return Err(SessionError::MaxSessionsReached);
        }

        let new_session = NewAdminSession::new(
            admin_id,
            generate_token()?,
            now,
            self.config.access_token_ttl_chrono(),
        );
        let session = with_timeout(
            self.config.store_timeout,
            "save",
            self.store.save(new_session),
        )
        .await?;
        self.cache.put(session.clone()).await;

        tracing::info!(
            admin_session_id = %session.id,
            admin_id = %session.admin_id,
            "Admin session created"
        );

        Ok(session)
    }

    /// Resolve an admin access token.
    ///
    /// Records activity but never moves `access_expires_at`. The root
    /// sentinel token is not resolvable here.
    pub async fn validate_access_token(&self, access_token: &str) -> SessionResult<AdminSession> {
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
        if session.is_expired(now) {
            self.discard(&session).await;
            return Err(SessionError::SessionExpired);
        }

        session.touch(now);
        match with_timeout(self.config.store_timeout, "update", self.store.update(&session)).await {
            Ok(stored) => {
                self.cache.put(stored.clone()).await;
                Ok(stored)
            }
            Err(SessionError::SessionNotFound) => {
                self.cache.remove(&session).await;
                Err(SessionError::SessionNotFound)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn invalidate_by_token(&self, access_token: &str) -> SessionResult<()> {
        let token = normalize(access_token).ok_or(SessionError::InvalidToken)?;

        let candidate = self
            .find_by_access_token(token)
            .await?
            .ok_or(SessionError::SessionNotFound)?;
        let _guard = self.session_locks.lock(&candidate.id.to_string()).await;

        let session = match self.find_by_access_token(token).await? {
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
            admin_session_id = %session.id,
            admin_id = %session.admin_id,
            "Admin session invalidated"
        );

        Ok(())
    }

    /// Logout is token invalidation
    pub async fn logout(&self, access_token: &str) -> SessionResult<()> {
        self.invalidate_by_token(access_token).await
    }

    pub async fn invalidate_by_id(&self, id: AdminSessionId) -> SessionResult<()> {
        let _guard = self.session_locks.lock(&id.to_string()).await;

        let deleted = with_timeout(self.config.store_timeout, "delete", self.store.delete(id)).await?;
        let cached = self.cache.get_by_id(id).await;
        if let Some(cached) = &cached {
            self.cache.remove(cached).await;
        }

        if !deleted && cached.is_none() {
            return Err(SessionError::SessionNotFound);
        }

        tracing::info!(admin_session_id = %id, "Admin session invalidated");

        Ok(())
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            active_sessions: self.cache.len().await,
        }
    }

    pub async fn session_counts(&self) -> SessionResult<SessionCounts> {
        let now = self.clock.now();
        with_timeout(
            self.config.store_timeout,
            "count_sessions",
            self.store.count_sessions(now),
        )
        .await
    }

    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep(self.clock.now()).await
    }

    pub fn spawn_reaper(self: &Arc<Self>) -> ReaperHandle {
        let manager = Arc::clone(self);
        reaper::spawn("admin_session", self.config.sweep_interval, move || {
            let manager = Arc::clone(&manager);
            async move { manager.sweep_cache().await }
        })
    }

    async fn find_by_access_token(&self, token: &str) -> SessionResult<Option<AdminSession>> {
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

    async fn discard(&self, session: &AdminSession) {
        if let Err(e) = with_timeout(
            self.config.store_timeout,
            "delete",
            self.store.delete(session.id),
        )
        .await
        {
            tracing::warn!(
                admin_session_id = %session.id,
                error = %e,
                "Failed to delete expired admin session"
            );
        }
        self.cache.remove(session).await;

        tracing::info!(
            admin_session_id = %session.id,
            admin_id = %session.admin_id,
            "Admin session expired"
        );
    }
}
