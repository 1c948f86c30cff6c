//! Store purge
//!
//! Periodic deletion of invalid records from the persistent stores. This is
//! the durability backstop behind the in-process cache reaper.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use platform::clock::Clock;
use serde::Serialize;

use crate::application::config::{DEFAULT_STORE_TIMEOUT, to_chrono};
use crate::application::session_manager::with_timeout;
use crate::domain::repository::{AdminSessionRepository, SessionCounts, SessionRepository};
use crate::error::SessionResult;

/// Default purge period (24 hours)
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Longest accepted purge period (30 days)
pub const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Result of one purge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub sessions_deleted: u64,
    pub admin_sessions_deleted: u64,
}

/// Purges both session stores on a fixed period
pub struct StorePurger<R, A>
where
    R: SessionRepository + Send + Sync + 'static,
    A: AdminSessionRepository + Send + Sync + 'static,
{
    sessions: Arc<R>,
    admin_sessions: Arc<A>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    store_timeout: Duration,
    next_purge_at: Mutex<Option<DateTime<Utc>>>,
}

impl<R, A> StorePurger<R, A>
where
    R: SessionRepository + Send + Sync + 'static,
    A: AdminSessionRepository + Send + Sync + 'static,
{
    pub fn new(
        sessions: Arc<R>,
        admin_sessions: Arc<A>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            sessions,
            admin_sessions,
            clock,
            interval,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            next_purge_at: Mutex::new(None),
        }
    }

    /// Override the budget for each store call
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next pass is due, once the first pass has run
    pub fn next_purge_at(&self) -> Option<DateTime<Utc>> {
        *self.next_purge_at.lock()
    }

    /// Delete invalid records from both stores and schedule the next pass
    pub async fn run_once(&self) -> SessionResult<PurgeReport> {
        let now = self.clock.now();

        let sessions_deleted = with_timeout(
            self.store_timeout,
            "purge_invalid",
            self.sessions.purge_invalid(now),
        )
        .await?;
        let admin_sessions_deleted = with_timeout(
            self.store_timeout,
            "purge_invalid",
            self.admin_sessions.purge_invalid(now),
        )
        .await?;

        let next = now
            .checked_add_signed(to_chrono(self.interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        *self.next_purge_at.lock() = Some(next);

        tracing::info!(
            sessions_deleted,
            admin_sessions_deleted,
            next_purge_at = %next,
            "Store purge completed"
        );

        Ok(PurgeReport {
            sessions_deleted,
            admin_sessions_deleted,
        })
    }

    /// User session counters, under the same store budget
    pub async fn session_counts(&self) -> SessionResult<SessionCounts> {
        with_timeout(
            self.store_timeout,
            "count_sessions",
            self.sessions.count_sessions(self.clock.now()),
        )
        .await
    }
}
