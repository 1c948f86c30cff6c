//! Session Entity
//!
//! An access/refresh token pair bound to a user, with four independent
//! clocks: access expiry, refresh expiry, inactivity and absolute lifespan.

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SessionId, UserId};
use serde::Serialize;

use crate::domain::value_object::{expiry_policy::ExpiryPolicy, token::TokenPair};

/// Session that has not been persisted yet (the store assigns the id)
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl NewSession {
    pub fn new(
        user_id: UserId,
        tokens: TokenPair,
        now: DateTime<Utc>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            user_id,
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            access_expires_at: now + access_ttl,
            refresh_expires_at: now + refresh_ttl,
            created_at: now,
            last_activity: now,
        }
    }

    /// Attach the id the store assigned
    pub fn with_id(self, id: SessionId) -> Session {
        Session {
            id,
            user_id: self.user_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            access_expires_at: self.access_expires_at,
            refresh_expires_at: self.refresh_expires_at,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Persisted user session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expires_at
    }

    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    pub fn is_inactive(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> bool {
        now - self.last_activity >= policy.inactivity_window
    }

    pub fn is_past_lifespan(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> bool {
        now - self.created_at >= policy.max_lifespan
    }

    /// No refresh can revive this session any more
    pub fn is_dead(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> bool {
        self.is_refresh_expired(now) || self.is_inactive(now, policy) || self.is_past_lifespan(now, policy)
    }

    /// Expired in every dimension; only these may be evicted by the reaper.
    ///
    /// A session whose access token expired but whose refresh token is still
    /// good must stay resolvable by refresh token.
    pub fn is_fully_expired(&self, now: DateTime<Utc>, policy: &ExpiryPolicy) -> bool {
        self.is_access_expired(now) && self.is_dead(now, policy)
    }

    /// Record activity
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Replace the token pair and restart both token windows.
    ///
    /// `id`, `user_id` and `created_at` are preserved so the absolute
    /// lifespan keeps counting down.
    pub fn rotate(
        &mut self,
        tokens: TokenPair,
        now: DateTime<Utc>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) {
        self.access_token = tokens.access;
        self.refresh_token = tokens.refresh;
        self.access_expires_at = now + access_ttl;
        self.refresh_expires_at = now + refresh_ttl;
        self.last_activity = now;
    }
}
