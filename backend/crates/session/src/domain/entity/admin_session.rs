//! Admin Session Entity
//!
//! Administrator sessions carry a single access token with a fixed expiry.
//! Activity is recorded but never extends the window.

use chrono::{DateTime, Duration, Utc};
use kernel::id::{AdminId, AdminSessionId};
use serde::Serialize;

/// Access token handed out for the root credential bypass
pub const ROOT_ACCESS_TOKEN: &str = "root";

/// Admin session that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewAdminSession {
    pub admin_id: AdminId,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl NewAdminSession {
    pub fn new(admin_id: AdminId, access_token: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            admin_id,
            access_token,
            access_expires_at: now + ttl,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn with_id(self, id: AdminSessionId) -> AdminSession {
        AdminSession {
            id,
            admin_id: self.admin_id,
            access_token: self.access_token,
            access_expires_at: self.access_expires_at,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Persisted administrator session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSession {
    pub id: AdminSessionId,
    pub admin_id: AdminId,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl AdminSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expires_at
    }

    /// Record activity without touching `access_expires_at`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// Sentinel returned for a root login.
///
/// Never persisted, never cached and without expiry; it cannot be resolved
/// through `validate_access_token` or revoked through `invalidate_*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootSession {
    pub access_token: &'static str,
    pub is_root: bool,
}

impl Default for RootSession {
    fn default() -> Self {
        Self {
            access_token: ROOT_ACCESS_TOKEN,
            is_root: true,
        }
    }
}
