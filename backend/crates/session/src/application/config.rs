//! Application Configuration
//!
//! Configuration for the session lifecycle managers.

use std::fmt;
use std::time::Duration;

use platform::crypto::constant_time_eq;
use platform::rate_limit::RateLimitConfig;

use crate::domain::value_object::expiry_policy::ExpiryPolicy;

/// Environment variable holding the root admin username
pub const ROOT_ADMIN_USERNAME_ENV: &str = "ROOT_ADMIN_USERNAME";
/// Environment variable holding the root admin password
pub const ROOT_ADMIN_PASSWORD_ENV: &str = "ROOT_ADMIN_PASSWORD";

/// Default budget for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest duration added to a timestamp (100 years); larger values are clamped
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Which key session creation is rate limited under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimitScope {
    /// One bucket shared by every caller
    #[default]
    Global,
    /// One bucket per user (or admin)
    PerUser,
}

/// User session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Access token TTL (30 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token TTL (24 hours)
    pub refresh_token_ttl: Duration,
    /// Maximum idle time (12 hours)
    pub inactivity_window: Duration,
    /// Absolute session lifespan, not extended by refresh (7 days)
    pub max_lifespan: Duration,
    /// Concurrent session cap per user
    pub max_sessions_per_user: usize,
    /// Cache reaper period
    pub sweep_interval: Duration,
    /// Budget for each individual store call
    pub store_timeout: Duration,
    /// Session creation rate limit
    pub rate_limit: RateLimitConfig,
    pub rate_limit_scope: RateLimitScope,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(30 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 3600),
            inactivity_window: Duration::from_secs(12 * 3600),
            max_lifespan: Duration::from_secs(7 * 24 * 3600),
            max_sessions_per_user: 5,
            sweep_interval: Duration::from_secs(30 * 60),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            rate_limit: RateLimitConfig::new(10, 60),
            rate_limit_scope: RateLimitScope::Global,
        }
    }
}

impl SessionConfig {
    /// Create config for development (relaxed rate limit, per-user buckets)
    pub fn development() -> Self {
        Self {
            rate_limit: RateLimitConfig::new(1_000, 60),
            rate_limit_scope: RateLimitScope::PerUser,
            ..Default::default()
        }
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(
            to_chrono(self.inactivity_window),
            to_chrono(self.max_lifespan),
        )
    }

    pub fn access_token_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.access_token_ttl)
    }

    pub fn refresh_token_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.refresh_token_ttl)
    }
}

/// Admin session configuration
#[derive(Debug, Clone)]
pub struct AdminSessionConfig {
    /// Fixed admin session lifetime (30 minutes)
    pub access_token_ttl: Duration,
    pub max_sessions_per_admin: usize,
    /// Cache reaper period (5 minutes)
    pub sweep_interval: Duration,
    pub store_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_scope: RateLimitScope,
    /// Root bypass; disabled when `None`
    pub root: Option<RootCredentials>,
}

impl Default for AdminSessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(30 * 60),
            max_sessions_per_admin: 3,
            sweep_interval: Duration::from_secs(5 * 60),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            rate_limit: RateLimitConfig::new(10, 60),
            rate_limit_scope: RateLimitScope::Global,
            root: None,
        }
    }
}

impl AdminSessionConfig {
    /// Default config with root credentials read from the environment
    pub fn from_env() -> Self {
        Self {
            root: RootCredentials::from_env(),
            ..Default::default()
        }
    }

    pub fn access_token_ttl_chrono(&self) -> chrono::Duration {
        to_chrono(self.access_token_ttl)
    }
}

/// Root admin credentials.
///
/// Matching credentials bypass the admin directory entirely.
#[derive(Clone)]
pub struct RootCredentials {
    username: String,
    password: String,
}

impl RootCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `ROOT_ADMIN_USERNAME` / `ROOT_ADMIN_PASSWORD`.
    ///
    /// Returns `None` unless both are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(ROOT_ADMIN_USERNAME_ENV).ok()?;
        let password = std::env::var(ROOT_ADMIN_PASSWORD_ENV).ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        // Evaluate both so timing does not reveal which one differed
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Convert for timestamp arithmetic, clamped to [`MAX_DURATION`]
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration.min(MAX_DURATION)).unwrap_or(chrono::Duration::zero())
}
