//! Expiry policy shared by the manager and the cache reaper

use chrono::Duration;

/// Windows that apply to every session regardless of its token expiries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Maximum idle time before forced expiry
    pub inactivity_window: Duration,
    /// Hard ceiling on session age, independent of refreshes
    pub max_lifespan: Duration,
}

impl ExpiryPolicy {
    pub fn new(inactivity_window: Duration, max_lifespan: Duration) -> Self {
        Self {
            inactivity_window,
            max_lifespan,
        }
    }
}
