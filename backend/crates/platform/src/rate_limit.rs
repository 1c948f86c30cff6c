//! Rate Limiting Infrastructure
//!
//! Common rate limiting abstractions and an in-memory keyed limiter backed
//! by `governor`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::HashMapStateStore;
use governor::{Quota, RateLimiter};
use parking_lot::Mutex;

use crate::clock::Clock;

/// Rate limit configuration
///
/// Interpreted as a token bucket: `max_requests` is the burst capacity and
/// the bucket refills at `max_requests` tokens per `window`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    /// One token every `window / max_requests`, bursting up to `max_requests`
    pub fn quota(&self) -> Result<Quota, RateLimitError> {
        let burst = NonZeroU32::new(self.max_requests)
            .ok_or_else(|| RateLimitError::invalid_config("max_requests must be positive"))?;
        Quota::with_period(self.window / burst.get())
            .map(|quota| quota.allow_burst(burst))
            .ok_or_else(|| RateLimitError::invalid_config("window is too short for max_requests"))
    }
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

/// Failure of the rate limit backend itself (not a rejection)
#[derive(Debug, thiserror::Error)]
#[error("Rate limit backend error: {0}")]
pub struct RateLimitError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl RateLimitError {
    pub fn invalid_config(reason: &str) -> Self {
        Self(format!("invalid rate limit config: {reason}").into())
    }
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Check and consume one unit of the limit for `key`
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;
}

/// [`Clock`] seen through `governor`: time elapsed since the store was built
#[derive(Clone)]
struct GovernorClock {
    clock: Arc<dyn Clock>,
    origin: DateTime<Utc>,
}

impl GovernorClock {
    fn new(clock: Arc<dyn Clock>) -> Self {
        let origin = clock.now();
        Self { clock, origin }
    }
}

impl governor::clock::Clock for GovernorClock {
    type Instant = Duration;

    fn now(&self) -> Duration {
        (self.clock.now() - self.origin).to_std().unwrap_or_default()
    }
}

type KeyedLimiter =
    RateLimiter<String, HashMapStateStore<String>, GovernorClock, StateInformationMiddleware>;

/// Keyed limiter for one quota, with the time of its last cleanup
struct QuotaLimiter {
    limiter: KeyedLimiter,
    retained_at: Mutex<DateTime<Utc>>,
}

/// In-process keyed token bucket limiter
///
/// One `governor` limiter per distinct config; keys within it are
/// independent buckets.
#[derive(Clone)]
pub struct MemoryRateLimitStore {
    limiters: Arc<Mutex<HashMap<(u32, Duration), Arc<QuotaLimiter>>>>,
    clock: GovernorClock,
}

impl MemoryRateLimitStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            limiters: Arc::new(Mutex::new(HashMap::new())),
            clock: GovernorClock::new(clock),
        }
    }

    fn limiter_for(&self, config: &RateLimitConfig) -> Result<Arc<QuotaLimiter>, RateLimitError> {
        let quota = config.quota()?;
        let mut limiters = self.limiters.lock();
        let entry = limiters
            .entry((config.max_requests, config.window))
            .or_insert_with(|| {
                Arc::new(QuotaLimiter {
                    limiter: RateLimiter::hashmap_with_clock(quota, self.clock.clone())
                        .with_middleware::<StateInformationMiddleware>(),
                    retained_at: Mutex::new(self.clock.clock.now()),
                })
            });
        Ok(Arc::clone(entry))
    }

    /// Drop keys whose bucket has refilled completely
    pub fn retain_recent(&self) {
        let limiters: Vec<_> = self.limiters.lock().values().cloned().collect();
        for quota in limiters {
            quota.limiter.retain_recent();
        }
    }

    /// Number of keys currently tracked across all quotas
    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .values()
            .map(|quota| quota.limiter.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, key: &str, config: &RateLimitConfig) -> Result<RateLimitResult, RateLimitError> {
        let quota = self.limiter_for(config)?;
        let now = self.clock.clock.now();

        // Once per window every idle bucket is full again and can go
        {
            let mut retained_at = quota.retained_at.lock();
            if (now - *retained_at).to_std().unwrap_or_default() >= config.window {
                quota.limiter.retain_recent();
                *retained_at = now;
            }
        }

        let result = match quota.limiter.check_key(&key.to_string()) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                let per_token = config.window / config.max_requests.max(1);
                let refill = per_token * (config.max_requests - remaining.min(config.max_requests));
                RateLimitResult {
                    allowed: true,
                    remaining,
                    reset_at_ms: now.timestamp_millis() + refill.as_millis() as i64,
                }
            }
            Err(not_until) => {
                let wait = not_until.wait_time_from(governor::clock::Clock::now(&self.clock));
                RateLimitResult {
                    allowed: false,
                    remaining: 0,
                    reset_at_ms: now.timestamp_millis() + wait.as_millis() as i64,
                }
            }
        };
        Ok(result)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.check(key, config)
    }
}
