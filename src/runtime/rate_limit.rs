//! Outbound request budget for the native runtime
//!
//! Provider APIs cap request volume per minute or per hour rather than per
//! second, so the budget is expressed as a request count over a period and
//! handed to governor as a replenish interval.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Request budget of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per `period`
    pub requests: u32,
    pub period: Duration,
    /// Requests that may be sent back to back before throttling starts
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(10)
    }
}

impl RateLimiterConfig {
    pub fn per_second(requests: u32) -> Self {
        Self::per_period(requests, Duration::from_secs(1))
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::per_period(requests, Duration::from_secs(60))
    }

    /// `requests` spread over `period`, with a burst of the same size
    pub fn per_period(requests: u32, period: Duration) -> Self {
        Self {
            requests,
            period,
            burst: requests,
        }
    }

    #[must_use]
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// Time between two replenished requests, never zero
    pub fn interval(&self) -> Duration {
        let requests = self.requests.max(1);
        (self.period / requests).max(Duration::from_nanos(1))
    }

    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(self.interval())
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}

/// Shared token bucket; clones draw from the same budget
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    throttled: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
            throttled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take one request from the budget, waiting when it is spent.
    ///
    /// Returns `true` when the caller had to wait.
    pub async fn acquire(&self) -> bool {
        if self.limiter.check().is_ok() {
            return false;
        }
        self.throttled.fetch_add(1, Ordering::Relaxed);
        trace!("Request budget spent, waiting");
        self.limiter.until_ready().await;
        true
    }

    /// Take one request only if the budget allows it right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Requests that had to wait for the budget
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("throttled", &self.throttled())
            .finish()
    }
}
