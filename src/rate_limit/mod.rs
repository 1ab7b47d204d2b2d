//! Abuse protection: fixed-window request limits and per-round IP quotas.
//!
//! Both structures live in process memory, so limits apply per server
//! instance. [`CountingStore`] is the seam for a shared counter backend.

mod client_ip;
mod counter;
mod quota;
mod window;

use std::time::SystemTime;

pub use self::client_ip::{ClientIp, UNKNOWN_CLIENT, client_ip};
pub use self::counter::{CountingStore, MemoryCounter, WindowCount};
pub use self::quota::IpQuotaTracker;
pub use self::window::{CategoryLimits, RateCategory, RateLimitDecision, SlidingWindowLimiter};

use crate::config::AppConfig;

/// Entries removed by one maintenance sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// IP quota entries evicted for inactivity.
    pub idle_ips: usize,
    /// Request windows dropped after expiry.
    pub expired_windows: usize,
}

/// Limiter bundle shared through the application state.
pub struct RateLimiter {
    quota: IpQuotaTracker,
    window: SlidingWindowLimiter,
}

impl RateLimiter {
    /// Bundle the two limiters.
    pub fn new(quota: IpQuotaTracker, window: SlidingWindowLimiter) -> Self {
        Self { quota, window }
    }

    /// Build both limiters from the runtime configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            IpQuotaTracker::new(
                config.posts_per_round,
                config.votes_per_round,
                config.quota_max_age,
            ),
            SlidingWindowLimiter::new(config.limits, config.rate_window),
        )
    }

    /// Per-round IP quotas.
    pub fn quota(&self) -> &IpQuotaTracker {
        &self.quota
    }

    /// Per-category request windows.
    pub fn window(&self) -> &SlidingWindowLimiter {
        &self.window
    }

    /// Evict idle IP quotas and expired windows.
    pub fn sweep(&self, now: SystemTime) -> SweepReport {
        SweepReport {
            idle_ips: self.quota.sweep(now),
            expired_windows: self.window.expire(now),
        }
    }
}
