//! Fixed-window request limits per IP and category.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use super::counter::{CountingStore, MemoryCounter};

/// Independent budgets for the different kinds of requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    /// Post submissions.
    Post,
    /// Vote submissions.
    Vote,
    /// Failed admin token checks.
    Auth,
    /// Public reads.
    General,
}

impl RateCategory {
    /// Name used in counter keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RateCategory::Post => "post",
            RateCategory::Vote => "vote",
            RateCategory::Auth => "auth",
            RateCategory::General => "general",
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests allowed per window, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryLimits {
    /// Post requests per window.
    pub post: u32,
    /// Vote requests per window.
    pub vote: u32,
    /// Failed admin attempts per window.
    pub auth: u32,
    /// Public reads per window.
    pub general: u32,
}

impl Default for CategoryLimits {
    fn default() -> Self {
        Self {
            post: 10,
            vote: 15,
            auth: 5,
            general: 50,
        }
    }
}

impl CategoryLimits {
    /// Budget of `category`.
    pub fn limit(&self, category: RateCategory) -> u32 {
        match category {
            RateCategory::Post => self.post,
            RateCategory::Vote => self.vote,
            RateCategory::Auth => self.auth,
            RateCategory::General => self.general,
        }
    }
}

/// Outcome of one rate-limited request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed.
    pub success: bool,
    /// Requests left in the window.
    pub remaining: u32,
    /// Instant the window closes.
    pub reset_at: SystemTime,
}

/// Fixed-window limiter keyed by `(category, ip)`.
pub struct SlidingWindowLimiter {
    store: Arc<dyn CountingStore>,
    limits: CategoryLimits,
    window: Duration,
}

impl SlidingWindowLimiter {
    /// Limiter backed by an in-process counter.
    pub fn new(limits: CategoryLimits, window: Duration) -> Self {
        Self::with_store(Arc::new(MemoryCounter::new()), limits, window)
    }

    /// Limiter counting through `store`.
    pub fn with_store(
        store: Arc<dyn CountingStore>,
        limits: CategoryLimits,
        window: Duration,
    ) -> Self {
        Self {
            store,
            limits,
            window,
        }
    }

    /// Count a request of `category` from `ip` against the configured limits.
    pub fn check(&self, ip: &str, category: RateCategory) -> RateLimitDecision {
        self.check_at(ip, category, SystemTime::now())
    }

    /// [`check`](Self::check) at an explicit instant.
    pub fn check_at(&self, ip: &str, category: RateCategory, now: SystemTime) -> RateLimitDecision {
        self.rate_limit_at(ip, category, self.limits.limit(category), self.window, now)
    }

    /// Count a request against an explicit `limit` per `window`.
    pub fn rate_limit(
        &self,
        ip: &str,
        category: RateCategory,
        limit: u32,
        window: Duration,
    ) -> RateLimitDecision {
        self.rate_limit_at(ip, category, limit, window, SystemTime::now())
    }

    /// [`rate_limit`](Self::rate_limit) at an explicit instant.
    pub fn rate_limit_at(
        &self,
        ip: &str,
        category: RateCategory,
        limit: u32,
        window: Duration,
        now: SystemTime,
    ) -> RateLimitDecision {
        let current = self.store.increment(&key(ip, category), window, now);
        RateLimitDecision {
            success: current.count <= limit,
            remaining: limit.saturating_sub(current.count),
            reset_at: current.reset_at,
        }
    }

    /// Denial `ip` would get for `category` right now, without counting a new hit.
    pub fn blocked_at(
        &self,
        ip: &str,
        category: RateCategory,
        now: SystemTime,
    ) -> Option<RateLimitDecision> {
        self.store
            .get(&key(ip, category))
            .filter(|current| {
                now <= current.reset_at && current.count >= self.limits.limit(category)
            })
            .map(|current| RateLimitDecision {
                success: false,
                remaining: 0,
                reset_at: current.reset_at,
            })
    }

    /// Drop expired windows.
    pub fn expire(&self, now: SystemTime) -> usize {
        self.store.expire(now)
    }
}

fn key(ip: &str, category: RateCategory) -> String {
    format!("{}:{}", category.as_str(), ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 + secs)
    }

    #[test]
    fn limit_is_enforced_within_the_window() {
        let limiter = SlidingWindowLimiter::new(CategoryLimits::default(), Duration::from_secs(60));

        for expected_remaining in (0..5).rev() {
            let decision = limiter.check_at("1.2.3.4", RateCategory::Auth, at(1));
            assert!(decision.success);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = limiter.check_at("1.2.3.4", RateCategory::Auth, at(2));
        assert!(!denied.success);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, at(61));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = SlidingWindowLimiter::new(CategoryLimits::default(), Duration::from_secs(60));
        for _ in 0..6 {
            limiter.check_at("ip", RateCategory::Auth, at(0));
        }
        let blocked = limiter.blocked_at("ip", RateCategory::Auth, at(10)).unwrap();
        assert_eq!(blocked.reset_at, at(60));
        assert!(limiter.blocked_at("other", RateCategory::Auth, at(10)).is_none());

        let decision = limiter.check_at("ip", RateCategory::Auth, at(61));
        assert!(decision.success);
        assert_eq!(decision.remaining, 4);
    }

    #[test]
    fn categories_and_ips_are_isolated() {
        let limiter = SlidingWindowLimiter::new(CategoryLimits::default(), Duration::from_secs(60));
        for _ in 0..10 {
            limiter.check_at("a", RateCategory::Post, at(0));
        }

        assert!(!limiter.check_at("a", RateCategory::Post, at(1)).success);
        assert!(limiter.check_at("a", RateCategory::Vote, at(1)).success);
        assert!(limiter.check_at("b", RateCategory::Post, at(1)).success);
    }

    #[test]
    fn explicit_limit_overrides_category_default() {
        let limiter = SlidingWindowLimiter::new(CategoryLimits::default(), Duration::from_secs(60));
        let window = Duration::from_secs(5);

        assert!(limiter.rate_limit_at("ip", RateCategory::General, 1, window, at(0)).success);
        assert!(!limiter.rate_limit_at("ip", RateCategory::General, 1, window, at(1)).success);
        assert!(limiter.rate_limit_at("ip", RateCategory::General, 1, window, at(6)).success);
    }
}
