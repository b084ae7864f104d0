//! Per-client request throttling.
//!
//! Each tier is a fixed window per client key: the first request opens the
//! window, up to `limit` requests are admitted inside it, and the first
//! request after the window elapses opens a new one. Rejections do not
//! consume budget.
//!
//! Limiters are constructed once and handed to the router; there is no
//! process-wide limiter state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_STRICT_LIMIT: u32 = 10;
pub const DEFAULT_LENIENT_LIMIT: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

// Above this many tracked keys, elapsed windows are dropped on the next check.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitTier {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitTier {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Credential-entry endpoints (register, login).
    #[must_use]
    pub fn strict() -> Self {
        Self::new(DEFAULT_STRICT_LIMIT, DEFAULT_WINDOW)
    }

    /// Every other endpoint.
    #[must_use]
    pub fn lenient() -> Self {
        Self::new(DEFAULT_LENIENT_LIMIT, DEFAULT_WINDOW)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug)]
pub struct WindowRateLimiter {
    tier: RateLimitTier,
    windows: Mutex<HashMap<String, Window>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(tier: RateLimitTier) -> Self {
        Self {
            tier,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn tier(&self) -> RateLimitTier {
        self.tier
    }

    /// Drop windows that have already elapsed.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, window| now.duration_since(window.started) < self.tier.window);
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        // The whole check-and-increment runs under one lock.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started) < self.tier.window);
        }

        match windows.get_mut(key) {
            None => {
                if self.tier.limit == 0 {
                    return RateLimitDecision::Limited;
                }
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        started: now,
                    },
                );
                RateLimitDecision::Allowed
            }
            Some(window) if now.duration_since(window.started) >= self.tier.window => {
                if self.tier.limit == 0 {
                    return RateLimitDecision::Limited;
                }
                window.count = 1;
                window.started = now;
                RateLimitDecision::Allowed
            }
            Some(window) if window.count < self.tier.limit => {
                window.count += 1;
                RateLimitDecision::Allowed
            }
            Some(_) => RateLimitDecision::Limited,
        }
    }
}

/// The two independently configured tiers used by the HTTP boundary.
#[derive(Clone)]
pub struct RateLimiters {
    pub strict: Arc<dyn RateLimiter>,
    pub lenient: Arc<dyn RateLimiter>,
}

impl RateLimiters {
    #[must_use]
    pub fn new(strict: RateLimitTier, lenient: RateLimitTier) -> Self {
        Self {
            strict: Arc::new(WindowRateLimiter::new(strict)),
            lenient: Arc::new(WindowRateLimiter::new(lenient)),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            strict: Arc::new(NoopRateLimiter),
            lenient: Arc::new(NoopRateLimiter),
        }
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(RateLimitTier::strict(), RateLimitTier::lenient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> WindowRateLimiter {
        WindowRateLimiter::new(RateLimitTier::new(limit, Duration::from_secs(60)))
    }

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..1000 {
            assert_eq!(limiter.check("127.0.0.1"), RateLimitDecision::Allowed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admits_exactly_limit_per_window() {
        let limiter = limiter(3);
        for _ in 0..3 {
            assert_eq!(limiter.check("1.2.3.4"), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check("1.2.3.4"), RateLimitDecision::Limited);
        assert_eq!(limiter.check("1.2.3.4"), RateLimitDecision::Limited);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_elapsing() {
        let limiter = limiter(2);
        assert!(limiter.check("1.2.3.4").is_allowed());
        assert!(limiter.check("1.2.3.4").is_allowed());
        assert!(!limiter.check("1.2.3.4").is_allowed());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!limiter.check("1.2.3.4").is_allowed());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check("1.2.3.4").is_allowed());
        assert!(limiter.check("1.2.3.4").is_allowed());
        assert!(!limiter.check("1.2.3.4").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("1.1.1.1").is_allowed());
        assert!(!limiter.check("1.1.1.1").is_allowed());
        assert!(limiter.check("2.2.2.2").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_rejects_everything() {
        let limiter = limiter(0);
        assert!(!limiter.check("1.1.1.1").is_allowed());
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_elapsed_windows() {
        let limiter = limiter(5);
        limiter.check("1.1.1.1");
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("2.2.2.2");
        tokio::time::advance(Duration::from_secs(30)).await;

        limiter.prune();
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_checks_never_over_admit() {
        let limiter = Arc::new(limiter(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check("10.0.0.1").is_allowed())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(0))
            .sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn default_tiers_match_service_defaults() {
        assert_eq!(RateLimitTier::strict().limit, 10);
        assert_eq!(RateLimitTier::lenient().limit, 100);
        assert_eq!(RateLimitTier::strict().window, Duration::from_secs(60));
    }
}
