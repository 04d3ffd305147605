//! Per-client request admission.
//!
//! Flow Overview: every gated request resolves to a client key (forwarded address or TCP
//! peer). The key owns a fixed-window bucket; the first `limit` requests inside the window
//! are admitted, the rest are rejected until the window elapses and the counter resets.
//!
//! Buckets live in a sharded `DashMap`. The `entry` API holds the shard lock for the whole
//! read-modify-write, so concurrent requests for the same key never lose an increment.
//!
//! Scaling: state is process-local. Several instances behind a load balancer each enforce
//! their own window.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Length of one admission window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

impl RateLimitDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub trait RateLimiter: Send + Sync {
    /// Count one request for `client_key` against `limit` requests per window.
    fn admit(&self, client_key: &str, limit: u32) -> RateLimitDecision;

    /// Number of clients currently tracked.
    fn tracked_clients(&self) -> usize;

    /// Drop state that can no longer influence a decision.
    fn sweep(&self) {}
}

/// Admits everything; used when the deployment disables limiting.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn admit(&self, _client_key: &str, _limit: u32) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn tracked_clients(&self) -> usize {
        0
    }
}

#[derive(Debug)]
struct ClientBucket {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    buckets: DashMap<String, ClientBucket>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buckets: DashMap::new(),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn admit(&self, client_key: &str, limit: u32) -> RateLimitDecision {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(client_key.to_string())
            .or_insert_with(|| ClientBucket {
                count: 0,
                window_start: now,
            });

        if now.duration_since(bucket.window_start) > self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= limit {
            debug!(client = client_key, limit, "admission window exhausted");
            return RateLimitDecision::Limited;
        }

        bucket.count += 1;
        RateLimitDecision::Allowed
    }

    fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    fn sweep(&self) {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.window_start) <= self.window);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, "swept idle admission buckets");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..100 {
            assert_eq!(limiter.admit("10.0.0.1", 1), RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_then_rejects() {
        let limiter = FixedWindowLimiter::default();
        for _ in 0..5 {
            assert!(limiter.admit("a", 5).is_allowed());
        }
        assert_eq!(limiter.admit("a", 5), RateLimitDecision::Limited);
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_counted_independently() {
        let limiter = FixedWindowLimiter::default();
        assert!(limiter.admit("a", 1).is_allowed());
        assert!(!limiter.admit("a", 1).is_allowed());
        assert!(limiter.admit("b", 1).is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_one_minute() {
        // limit = 3/min: three requests inside five seconds, a fourth five seconds later,
        // then one more at +61s from the first request.
        let limiter = FixedWindowLimiter::default();
        for _ in 0..3 {
            assert!(limiter.admit("A", 3).is_allowed());
            tokio::time::advance(Duration::from_millis(1500)).await;
        }
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(limiter.admit("A", 3), RateLimitDecision::Limited);

        tokio::time::advance(Duration::from_secs(56)).await;
        assert!(limiter.admit("A", 3).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn counter_does_not_reset_on_exact_boundary() {
        let limiter = FixedWindowLimiter::default();
        assert!(limiter.admit("A", 1).is_allowed());
        tokio::time::advance(DEFAULT_WINDOW).await;
        assert!(!limiter.admit("A", 1).is_allowed());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.admit("A", 1).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_rejects_everything() {
        let limiter = FixedWindowLimiter::default();
        assert_eq!(limiter.admit("A", 0), RateLimitDecision::Limited);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_elapsed_buckets() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(10));
        limiter.admit("old", 5);
        tokio::time::advance(Duration::from_secs(11)).await;
        limiter.admit("fresh", 5);

        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.buckets.contains_key("fresh"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_exceed_limit() {
        let limiter = Arc::new(FixedWindowLimiter::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..50)
                    .filter(|_| limiter.admit("shared", 100).is_allowed())
                    .count()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            admitted += handle.await.unwrap_or(0);
        }
        assert_eq!(admitted, 100);
    }
}
