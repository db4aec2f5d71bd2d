//! Sliding-window rate limiter keyed by client address.
//!
//! Each client gets a window of request timestamps. On every
//! [`RateLimiter::check`], timestamps older than the window are pruned and
//! the request is admitted only while fewer than `max_requests` remain.
//!
//! When the number of tracked clients exceeds `max_tracked_clients`, the
//! client with the oldest last access is evicted, which bounds memory under
//! address churn.
//!
//! Timestamps come from [`tokio::time::Instant`] so window expiry follows
//! the paused test clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

// ── SlidingWindow ────────────────────────────────────────────────────────

/// Per-client window state. Timestamps are appended monotonically, so the
/// vector is sorted oldest first.
struct SlidingWindow {
    timestamps: Vec<Instant>,
    /// Access counter value at last check (for LRU eviction).
    last_access: u64,
}

// ── RateLimiter ──────────────────────────────────────────────────────────

/// Per-client sliding-window limiter shared by all request handlers.
pub struct RateLimiter {
    windows: RwLock<HashMap<String, SlidingWindow>>,
    window: Duration,
    /// Requests admitted per client per window. 0 = unlimited.
    max_requests: u32,
    max_tracked_clients: usize,
    access_counter: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window_secs` for each
    /// client. `max_requests == 0` disables limiting.
    pub fn new(window_secs: u32, max_requests: u32) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            window: Duration::from_secs(u64::from(window_secs)),
            max_requests,
            max_tracked_clients: 10_000,
            access_counter: AtomicU64::new(0),
        }
    }

    /// Set the eviction threshold. Default: 10,000.
    pub fn with_max_tracked_clients(mut self, max: usize) -> Self {
        self.max_tracked_clients = max;
        self
    }

    /// Record a request from `client` and report whether it is admitted.
    /// Rejected requests do not consume window capacity.
    pub fn check(&self, client: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let now = Instant::now();
        let order = self.access_counter.fetch_add(1, Ordering::Relaxed);

        let mut windows = self.windows.write();
        let entry = windows
            .entry(client.to_string())
            .or_insert_with(|| SlidingWindow {
                timestamps: Vec::new(),
                last_access: order,
            });
        entry.last_access = order;
        entry
            .timestamps
            .retain(|ts| now.duration_since(*ts) < self.window);

        if entry.timestamps.len() >= self.max_requests as usize {
            return false;
        }
        entry.timestamps.push(now);

        if windows.len() > self.max_tracked_clients {
            evict_oldest(&mut windows);
        }
        true
    }

    /// Requests from `client` still inside the window.
    pub fn count(&self, client: &str) -> u32 {
        let now = Instant::now();
        self.windows.read().get(client).map_or(0, |entry| {
            entry
                .timestamps
                .iter()
                .filter(|ts| now.duration_since(**ts) < self.window)
                .count() as u32
        })
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.read().len()
    }
}

fn evict_oldest(windows: &mut HashMap<String, SlidingWindow>) {
    let oldest = windows
        .iter()
        .min_by_key(|(_, entry)| entry.last_access)
        .map(|(key, _)| key.clone());
    if let Some(key) = oldest {
        windows.remove(&key);
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn default_policy_admits_one_per_window() {
        let limiter = RateLimiter::new(3, 1);
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert_eq!(limiter.count("10.0.0.1"), 1);
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(60, 2);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn zero_means_unlimited() {
        let limiter = RateLimiter::new(3, 0);
        for _ in 0..100 {
            assert!(limiter.check("a"));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(3, 1);
        assert!(limiter.check("a"));

        tokio::time::advance(Duration::from_millis(2900)).await;
        assert!(!limiter.check("a"));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(limiter.check("a"));
        assert_eq!(limiter.count("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_requests_do_not_extend_window() {
        let limiter = RateLimiter::new(3, 1);
        assert!(limiter.check("a"));
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(500)).await;
            assert!(!limiter.check("a"));
        }
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check("a"));
    }

    #[test]
    fn evicts_least_recent_client() {
        let limiter = RateLimiter::new(60, 5).with_max_tracked_clients(2);
        limiter.check("first");
        limiter.check("second");
        limiter.check("first");
        limiter.check("third");
        assert_eq!(limiter.tracked_clients(), 2);
        assert_eq!(limiter.count("second"), 0);
        assert_eq!(limiter.count("first"), 2);
        assert_eq!(limiter.count("third"), 1);
    }

    #[test]
    fn concurrent_checks_respect_limit() {
        let limiter = Arc::new(RateLimiter::new(60, 10));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..10).filter(|_| limiter.check("shared")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 10);
    }
}
