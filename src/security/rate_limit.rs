//! Fixed-window rate limiting per client.
//!
//! Each client key owns a window `{count, window_start}`. The first request
//! opens a window; once `window` has elapsed the next request opens a fresh
//! one. A request that would take `count` past `max_requests` is rejected.
//!
//! Windows live in a `DashMap`, so the increment-or-reset for one key only
//! locks that key's shard.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::observability::metrics;
use crate::security::clock::{Clock, SystemClock};

/// Key used when the client address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Counter state for one client.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

/// Quota left after an admitted request, for the `RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateStatus {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

/// Shared fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u32,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            clock,
        }
    }

    /// Count one request for `client_key`.
    pub fn check(&self, client_key: &str) -> Result<RateStatus, ApiError> {
        let now = self.clock.now();

        let (count, window_start) = {
            let mut entry = self
                .windows
                .entry(client_key.to_string())
                .or_insert(RateWindow {
                    count: 0,
                    window_start: now,
                });

            if now.duration_since(entry.window_start) >= self.window {
                entry.count = 0;
                entry.window_start = now;
            }
            entry.count = entry.count.saturating_add(1);
            (entry.count, entry.window_start)
        };

        let reset_after = self.window.saturating_sub(now.duration_since(window_start));

        if count > self.max_requests {
            tracing::warn!(client = %client_key, count, limit = self.max_requests, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Err(ApiError::rate_limited(ceil_secs(reset_after)));
        }

        Ok(RateStatus {
            limit: self.max_requests,
            remaining: self.max_requests - count,
            reset_after,
        })
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.window_start) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a live window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Whole seconds, rounded up so clients never retry early.
pub fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::clock::MockClock;

    fn limiter(max: u32, window_secs: u64) -> (RateLimiter, MockClock) {
        let clock = MockClock::default();
        let config = RateLimitConfig {
            enabled: true,
            window_secs,
            max_requests: max,
            sweep_interval_secs: 60,
        };
        (RateLimiter::with_clock(&config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let (limiter, _clock) = limiter(3, 60);

        for expected_remaining in [2, 1, 0] {
            let status = limiter.check("10.0.0.1").unwrap();
            assert_eq!(status.remaining, expected_remaining);
        }

        let err = limiter.check("10.0.0.1").unwrap_err();
        assert_eq!(err.status().as_u16(), 429);
        assert_eq!(err.code(), "ERR_RATE_LIMIT");
        assert!(matches!(err, ApiError::RateLimited { retry_after_secs: 60 }));
    }

    #[test]
    fn test_window_reset_allows_again() {
        let (limiter, clock) = limiter(2, 60);

        limiter.check("a").unwrap();
        limiter.check("a").unwrap();
        assert!(limiter.check("a").is_err());

        clock.advance(Duration::from_secs(30));
        let err = limiter.check("a").unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after_secs: 30 }));

        clock.advance(Duration::from_secs(31));
        let status = limiter.check("a").unwrap();
        assert_eq!(status.remaining, 1, "counter restarts at 1 in a new window");
        assert_eq!(status.reset_after, Duration::from_secs(60));
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _clock) = limiter(1, 60);

        limiter.check("a").unwrap();
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let (limiter, clock) = limiter(5, 10);
        limiter.check("a").unwrap();
        clock.advance(Duration::from_secs(5));
        limiter.check("b").unwrap();

        clock.advance(Duration::from_secs(6));
        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
    }
}
