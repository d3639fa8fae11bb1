//! In-memory rate limiting backed by the `governor` crate (GCRA algorithm).
//!
//! Applied to the one intent a client can spam without bound: raising a
//! hand. Keys are per user, so one noisy client never throttles the room.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::Clock;

use crate::error::{Error, Result};

/// Keyed limiter map per (max_requests, window_seconds) pair, since
/// governor fixes the quota per limiter instance.
type LimiterMap = dashmap::DashMap<(u32, u64), Arc<DefaultKeyedRateLimiter<String>>>;

#[derive(Clone)]
pub struct RateLimiter {
    limiters: Arc<LimiterMap>,
    key_prefix: String,
}

impl RateLimiter {
    #[must_use]
    pub fn new(key_prefix: String) -> Self {
        Self {
            limiters: Arc::new(dashmap::DashMap::new()),
            key_prefix,
        }
    }

    /// Get or create the governor keyed limiter for the given quota.
    fn get_limiter(
        &self,
        max_requests: u32,
        window_seconds: u64,
    ) -> Arc<DefaultKeyedRateLimiter<String>> {
        let key = (max_requests, window_seconds);
        if let Some(limiter) = self.limiters.get(&key) {
            return Arc::clone(limiter.value());
        }

        // One cell per period, bursting up to max_requests over the window.
        let period = Duration::from_secs(window_seconds)
            .checked_div(max_requests)
            .unwrap_or(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
            .allow_burst(NonZeroU32::new(max_requests).unwrap_or(nonzero!(1u32)));

        let limiter = Arc::new(GovernorRateLimiter::keyed(quota));
        self.limiters.insert(key, Arc::clone(&limiter));
        limiter
    }

    /// Check whether a request under `key` is allowed. Rejections carry
    /// the seconds until the next cell frees up.
    pub fn check(&self, key: &str, max_requests: u32, window_seconds: u64) -> Result<()> {
        let limiter = self.get_limiter(max_requests, window_seconds);
        let full_key = format!("{}{}", self.key_prefix, key);
        match limiter.check_key(&full_key) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait =
                    not_until.wait_time_from(governor::clock::DefaultClock::default().now());
                Err(Error::RateLimited {
                    retry_after_seconds: wait.as_secs().max(1),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_burst_limit() {
        let limiter = RateLimiter::new("test:".to_string());
        for i in 0..5 {
            limiter
                .check("user:a:raise_hand", 5, 60)
                .unwrap_or_else(|_| panic!("request {i} should succeed"));
        }
        let err = limiter
            .check("user:a:raise_hand", 5, 60)
            .expect_err("6th request");
        assert!(matches!(err, Error::RateLimited { retry_after_seconds } if retry_after_seconds >= 1));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new("test:".to_string());
        for _ in 0..3 {
            limiter.check("user:a:raise_hand", 3, 60).expect("a");
        }
        assert!(limiter.check("user:a:raise_hand", 3, 60).is_err());
        assert!(limiter.check("user:b:raise_hand", 3, 60).is_ok());
    }

    #[test]
    fn distinct_quotas_use_distinct_limiters() {
        let limiter = RateLimiter::new("test:".to_string());
        limiter.check("k", 1, 60).expect("first");
        assert!(limiter.check("k", 1, 60).is_err());
        // The same key under a looser quota is a separate bucket.
        assert!(limiter.check("k", 10, 60).is_ok());
    }
}
