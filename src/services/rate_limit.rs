// Rate limiting for credential endpoints
// In-memory GCRA limiter (governor) keyed by endpoint and client IP

use std::num::NonZeroU32;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use tracing::{instrument, warn};

/// Rate limit check result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Retry after seconds (if blocked)
    pub retry_after: Option<u64>,
}

/// Per-IP limiter for sign-in, sign-up and verification endpoints
pub struct AuthRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
    per_minute: u32,
}

impl AuthRateLimiter {
    pub fn new(per_minute: u32) -> Self {
        let burst = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(burst)),
            clock: DefaultClock::default(),
            per_minute: burst.get(),
        }
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Check and consume one request for `endpoint` from `client_ip`
    #[instrument(skip(self))]
    pub fn check(&self, endpoint: &str, client_ip: &str) -> RateLimitResult {
        let key = format!("{}:{}", endpoint, client_ip);

        match self.limiter.check_key(&key) {
            Ok(()) => RateLimitResult {
                allowed: true,
                retry_after: None,
            },
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                warn!(endpoint, ip = client_ip, retry_after, "[RATE_LIMIT] Request blocked");
                RateLimitResult {
                    allowed: false,
                    retry_after: Some(retry_after.max(1)),
                }
            },
        }
    }

    /// Drop state for keys that are back to a full quota
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_quota_then_blocks() {
        let limiter = AuthRateLimiter::new(3);

        for _ in 0..3 {
            assert!(limiter.check("login", "10.0.0.1").allowed);
        }

        let blocked = limiter.check("login", "10.0.0.1");
        assert!(!blocked.allowed);
        assert!(blocked.retry_after.unwrap() >= 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = AuthRateLimiter::new(1);

        assert!(limiter.check("login", "10.0.0.1").allowed);
        assert!(!limiter.check("login", "10.0.0.1").allowed);

        assert!(limiter.check("login", "10.0.0.2").allowed);
        assert!(limiter.check("register", "10.0.0.1").allowed);
        assert_eq!(limiter.tracked_keys(), 3);
    }

    #[test]
    fn test_zero_quota_falls_back_to_one() {
        let limiter = AuthRateLimiter::new(0);
        assert_eq!(limiter.per_minute(), 1);
    }
}
