//! Per-client rate limiting for the confirmation endpoint

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::config::RateLimitConfig;
use crate::error::{AppError, AppResult};

/// Keyed rate limiter over client IPs
pub struct RateLimitMiddleware {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { limiter: None };
        }

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self { limiter: Some(RateLimiter::keyed(quota)) }
    }

    /// Check the per-IP quota, erring with `RateLimit` when exhausted
    pub fn check(&self, client_ip: &str) -> AppResult<()> {
        match &self.limiter {
            None => Ok(()),
            Some(limiter) => limiter
                .check_key(&client_ip.to_string())
                .map_err(|_| AppError::RateLimit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_limiter_always_allows() {
        let limiter = RateLimitMiddleware::new(&RateLimitConfig {
            enabled: false,
            requests_per_minute: 1,
            burst_size: 1,
        });
        for _ in 0..100 {
            assert!(limiter.check("10.0.0.1").is_ok());
        }
    }

    #[test]
    fn test_burst_is_enforced_per_ip() {
        let limiter = RateLimitMiddleware::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 2,
        });

        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_err());

        // A different client has its own bucket
        assert!(limiter.check("10.0.0.2").is_ok());
    }
}
