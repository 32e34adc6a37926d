//! Per-client rate limiting
//!
//! Token bucket keyed by the collector's `client_id`. The WhatsApp intake
//! handler consults it after authentication (the key lives in the request
//! body, so this is not a tower layer). Exhaustion surfaces as 429 with a
//! `Retry-After` derived from the refill rate.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

/// Bucket parameters
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Tokens refilled per minute
    pub per_minute: u32,
    /// Bucket capacity
    pub burst: u32,
}

impl RateLimitConfig {
    pub fn new(per_minute: u32, burst: u32) -> Self {
        Self {
            per_minute: per_minute.max(1),
            burst: burst.max(1),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    updated_at: Instant,
}

/// Shared limiter state
pub struct ClientRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `client_id`; `Err(retry_after_seconds)` on
    /// exhaustion
    pub fn check(&self, client_id: &str) -> Result<(), u64> {
        let refill_per_second = f64::from(self.config.per_minute) / 60.0;
        let capacity = f64::from(self.config.burst);

        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(client_id.to_string()).or_insert(Bucket {
            tokens: capacity,
            updated_at: now,
        });

        let elapsed = now.duration_since(bucket.updated_at).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * refill_per_second).min(capacity);
            bucket.updated_at = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after = (deficit / refill_per_second).ceil().max(1.0) as u64;
            Err(retry_after)
        }
    }

    /// Drop buckets idle longer than `max_idle` (housekeeping)
    pub fn cleanup(&self, max_idle: std::time::Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .retain(|_, bucket| now.duration_since(bucket.updated_at) < max_idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject_with_positive_retry_after() {
        let limiter = ClientRateLimiter::new(RateLimitConfig::new(2, 2));

        assert!(limiter.check("c1").is_ok());
        assert!(limiter.check("c1").is_ok());
        let retry_after = limiter.check("c1").unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_clients_have_independent_buckets() {
        let limiter = ClientRateLimiter::new(RateLimitConfig::new(2, 1));
        assert!(limiter.check("c1").is_ok());
        assert!(limiter.check("c1").is_err());
        assert!(limiter.check("c2").is_ok());
    }

    #[test]
    fn test_cleanup_drops_idle_buckets() {
        let limiter = ClientRateLimiter::new(RateLimitConfig::new(2, 2));
        let _ = limiter.check("c1");
        limiter.cleanup(std::time::Duration::ZERO);
        // Fresh bucket again after cleanup
        assert!(limiter.check("c1").is_ok());
        assert!(limiter.check("c1").is_ok());
    }
}
