//! Local outbound request budget
//!
//! Remote capabilities are rate-limited by their provider; this bucket caps
//! what we even attempt so a big document cannot burn the remote quota.

use std::time::Instant;

use parking_lot::Mutex;

struct BucketState {
    tokens: f64,
    updated_at: Instant,
}

/// Token bucket over all outbound capability calls
pub struct OutboundBudget {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl OutboundBudget {
    /// Bucket refilled at `per_minute / 60` with burst capacity `per_minute`
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute.max(1));
        Self {
            capacity,
            refill_per_second: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                updated_at: Instant::now(),
            }),
        }
    }

    /// Take one token; false means the caller should skip the remote call
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.updated_at).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
            state.updated_at = now;
        }
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exhausts_and_refills_over_time() {
        let budget = OutboundBudget::per_minute(2);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
    }

    #[test]
    fn test_zero_config_still_grants_one() {
        let budget = OutboundBudget::per_minute(0);
        assert!(budget.try_acquire());
    }
}
