use std::time::Duration;

use crate::config::BackoffPolicy;

/// Capped exponential backoff: 1s, 2s, 4s, ... up to the policy maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Advance to the next attempt and return its delay.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    /// Delay for a given 1-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let max = self.policy.max.as_secs_f64();
        // powi overflows to infinity, which min() clamps to the cap
        let secs = (self.policy.initial.as_secs_f64() * self.policy.factor.powi(exponent)).min(max);
        Duration::from_secs_f64(secs)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
