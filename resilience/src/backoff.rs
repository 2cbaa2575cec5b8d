//! Backoff delay computation
//!
//! Pure functions over a [`RetryPolicy`]; the executor in [`crate::retry`]
//! adds jitter and performs the actual waiting.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay growth strategy between attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Constant delay
    Fixed,
    /// `initial_delay * n` for attempt n, capped
    Linear,
    /// `initial_delay * multiplier^(n-1)` for attempt n, capped
    Exponential {
        /// Growth factor per attempt
        multiplier: f64,
    },
}

/// Retry policy for a provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first)
    pub max_attempts: u32,
    /// Base delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    /// Growth strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
        }
    }
}

impl RetryPolicy {
    /// Base delay after attempt `n` (1-indexed), before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let n = attempt.max(1);
        let raw = match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay.as_secs_f64(),
            BackoffStrategy::Linear => self.initial_delay.as_secs_f64() * n as f64,
            BackoffStrategy::Exponential { multiplier } => {
                // powi over a clamped exponent; the cap below bounds the result
                let exponent = (n - 1).min(63) as i32;
                self.initial_delay.as_secs_f64() * multiplier.powi(exponent)
            }
        };
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Delay after attempt `n` with uniform jitter in `[0.1, 0.3) * base`
    /// added, so many concurrent failures do not retry in lockstep.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let factor = rand::thread_rng().gen_range(0.1..0.3);
        base + base.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: BackoffStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy,
        }
    }

    #[test]
    fn test_fixed_delay() {
        let p = policy(BackoffStrategy::Fixed);
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(4), Duration::from_secs(1));
    }

    #[test]
    fn test_linear_delay() {
        let p = policy(BackoffStrategy::Linear);
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(3));
        // Capped at max_delay
        assert_eq!(p.delay_for_attempt(100), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_delay() {
        let p = policy(BackoffStrategy::Exponential { multiplier: 2.0 });
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(2));
        // Attempt 3: 1s * 2^2 = 4s
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(4));
        // Capped at max_delay
        assert_eq!(p.delay_for_attempt(20), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_bounds() {
        let p = policy(BackoffStrategy::Exponential { multiplier: 2.0 });
        for attempt in 1..=5 {
            let base = p.delay_for_attempt(attempt);
            let jittered = p.jittered_delay(attempt);
            assert!(jittered >= base + base.mul_f64(0.1));
            assert!(jittered <= base + base.mul_f64(0.3));
        }
    }
}
