//! Reconnect Backoff
//!
//! Delay strategy between reconnect attempts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponent cap so the multiplier cannot overflow.
const MAX_EXPONENT: u32 = 16;

/// How the reconnect delay evolves across consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Always wait the base delay. Retries forever.
    #[default]
    Fixed,
    /// Double the delay after every failed attempt, up to `max_delay_ms`.
    /// With `jitter`, wait a random duration between zero and that delay.
    Exponential {
        /// Upper bound for the delay in milliseconds.
        max_delay_ms: u64,
        /// Randomize the delay (full jitter).
        jitter: bool,
    },
}

impl BackoffStrategy {
    /// Delay before the next attempt, given `attempt` consecutive failures
    /// since the last successful open (0 after a clean close).
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        match *self {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential {
                max_delay_ms,
                jitter,
            } => {
                let multiplier = 2u32.saturating_pow(attempt.min(MAX_EXPONENT));
                let capped = base
                    .saturating_mul(multiplier)
                    .min(Duration::from_millis(max_delay_ms));
                if jitter {
                    let upper = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
                    Duration::from_millis(rand::thread_rng().gen_range(0..=upper))
                } else {
                    capped
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(2_000);

    #[test]
    fn test_fixed_is_constant() {
        for attempt in [0, 1, 5, 100] {
            assert_eq!(BackoffStrategy::Fixed.delay(BASE, attempt), BASE);
        }
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let strategy = BackoffStrategy::Exponential {
            max_delay_ms: 10_000,
            jitter: false,
        };
        assert_eq!(strategy.delay(BASE, 0), Duration::from_millis(2_000));
        assert_eq!(strategy.delay(BASE, 1), Duration::from_millis(4_000));
        assert_eq!(strategy.delay(BASE, 2), Duration::from_millis(8_000));
        assert_eq!(strategy.delay(BASE, 3), Duration::from_millis(10_000));
        assert_eq!(strategy.delay(BASE, u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let strategy = BackoffStrategy::Exponential {
            max_delay_ms: 5_000,
            jitter: true,
        };
        for attempt in 0..20 {
            assert!(strategy.delay(BASE, attempt) <= Duration::from_millis(5_000));
        }
    }
}
