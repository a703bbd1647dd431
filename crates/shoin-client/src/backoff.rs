//! Randomized, capped exponential backoff for reconnect attempts.
//!
//! `delay = min(base × 2^attempt, max) + uniform[0, jitter)`
//!
//! The multiplication is checked, so any `attempt` (even `u32::MAX`) just
//! lands on `max`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::duration_ms;
use crate::constants::{DEFAULT_BASE_DELAY, DEFAULT_JITTER, DEFAULT_MAX_DELAY};

/// Backoff parameters. `max_delay` has no default when deserialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(rename = "base_delay_ms", with = "duration_ms", default = "default_base_delay")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    #[serde(rename = "jitter_ms", with = "duration_ms", default = "default_jitter")]
    pub jitter: Duration,
}

fn default_base_delay() -> Duration {
    DEFAULT_BASE_DELAY
}

fn default_jitter() -> Duration {
    DEFAULT_JITTER
}

impl BackoffConfig {
    /// Defaults for base delay and jitter, with the given ceiling.
    pub fn new(max_delay: Duration) -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay,
            jitter: DEFAULT_JITTER,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELAY)
    }
}

/// Delay before reconnect attempt `attempt` (0-based), using the thread RNG.
pub fn compute_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    compute_delay_with(attempt, config, &mut rand::thread_rng())
}

/// Same as [`compute_delay`] with an explicit random source.
pub fn compute_delay_with<R: Rng + ?Sized>(
    attempt: u32,
    config: &BackoffConfig,
    rng: &mut R,
) -> Duration {
    let base = as_millis(config.base_delay);
    let max = as_millis(config.max_delay);
    let jitter = as_millis(config.jitter);

    let exponential = 2u64
        .checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(u64::MAX)
        .min(max);
    let noise = if jitter == 0 {
        0
    } else {
        rng.gen_range(0..jitter)
    };

    Duration::from_millis(exponential.saturating_add(noise))
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_bounds() {
        let cfg = config();
        for _ in 0..500 {
            let d0 = compute_delay(0, &cfg);
            assert!(d0 >= Duration::from_millis(1000) && d0 < Duration::from_millis(2000));

            let d10 = compute_delay(10, &cfg);
            assert!(d10 >= Duration::from_millis(30_000) && d10 < Duration::from_millis(31_000));
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let cfg = config();
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..8).map(|n| compute_delay_with(n, &cfg, &mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(7);
            (0..8).map(|n| compute_delay_with(n, &cfg, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_monotonic_without_jitter() {
        let cfg = config().with_jitter(Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        let delays: Vec<_> = (0..40).map(|n| compute_delay_with(n, &cfg, &mut rng)).collect();
        assert_eq!(delays[0], Duration::from_millis(1000));
        assert_eq!(delays[1], Duration::from_millis(2000));
        assert_eq!(delays[4], Duration::from_millis(16_000));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let cfg = config().with_jitter(Duration::ZERO);
        assert_eq!(compute_delay(u32::MAX, &cfg), Duration::from_millis(30_000));
        assert_eq!(compute_delay(64, &cfg), Duration::from_millis(30_000));

        let cfg = BackoffConfig::new(Duration::MAX).with_jitter(Duration::ZERO);
        assert_eq!(compute_delay(200, &cfg), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_defaults() {
        let cfg = BackoffConfig::new(Duration::from_secs(5));
        assert_eq!(cfg.base_delay, DEFAULT_BASE_DELAY);
        assert_eq!(cfg.jitter, DEFAULT_JITTER);
        assert_eq!(cfg.max_delay, Duration::from_secs(5));
    }
}
