//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// `delay(n) = min(base * 2^n, cap) + jitter`, with `jitter` uniform in `[0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_jitter: Duration) -> Self {
        Self {
            base,
            cap,
            max_jitter,
        }
    }

    /// Deterministic part of the delay before retry `n` (0-based).
    pub fn base_delay(&self, n: u32) -> Duration {
        let factor = 2u32.saturating_pow(n);
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn delay(&self, n: u32) -> Duration {
        self.base_delay(n) + self.jitter()
    }

    /// Largest delay `delay` can ever return.
    pub fn upper_bound(&self) -> Duration {
        self.cap + self.max_jitter
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(1000),
            Duration::from_millis(10_000),
            Duration::from_millis(1000),
        )
    }

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let policy = policy();
        let delays: Vec<u128> = (0..6).map(|n| policy.base_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_delays_bounded_for_any_attempt() {
        let policy = policy();
        assert_eq!(policy.upper_bound(), Duration::from_millis(11_000));
        for n in [0, 1, 5, 31, 32, 64, u32::MAX] {
            for _ in 0..20 {
                let delay = policy.delay(n);
                assert!(delay <= policy.upper_bound());
                assert!(delay >= policy.base_delay(n));
            }
        }
    }

    #[test]
    fn test_base_delays_non_decreasing() {
        let policy = policy();
        let mut previous = Duration::ZERO;
        for n in 0..100 {
            let delay = policy.base_delay(n);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
            Duration::ZERO,
        );
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(50));
    }
}
