//! Capped exponential retry backoff

use std::time::Duration;

/// Deterministic doubling backoff with a ceiling.
///
/// Each call to `next_delay` returns the delay to wait before the next
/// attempt and advances the counter; the sequence is non-decreasing and
/// never exceeds `cap`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        // 2^30 already saturates any sane cap
        let exponent = self.attempts.min(30);
        let delay = self
            .base
            .saturating_mul(1u32 << exponent)
            .min(self.cap);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_are_non_decreasing_and_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));

        let mut previous = Duration::ZERO;
        for _ in 0..12 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(2));
            previous = delay;
        }
        assert_eq!(previous, Duration::from_secs(2));
    }

    #[test]
    fn doubles_until_the_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
