//! Delay between reconcile ticks.

use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Jitter of 0 to 10% of the delay
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Decides how long to sleep before the next tick.
///
/// With no cap above the interval every tick waits the fixed interval. With a
/// cap, consecutive failures double the wait up to the cap; a success resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDelay {
    interval: Duration,
    max: Duration,
}

impl RetryDelay {
    pub fn new(interval: Duration, max: Duration) -> Self {
        Self { interval, max }
    }

    /// Fixed interval, no backoff.
    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, Duration::ZERO)
    }

    pub fn is_backoff_enabled(&self) -> bool {
        self.max > self.interval
    }

    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 || !self.is_backoff_enabled() {
            return self.interval;
        }
        calculate_backoff(
            consecutive_failures,
            self.interval.as_millis() as u64,
            self.max.as_millis() as u64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_fixed_delay_ignores_failures() {
        let delay = RetryDelay::fixed(Duration::from_secs(30));
        assert!(!delay.is_backoff_enabled());
        assert_eq!(delay.delay(0), Duration::from_secs(30));
        assert_eq!(delay.delay(7), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let delay = RetryDelay::new(Duration::from_secs(10), Duration::from_secs(60));
        assert_eq!(delay.delay(0), Duration::from_secs(10));

        let second = delay.delay(2);
        assert!(second >= Duration::from_secs(20) && second < Duration::from_secs(22));

        let capped = delay.delay(20);
        assert!(capped >= Duration::from_secs(60) && capped < Duration::from_secs(66));
    }

    #[test]
    fn test_cap_below_interval_disables_backoff() {
        let delay = RetryDelay::new(Duration::from_secs(30), Duration::from_secs(10));
        assert_eq!(delay.delay(3), Duration::from_secs(30));
    }
}
