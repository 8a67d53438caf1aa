//! Retry and backoff configuration for transient service unavailability.

use rand::Rng;
use std::time::Duration;

/// Retry/backoff configuration.
///
/// Only HTTP 503 responses and connections closed before a response arrived
/// are retried. Backoff is quadratic: attempt `i` (0-based) waits
/// `(i + 1)^2 * backoff_unit` before the next try.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Retries after the first attempt; total tries is `max_retries + 1`.
    pub max_retries: u32,
    pub backoff_unit: Duration,
    pub jitter: JitterMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_unit: Duration::from_millis(10),
            jitter: JitterMode::None,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable retries entirely.
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Set maximum retry attempts
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff unit
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Set jitter mode
    pub fn with_jitter(mut self, jitter: JitterMode) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.step(attempt.saturating_add(1));
        match self.jitter {
            JitterMode::None => ceiling,
            JitterMode::Full => random_between(Duration::ZERO, ceiling),
            JitterMode::Stepped => random_between(self.step(attempt), ceiling),
        }
    }

    /// Whether another try is allowed after the failed attempt `attempt` (0-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// `backoff_unit * n^2`
    fn step(&self, n: u32) -> Duration {
        self.backoff_unit.saturating_mul(n.saturating_mul(n))
    }
}

/// Randomization applied to the quadratic backoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterMode {
    /// Exact `unit * (attempt + 1)^2`.
    #[default]
    None,
    /// Anywhere from zero up to the quadratic delay.
    Full,
    /// Between the previous attempt's delay and this one's, so delays
    /// still grow from one attempt to the next.
    Stepped,
}

fn random_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return high;
    }
    let spread = (high - low).as_nanos() as u64;
    low + Duration::from_nanos(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_six_tries() {
        let config = RetryConfig::default();
        assert!((0..5).all(|attempt| config.should_retry(attempt)));
        assert!(!config.should_retry(5));
    }

    #[test]
    fn test_backoff_is_quadratic() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(0), Duration::from_millis(10));
        assert_eq!(config.backoff(1), Duration::from_millis(40));
        assert_eq!(config.backoff(2), Duration::from_millis(90));
        assert_eq!(config.backoff(4), Duration::from_millis(250));
    }

    #[test]
    fn test_none_never_retries() {
        assert!(!RetryConfig::none().should_retry(0));
    }

    #[test]
    fn test_full_jitter_stays_under_the_quadratic_delay() {
        let config = RetryConfig::default().with_jitter(JitterMode::Full);
        for _ in 0..50 {
            assert!(config.backoff(2) <= Duration::from_millis(90));
        }
    }

    #[test]
    fn test_stepped_jitter_stays_between_steps() {
        let config = RetryConfig::default().with_jitter(JitterMode::Stepped);
        for _ in 0..50 {
            let first = config.backoff(0);
            assert!(first <= Duration::from_millis(10));

            let third = config.backoff(2);
            assert!(third >= Duration::from_millis(40) && third <= Duration::from_millis(90));
        }
    }
}
