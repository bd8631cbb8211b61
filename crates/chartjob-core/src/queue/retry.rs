//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Exponential backoff: `base_delay * multiplier^(attempts - 1)`, optionally
/// capped at `max_delay`.
///
/// Example with base_delay=2s, multiplier=2.0:
/// - attempt 1 (first failure): 2s
/// - attempt 2: 4s
/// - attempt 3: 8s
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,

    pub multiplier: f64,

    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay before the next try, given how many attempts were already made
    /// (1-indexed). `attempts == 0` is treated like 1.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let cap = self.max_delay.map(|d| d.as_secs_f64()).unwrap_or(f64::MAX);
        let secs = if secs.is_finite() { secs.min(cap) } else { cap };

        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay.unwrap_or(Duration::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 2.0)
    }
}
