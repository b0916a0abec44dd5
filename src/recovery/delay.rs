//! # Delay policy for spacing recovery attempts.
//!
//! [`DelayPolicy`] controls how retry delays grow after repeated failed
//! attempts. It is parameterized by:
//! - [`DelayPolicy::first`] the initial delay;
//! - [`DelayPolicy::max`] the maximum delay cap;
//! - [`DelayPolicy::factor`] the multiplicative growth factor.
//!
//! The default recovery behavior is a fixed delay (factor 1.0) equal to the
//! configured network recovery interval.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use amqpvisor::DelayPolicy;
//!
//! let delay = DelayPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//! };
//!
//! // First attempt - uses 'first' (clamped to max)
//! assert_eq!(delay.next(None), Duration::from_millis(100));
//!
//! // Second attempt - multiplied by factor (100ms * 2.0 = 200ms)
//! assert_eq!(delay.next(Some(Duration::from_millis(100))), Duration::from_millis(200));
//!
//! // When the previous delay exceeds max, the result is capped at max
//! assert_eq!(delay.next(Some(Duration::from_secs(20))), Duration::from_secs(10));
//! ```

use std::time::Duration;

/// Retry delay policy with capped multiplicative growth.
#[derive(Clone, Copy, Debug)]
pub struct DelayPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl DelayPolicy {
    /// A constant delay: every retry waits exactly `interval`.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
        }
    }

    /// Computes the next delay based on the previous one.
    ///
    /// - If `prev` is `None`, returns `first` clamped to `max`.
    /// - Otherwise multiplies the previous delay by [`DelayPolicy::factor`]
    ///   and caps it at [`DelayPolicy::max`].
    pub fn next(&self, prev: Option<Duration>) -> Duration {
        let unclamped = match prev {
            None => self.first,
            Some(d) => {
                let mul = d.as_secs_f64() * self.factor;
                if !mul.is_finite() {
                    self.max
                } else {
                    d.mul_f64(self.factor)
                }
            }
        };
        if unclamped > self.max {
            self.max
        } else {
            unclamped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_never_grows() {
        let delay = DelayPolicy::fixed(Duration::from_secs(5));
        let first = delay.next(None);
        assert_eq!(first, Duration::from_secs(5));
        assert_eq!(delay.next(Some(first)), Duration::from_secs(5));
    }

    #[test]
    fn growth_is_capped() {
        let delay = DelayPolicy {
            first: Duration::from_secs(1),
            max: Duration::from_secs(4),
            factor: 2.0,
        };
        let mut prev = None;
        let mut seen = Vec::new();
        for _ in 0..4 {
            let d = delay.next(prev);
            seen.push(d);
            prev = Some(d);
        }
        assert_eq!(
            seen,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(4),
            ]
        );
    }
}
