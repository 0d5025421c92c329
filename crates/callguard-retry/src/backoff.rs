//! Backoff strategies.
//!
//! An [`IntervalFunction`] maps the number of the attempt that just failed
//! (1 for the first call) to the delay before the next one.

use std::time::Duration;

/// Computes the delay before the next attempt.
pub trait IntervalFunction: Send + Sync {
    /// `attempt` is the 1-indexed attempt that just failed.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `initial × multiplier^(attempt - 1)`, optionally capped.
///
/// Delays that would overflow a `Duration` saturate to the cap, or to
/// `Duration::MAX` when there is none.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Doubles on every attempt unless told otherwise.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        if self.initial_interval.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_interval.as_nanos() as f64 * self.multiplier.powi(exponent);
        let uncapped = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::MAX
        };

        match self.max_interval {
            Some(max) => uncapped.min(max),
            None => uncapped,
        }
    }
}

/// A delay computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
