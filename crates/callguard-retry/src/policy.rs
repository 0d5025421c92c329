use crate::backoff::{ExponentialBackoff, IntervalFunction};
use callguard_core::config::at_least;
use callguard_core::{ConfigError, StructuredError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Extra condition an error must meet to be retried.
pub type RetryPredicate = Arc<dyn Fn(&StructuredError) -> bool + Send + Sync>;

/// How many times to try, how long to wait in between, and which errors are
/// worth another attempt.
///
/// Immutable once built. Clones share the same backoff and predicate.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    interval_fn: Arc<dyn IntervalFunction>,
    retry_predicate: Option<RetryPredicate>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Exponential backoff from `base_delay`, growing by `multiplier`.
    pub fn new(max_attempts: usize, base_delay: Duration, multiplier: f64) -> Result<Self, ConfigError> {
        Self::builder()
            .max_attempts(max_attempts)
            .base_delay(base_delay)
            .multiplier(multiplier)
            .build()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Whether `error` may be retried: its own `retryable` flag and the
    /// policy predicate, if any, must both agree.
    pub fn should_retry(&self, error: &StructuredError) -> bool {
        if !error.is_retryable() {
            return false;
        }
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Delay to wait after the 1-indexed `attempt` has failed.
    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 100ms base delay, doubling.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval_fn: Arc::new(ExponentialBackoff::new(Duration::from_millis(100))),
            retry_predicate: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("has_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder {
    max_attempts: usize,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    retry_predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: None,
            interval_fn: None,
            retry_predicate: None,
        }
    }

    /// Total attempts including the first call. Must be at least 1.
    ///
    /// Default: 3
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay after the first failure.
    ///
    /// Default: 100ms
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Growth factor between consecutive delays. Must be at least 1.0.
    ///
    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Upper bound for any single delay.
    ///
    /// Default: none
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Uses a custom backoff instead of the exponential one described by
    /// `base_delay`, `multiplier` and `max_delay`.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Only retry errors for which `predicate` returns true. Errors that are
    /// not retryable are never retried, whatever the predicate says.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StructuredError) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        at_least("max_attempts", self.max_attempts as f64, 1.0)?;

        let interval_fn = match self.interval_fn {
            Some(interval_fn) => interval_fn,
            None => {
                at_least("multiplier", self.multiplier, 1.0)?;
                let mut backoff = ExponentialBackoff::new(self.base_delay).multiplier(self.multiplier);
                if let Some(max) = self.max_delay {
                    backoff = backoff.max_interval(max);
                }
                Arc::new(backoff)
            }
        };

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            interval_fn,
            retry_predicate: self.retry_predicate,
        })
    }
}
