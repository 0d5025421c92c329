//! Retry with exponential backoff for async operations returning
//! [`StructuredError`].
//!
//! An operation is attempted up to `max_attempts` times. Between attempts the
//! calling task sleeps for `base_delay × multiplier^(attempt - 1)`, capped at
//! `max_delay` when one is set. Other tasks keep running.
//!
//! - An error whose `retryable` flag is false, or that the policy's predicate
//!   rejects, is returned immediately and unchanged.
//! - When every attempt fails, the result is a `RetryExhaustedError` with the
//!   message `"Failed after N attempts"`, an `attempts` attribute, and the last
//!   failure as its cause.
//!
//! # Examples
//!
//! ```
//! use callguard_core::StructuredError;
//! use callguard_retry::{retry_with_backoff, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), StructuredError> {
//! let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0).unwrap();
//!
//! let rows = retry_with_backoff(
//!     || async { Ok::<_, StructuredError>(vec!["alice", "bob"]) },
//!     &policy,
//! )
//! .await?;
//! assert_eq!(rows.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! A named executor adds event callbacks:
//!
//! ```
//! use callguard_core::StructuredError;
//! use callguard_retry::{Retry, RetryPolicy};
//!
//! # async fn example() -> Result<(), StructuredError> {
//! let retry = Retry::builder(RetryPolicy::default())
//!     .name("user-lookup")
//!     .on_retry(|attempt, delay| println!("attempt {attempt} failed, waiting {delay:?}"))
//!     .on_error(|attempts| println!("gave up after {attempts} attempts"))
//!     .build();
//!
//! let user = retry.run(|| async { Ok::<_, StructuredError>("alice") }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `retry_calls_total` and `retry_attempts_total` counters
//! - `tracing`: debug logging of retries via the `tracing` crate
//! - `serde`: [`RetrySettings`] for loading policies from configuration

mod backoff;
mod config;
mod events;
mod layer;
mod policy;
#[cfg(feature = "serde")]
mod settings;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use layer::{RetryLayer, RetryService};
pub use policy::{RetryPolicy, RetryPolicyBuilder, RetryPredicate};
#[cfg(feature = "serde")]
pub use settings::RetrySettings;

use callguard_core::{ErrorKind, StructuredError};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Runs `operation` under `policy` without events or a name.
pub async fn retry_with_backoff<T, F, Fut>(operation: F, policy: &RetryPolicy) -> Result<T, StructuredError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StructuredError>>,
{
    Retry::new(policy.clone()).run(operation).await
}

/// The error returned when every attempt failed.
pub fn exhausted(attempts: usize, last: StructuredError) -> StructuredError {
    last.wrap(
        ErrorKind::RetryExhausted { attempts },
        format!("Failed after {attempts} attempts"),
    )
}

/// A named retry executor. Clones share configuration and listeners.
#[derive(Clone)]
pub struct Retry {
    config: Arc<RetryConfig>,
}

impl Retry {
    /// Creates a builder for a named executor with listeners.
    pub fn builder(policy: RetryPolicy) -> RetryConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "retry_calls_total",
                    "Total number of operations run through the retry executor"
                );
                describe_counter!(
                    "retry_attempts_total",
                    "Total number of retries performed"
                );
            });
        }
        RetryConfigBuilder::new(policy)
    }

    /// An unnamed executor without listeners.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::builder(policy).build()
    }

    pub(crate) fn from_config(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The attempt and backoff policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.config.policy
    }

    /// The name used in events and metrics labels.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs `operation` until it succeeds, fails with an error that should not
    /// be retried, or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, StructuredError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        let config = &*self.config;
        let policy = &config.policy;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    config.event_listeners.emit(&RetryEvent::Success {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success").increment(1);

                    return Ok(value);
                }
                Err(error) => {
                    if !policy.should_retry(&error) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(retry = %config.name, attempt, kind = error.kind().name(), "error not retried");

                        config.event_listeners.emit(&RetryEvent::IgnoredError {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt,
                            error_kind: error.kind().name(),
                        });

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "ignored").increment(1);

                        return Err(error);
                    }

                    if attempt >= policy.max_attempts() {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(retry = %config.name, attempts = attempt, "retries exhausted");

                        config.event_listeners.emit(&RetryEvent::Exhausted {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted").increment(1);

                        return Err(exhausted(attempt, error));
                    }

                    let delay = policy.next_backoff(attempt);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(retry = %config.name, attempt, ?delay, "retrying after failure");

                    config.event_listeners.emit(&RetryEvent::Retry {
                        pattern_name: config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                        error_kind: error.kind().name(),
                        error_message: error.message().to_string(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.config.name)
            .field("policy", &self.config.policy)
            .finish()
    }
}
