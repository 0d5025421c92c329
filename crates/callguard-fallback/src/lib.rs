//! Fallback combinator for async operations returning [`StructuredError`].
//!
//! When the primary operation fails, its error is reported as a
//! `failed_attempt` event and the fallback's result is returned instead. A
//! fallback that fails itself propagates its own error.
//!
//! # Overview
//!
//! Useful for:
//!
//! - Returning cached or stale data when the primary source is unavailable
//! - Providing degraded functionality instead of complete failure
//! - Routing to backup services
//!
//! # Quick Start
//!
//! [`with_fallback`] reports the suppressed error through [`TracingSink`]:
//!
//! ```rust
//! use callguard_core::StructuredError;
//! use callguard_fallback::with_fallback;
//!
//! # async fn example() -> Result<(), StructuredError> {
//! let profile = with_fallback(
//!     || async { Err(StructuredError::service("Service unavailable", "getProfile")) },
//!     || async { Ok::<_, StructuredError>("cached") },
//! )
//! .await?;
//! assert_eq!(profile, "cached");
//! # Ok(())
//! # }
//! ```
//!
//! # Strategies
//!
//! A named [`Fallback`] offers three ways to answer:
//!
//! - [`Fallback::run`]: another operation
//! - [`Fallback::run_or`]: a fixed value
//! - [`Fallback::run_or_else`]: a value computed from the error
//!
//! # Selective Error Handling
//!
//! ```rust
//! use callguard_core::{ErrorKind, StructuredError};
//! use callguard_fallback::Fallback;
//!
//! # async fn example() -> Result<(), StructuredError> {
//! // Validation failures are the caller's problem, not the backend's
//! let fallback = Fallback::builder()
//!     .name("profile")
//!     .handle(|e: &StructuredError| !matches!(e.kind(), ErrorKind::Validation { .. }))
//!     .build();
//!
//! let name = fallback
//!     .run_or(|| async { Ok::<_, StructuredError>("alice".to_string()) }, "guest".to_string())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Events
//!
//! - `success`: primary succeeded, no fallback needed
//! - `failed_attempt`: primary failed, fallback will be attempted
//! - `applied`: fallback was successfully applied
//! - `failed`: fallback itself failed
//! - `skipped`: error didn't match predicate, propagated as-is

mod config;
mod events;
mod layer;

pub use config::{FallbackConfig, FallbackConfigBuilder};
pub use events::FallbackEvent;
pub use layer::{FallbackLayer, FallbackService, FallbackStrategy};

use callguard_core::{StructuredError, TracingSink};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Predicate to determine if an error should trigger the fallback.
pub type HandlePredicate = Arc<dyn Fn(&StructuredError) -> bool + Send + Sync>;

/// Runs `primary`; on failure reports the error to [`TracingSink`] and
/// returns the result of `fallback`.
pub async fn with_fallback<T, P, PFut, F, FFut>(primary: P, fallback: F) -> Result<T, StructuredError>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T, StructuredError>>,
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<T, StructuredError>>,
{
    Fallback::builder()
        .sink(TracingSink)
        .build()
        .run(primary, fallback)
        .await
}

/// A named fallback. Clones share configuration and listeners.
///
/// See the [module-level documentation](crate) for usage examples.
#[derive(Clone)]
pub struct Fallback {
    config: Arc<FallbackConfig>,
}

impl Fallback {
    /// Creates a new builder.
    pub fn builder() -> FallbackConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "fallback_calls_total",
                "Total number of fallback operations"
            );
        });

        FallbackConfigBuilder::new()
    }

    pub(crate) fn from_config(config: FallbackConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs `primary`, answering with `fallback` when it fails.
    pub async fn run<T, P, PFut, F, FFut>(&self, primary: P, fallback: F) -> Result<T, StructuredError>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, StructuredError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, StructuredError>>,
    {
        self.apply(primary(), "operation", |_| fallback()).await
    }

    /// Runs `primary`, answering with `value` when it fails.
    pub async fn run_or<T, P, PFut>(&self, primary: P, value: T) -> Result<T, StructuredError>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, StructuredError>>,
    {
        self.apply(primary(), "value", |_| async move { Ok(value) })
            .await
    }

    /// Runs `primary`, answering with a value computed from its error.
    pub async fn run_or_else<T, P, PFut, F>(&self, primary: P, f: F) -> Result<T, StructuredError>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, StructuredError>>,
        F: FnOnce(&StructuredError) -> T,
    {
        self.apply(primary(), "from_error", |error| {
            let value = f(&error);
            async move { Ok(value) }
        })
        .await
    }

    /// Awaits `primary` and hands a handled error to `handler`.
    pub(crate) async fn apply<T, PFut, H, HFut>(
        &self,
        primary: PFut,
        strategy: &'static str,
        handler: H,
    ) -> Result<T, StructuredError>
    where
        PFut: Future<Output = Result<T, StructuredError>>,
        H: FnOnce(StructuredError) -> HFut,
        HFut: Future<Output = Result<T, StructuredError>>,
    {
        let config = &*self.config;

        #[cfg(feature = "tracing")]
        tracing::debug!(fallback = %config.name, "Calling primary operation");

        let error = match primary.await {
            Ok(response) => {
                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "success"
                )
                .increment(1);

                config.event_listeners.emit(&FallbackEvent::Success {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                });

                return Ok(response);
            }
            Err(error) => error,
        };

        if !config.handles(&error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                fallback = %config.name,
                kind = error.kind().name(),
                "Error does not match predicate, skipping fallback"
            );

            #[cfg(feature = "metrics")]
            counter!(
                "fallback_calls_total",
                "fallback" => config.name.clone(),
                "result" => "skipped"
            )
            .increment(1);

            config.event_listeners.emit(&FallbackEvent::Skipped {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                error_kind: error.kind().name(),
            });

            return Err(error);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(fallback = %config.name, strategy, "Primary failed, applying fallback");

        config.event_listeners.emit(&FallbackEvent::FailedAttempt {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            error_kind: error.kind().name(),
            error_message: error.message().to_string(),
            chain: error.report().to_string(),
        });

        match handler(error).await {
            Ok(response) => {
                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "applied",
                    "strategy" => strategy
                )
                .increment(1);

                config.event_listeners.emit(&FallbackEvent::Applied {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    strategy,
                });

                Ok(response)
            }
            Err(fallback_error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(fallback = %config.name, "Fallback also failed");

                #[cfg(feature = "metrics")]
                counter!(
                    "fallback_calls_total",
                    "fallback" => config.name.clone(),
                    "result" => "failed",
                    "strategy" => strategy
                )
                .increment(1);

                config.event_listeners.emit(&FallbackEvent::Failed {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    error_kind: fallback_error.kind().name(),
                });

                Err(fallback_error)
            }
        }
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback")
            .field("name", &self.config.name)
            .field("selective", &self.config.handle_predicate.is_some())
            .finish()
    }
}
