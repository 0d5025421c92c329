//! Circuit breaker for async operations returning [`StructuredError`].
//!
//! A circuit breaker stops calling a dependency that keeps failing, giving it
//! time to recover, and lets a single probe call through to test whether it
//! has.
//!
//! ## States
//! - **Closed**: calls pass through; consecutive failures are counted
//! - **Open**: calls are rejected with a `CircuitOpenError` without invoking
//!   the operation, until the open duration has elapsed
//! - **Half-Open**: exactly one probe call is in flight; its outcome closes
//!   or reopens the circuit, and concurrent callers are rejected
//!
//! ## Usage
//!
//! ```rust
//! use callguard_circuitbreaker::{CircuitBreaker, CircuitState};
//! use callguard_core::StructuredError;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), StructuredError> {
//! let breaker = CircuitBreaker::builder()
//!     .name("user-db")
//!     .failure_threshold(3)
//!     .open_duration(Duration::from_secs(5))
//!     .on_state_transition(|from, to| println!("{from} -> {to}"))
//!     .build()
//!     .expect("valid configuration");
//!
//! let user = breaker
//!     .execute(|| async { Ok::<_, StructuredError>("alice") })
//!     .await?;
//!
//! assert_eq!(user, "alice");
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # Ok(())
//! # }
//! ```
//!
//! A `CircuitBreaker` is a cheap handle: clones share the same state, so one
//! breaker per protected resource can be passed to every caller.
//!
//! ## Rejections
//!
//! A rejected call returns a `CircuitOpenError` whose `name` attribute is the
//! breaker's name and whose `retryAfterMs` attribute is the time left until a
//! probe will be admitted. These errors are never retryable.
//!
//! ## Cancellation
//!
//! Dropping the future returned by [`CircuitBreaker::execute`] (for example
//! through [`callguard_core::cancellable`]) releases the probe slot if the
//! call was a probe. No outcome is recorded for it.
//!
//! ## Tower
//!
//! [`CircuitBreakerLayer`] wraps any `tower::Service` whose error type is
//! `StructuredError`.
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging and tracing using the `tracing` crate
//! - `serde`: enables `Serialize` for `CircuitState` and `CircuitMetrics`,
//!   and [`CircuitBreakerSettings`]

use crate::circuit::{Admission, Circuit};
use callguard_core::StructuredError;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
#[cfg(feature = "tracing")]
use tracing::debug;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, SharedFailureClassifier};
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
#[cfg(feature = "serde")]
pub use settings::CircuitBreakerSettings;

mod circuit;
mod config;
mod events;
mod layer;
#[cfg(feature = "serde")]
mod settings;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

struct Shared {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: CircuitBreakerConfig,
}

impl Shared {
    /// Runs `f` under the lock, then emits whatever events it produced after
    /// the lock is released so listeners may inspect the breaker.
    fn with_circuit<R>(&self, f: impl FnOnce(&mut Circuit) -> R) -> R {
        let (result, events) = {
            let mut circuit = self.circuit.lock();
            let result = f(&mut circuit);
            (result, circuit.take_events())
        };
        for event in &events {
            self.config.event_listeners.emit(event);
        }
        result
    }
}

/// A count-based circuit breaker.
///
/// State is guarded by a single mutex that is only held while admitting a
/// call and while recording its outcome, never across an `.await`.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Returns a builder with the default configuration.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of calls through the circuit breaker"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of the circuit breaker"
                );
            });
        }
        CircuitBreakerConfigBuilder::new()
    }

    /// A named breaker with the given threshold and open duration.
    pub fn new(
        name: impl Into<String>,
        failure_threshold: usize,
        open_duration: std::time::Duration,
    ) -> Result<Self, callguard_core::ConfigError> {
        Self::builder()
            .name(name)
            .failure_threshold(failure_threshold)
            .open_duration(open_duration)
            .build()
    }

    pub(crate) fn from_config(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let now = config.clock.now();
        Self {
            shared: Arc::new(Shared {
                circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic), now)),
                state_atomic,
                config,
            }),
        }
    }

    /// Runs `operation` under the breaker's protection.
    ///
    /// Returns a `CircuitOpenError` without calling `operation` when the
    /// circuit is open or a probe is already in flight. Otherwise returns
    /// whatever `operation` returned, after recording the outcome.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, StructuredError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        let permit = self.acquire()?;
        let result = operation().await;
        match &result {
            Ok(_) => permit.success(),
            Err(err) if (self.shared.config.failure_classifier)(err) => permit.failure(),
            Err(_) => permit.ignore(),
        }
        result
    }

    fn acquire(&self) -> Result<Permit<'_>, StructuredError> {
        let shared = &*self.shared;
        let now = shared.config.clock.now();
        let admission = shared.with_circuit(|c| c.try_acquire(&shared.config, now));

        match admission {
            Admission::Permitted { probe } => {
                #[cfg(feature = "tracing")]
                debug!(breaker = %shared.config.name, probe, "circuit breaker permitted call");
                Ok(Permit {
                    shared,
                    probe,
                    armed: true,
                })
            }
            Admission::Rejected { retry_after } => {
                #[cfg(feature = "tracing")]
                debug!(
                    breaker = %shared.config.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "circuit breaker rejected call"
                );
                let retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
                Err(StructuredError::circuit_open(shared.config.name.clone())
                    .with_attribute("retryAfterMs", retry_after_ms))
            }
        }
    }

    /// The name used in errors, events and metrics labels.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Returns the current state without taking the lock.
    ///
    /// An open circuit whose open duration has elapsed still reports `Open`
    /// until the next call arrives and becomes the probe.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// Consecutive failures since the last success.
    pub fn failure_count(&self) -> usize {
        self.shared.circuit.lock().failure_count()
    }

    /// Returns a snapshot of the current circuit breaker metrics.
    pub fn metrics(&self) -> CircuitMetrics {
        let now = self.shared.config.clock.now();
        self.shared.circuit.lock().metrics(&self.shared.config, now)
    }

    /// Whether the circuit currently reports `Open`.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns an HTTP status code based on circuit state.
    ///
    /// - Closed: 200 (OK)
    /// - HalfOpen: 200 (OK), probing
    /// - Open: 503 (Service Unavailable)
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns "healthy" when closed, "degraded" when half-open and
    /// "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .field("failure_threshold", &self.shared.config.failure_threshold)
            .field("open_duration", &self.shared.config.open_duration)
            .finish()
    }
}

/// Admission to run one call. Dropping it unresolved frees the probe slot.
struct Permit<'a> {
    shared: &'a Shared,
    probe: bool,
    armed: bool,
}

impl Permit<'_> {
    fn success(mut self) {
        self.armed = false;
        let shared = self.shared;
        let (probe, now) = (self.probe, shared.config.clock.now());
        shared.with_circuit(|c| c.record_success(&shared.config, probe, now));
    }

    fn failure(mut self) {
        self.armed = false;
        let shared = self.shared;
        let (probe, now) = (self.probe, shared.config.clock.now());
        shared.with_circuit(|c| c.record_failure(&shared.config, probe, now));
    }

    fn ignore(self) {}
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.armed && self.probe {
            #[cfg(feature = "tracing")]
            tracing::trace!(breaker = %self.shared.config.name, "probe released without outcome");
            self.shared.circuit.lock().release_probe();
        }
    }
}
