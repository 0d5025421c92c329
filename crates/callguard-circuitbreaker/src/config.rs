use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use callguard_core::config::at_least;
use callguard_core::{
    default_clock, ConfigError, EventListeners, EventSink, FnListener, SharedClock,
    StructuredError,
};
use std::sync::Arc;
use std::time::Duration;

/// Decides whether an error returned by the protected operation counts as a
/// failure.
pub type SharedFailureClassifier = Arc<dyn Fn(&StructuredError) -> bool + Send + Sync>;

/// Configuration for the circuit breaker pattern.
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: usize,
    pub(crate) open_duration: Duration,
    pub(crate) failure_classifier: SharedFailureClassifier,
    pub(crate) clock: SharedClock,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: usize,
    open_duration: Duration,
    failure_classifier: SharedFailureClassifier,
    clock: SharedClock,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 3,
            open_duration: Duration::from_secs(5),
            failure_classifier: Arc::new(|err: &StructuredError| !err.is_cancelled()),
            clock: default_clock(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Give this breaker a human-readable name for observability. The name is
    /// also carried by the `CircuitOpenError`s it produces.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets how many consecutive failures open the circuit. Must be at least 1.
    ///
    /// Default: 3
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before admitting a probe.
    ///
    /// Default: 5 seconds
    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Sets which errors count as failures.
    ///
    /// Errors that don't count leave the failure counter untouched and, for a
    /// probe, free the probe slot without closing or reopening the circuit.
    ///
    /// Default: every error except `CancelledError`.
    ///
    /// # Example
    /// ```rust
    /// use callguard_circuitbreaker::CircuitBreaker;
    /// use callguard_core::ErrorKind;
    ///
    /// // Bad input says nothing about the health of the downstream service.
    /// let breaker = CircuitBreaker::builder()
    ///     .failure_classifier(|err| {
    ///         !matches!(err.kind(), ErrorKind::Validation { .. } | ErrorKind::Cancelled)
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&StructuredError) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier = Arc::new(classifier);
        self
    }

    /// Replaces the time source.
    ///
    /// Default: [`TokioClock`](callguard_core::TokioClock)
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback when the circuit breaker transitions between states.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, CircuitState)`, called with the state being left and
    /// the state being entered.
    ///
    /// # Example
    /// ```rust
    /// use callguard_circuitbreaker::{CircuitBreaker, CircuitState};
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .on_state_transition(|from, to| {
    ///         println!("Circuit breaker: {:?} -> {:?}", from, to);
    ///         if to == CircuitState::Open {
    ///             println!("WARNING: circuit opened");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is permitted through the circuit breaker.
    ///
    /// Called with the state the call was admitted in: `Closed`, or
    /// `HalfOpen` for a probe.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected by the circuit breaker.
    ///
    /// Called with the time remaining until the breaker admits a probe.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { retry_after, .. } = event {
                    f(*retry_after);
                }
            }));
        self
    }

    /// Registers a callback when a successful call is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a failed call is recorded.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, usize)`, called with the state the failure was
    /// recorded in and the consecutive failure count including this one.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded {
                    state,
                    failure_count,
                    ..
                } = event
                {
                    f(*state, *failure_count);
                }
            }));
        self
    }

    /// Sends every event to `sink` as an [`EventRecord`](callguard_core::EventRecord).
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        self.event_listeners.add_sink(sink);
        self
    }

    pub(crate) fn into_config(self) -> Result<CircuitBreakerConfig, ConfigError> {
        at_least("failure_threshold", self.failure_threshold as f64, 1.0)?;

        Ok(CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            open_duration: self.open_duration,
            failure_classifier: self.failure_classifier,
            clock: self.clock,
            event_listeners: self.event_listeners,
        })
    }

    /// Validates the configuration and builds the breaker.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.into_config().map(CircuitBreaker::from_config)
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
