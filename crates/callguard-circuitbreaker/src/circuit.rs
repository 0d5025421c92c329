use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through and failures are counted.
    Closed = 0,
    /// Calls are rejected without invoking the operation.
    Open = 1,
    /// A single probe call is allowed through to test recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a circuit breaker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    pub state: CircuitState,
    /// Consecutive failures counted since the last success.
    pub failure_count: usize,
    pub failure_threshold: usize,
    /// Calls that completed successfully, over the breaker's lifetime.
    pub total_successes: u64,
    /// Calls that failed and were counted, over the breaker's lifetime.
    pub total_failures: u64,
    /// Calls rejected without invoking the operation.
    pub total_rejections: u64,
    /// Time left before an open circuit admits a probe.
    pub remaining_open: Option<Duration>,
    pub time_since_state_change: Duration,
}

/// Result of asking the circuit for permission to run a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted { probe: bool },
    Rejected { retry_after: Duration },
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failure_count: usize,
    open_until: Option<Instant>,
    probe_in_flight: bool,
    last_state_change: Instant,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
    pending: Vec<CircuitBreakerEvent>,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>, now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            open_until: None,
            probe_in_flight: false,
            last_state_change: now,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
            pending: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failure_count
    }

    /// Events produced since the last call, to be emitted once the lock is
    /// released.
    pub(crate) fn take_events(&mut self) -> Vec<CircuitBreakerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn metrics(&self, config: &CircuitBreakerConfig, now: Instant) -> CircuitMetrics {
        let remaining_open = match (self.state, self.open_until) {
            (CircuitState::Open, Some(until)) => Some(until.saturating_duration_since(now)),
            _ => None,
        };
        CircuitMetrics {
            state: self.state,
            failure_count: self.failure_count,
            failure_threshold: config.failure_threshold,
            total_successes: self.total_successes,
            total_failures: self.total_failures,
            total_rejections: self.total_rejections,
            remaining_open,
            time_since_state_change: now.saturating_duration_since(self.last_state_change),
        }
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig, now: Instant) -> Admission {
        match self.state {
            CircuitState::Closed => self.permit(config, false),
            CircuitState::Open => {
                let open_until = self.open_until.unwrap_or(now);
                if now >= open_until {
                    self.transition_to(CircuitState::HalfOpen, config, now);
                    self.probe_in_flight = true;
                    self.permit(config, true)
                } else {
                    self.reject(config, open_until - now)
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    self.reject(config, Duration::ZERO)
                } else {
                    self.probe_in_flight = true;
                    self.permit(config, true)
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, probe: bool, now: Instant) {
        self.total_successes += 1;
        self.failure_count = 0;
        self.pending.push(CircuitBreakerEvent::SuccessRecorded {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        if probe {
            self.probe_in_flight = false;
            if self.state == CircuitState::HalfOpen {
                self.transition_to(CircuitState::Closed, config, now);
            }
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, probe: bool, now: Instant) {
        self.total_failures += 1;
        self.failure_count = self.failure_count.saturating_add(1);
        self.pending.push(CircuitBreakerEvent::FailureRecorded {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
            failure_count: self.failure_count,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        if probe {
            self.probe_in_flight = false;
            if self.state == CircuitState::HalfOpen {
                self.failure_count = self.failure_count.max(config.failure_threshold);
                self.open(config, now);
            }
        } else if self.state == CircuitState::Closed && self.failure_count >= config.failure_threshold {
            self.open(config, now);
        }
    }

    /// Frees the probe slot without recording an outcome.
    pub(crate) fn release_probe(&mut self) {
        self.probe_in_flight = false;
    }

    fn permit(&mut self, config: &CircuitBreakerConfig, probe: bool) -> Admission {
        self.pending.push(CircuitBreakerEvent::CallPermitted {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });
        Admission::Permitted { probe }
    }

    fn reject(&mut self, config: &CircuitBreakerConfig, retry_after: Duration) -> Admission {
        self.total_rejections += 1;
        self.pending.push(CircuitBreakerEvent::CallRejected {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
            retry_after,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

        Admission::Rejected { retry_after }
    }

    fn open(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.open_until = Some(now + config.open_duration);
        self.transition_to(CircuitState::Open, config, now);
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig, now: Instant) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        self.pending.push(CircuitBreakerEvent::StateTransition {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %config.name, from = %from_state, to = %state, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone(), "state" => from_state.as_str())
                .set(0.0);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone(), "state" => state.as_str())
                .set(1.0);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = now;
        if state != CircuitState::Open {
            self.open_until = None;
        }
    }
}
