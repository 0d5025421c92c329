use crate::CircuitState;
use callguard_core::{ResilienceEvent, Severity};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the circuit breaker.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without invoking the operation.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        /// Time until the breaker will admit a probe. Zero while a probe is
        /// already in flight.
        retry_after: Duration,
    },
    /// The circuit breaker transitioned between states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        failure_count: usize,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::FailureRecorded { pattern_name, .. } => pattern_name,
        }
    }

    fn message(&self) -> String {
        match self {
            CircuitBreakerEvent::CallPermitted { state, .. } => {
                format!("call permitted in state {state}")
            }
            CircuitBreakerEvent::CallRejected { state, .. } => {
                format!("call rejected in state {state}")
            }
            CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } => format!("circuit {from_state} -> {to_state}"),
            CircuitBreakerEvent::SuccessRecorded { .. } => "success recorded".to_string(),
            CircuitBreakerEvent::FailureRecorded { failure_count, .. } => {
                format!("failure recorded ({failure_count} consecutive)")
            }
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        match self {
            CircuitBreakerEvent::CallPermitted { state, .. }
            | CircuitBreakerEvent::SuccessRecorded { state, .. } => {
                attrs.insert("state".to_string(), state.to_string());
            }
            CircuitBreakerEvent::CallRejected {
                state, retry_after, ..
            } => {
                attrs.insert("state".to_string(), state.to_string());
                attrs.insert("retryAfterMs".to_string(), retry_after.as_millis().to_string());
            }
            CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } => {
                attrs.insert("from".to_string(), from_state.to_string());
                attrs.insert("to".to_string(), to_state.to_string());
            }
            CircuitBreakerEvent::FailureRecorded {
                state,
                failure_count,
                ..
            } => {
                attrs.insert("state".to_string(), state.to_string());
                attrs.insert("failureCount".to_string(), failure_count.to_string());
            }
        }
        attrs
    }

    fn severity(&self) -> Severity {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } | CircuitBreakerEvent::SuccessRecorded { .. } => {
                Severity::Trace
            }
            CircuitBreakerEvent::CallRejected { .. } | CircuitBreakerEvent::FailureRecorded { .. } => {
                Severity::Debug
            }
            CircuitBreakerEvent::StateTransition {
                to_state: CircuitState::Open,
                ..
            } => Severity::Warn,
            CircuitBreakerEvent::StateTransition { .. } => Severity::Info,
        }
    }
}
