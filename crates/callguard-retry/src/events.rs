use callguard_core::events::{ResilienceEvent, Severity};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Events emitted by the retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another one will be made after `delay`.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        /// The 1-indexed attempt that failed.
        attempt: usize,
        delay: Duration,
        error_kind: &'static str,
        error_message: String,
    },
    /// The operation succeeded (either on first try or after retries).
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt failed.
    Exhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// An error was not retried, either because it isn't retryable or
    /// because the policy predicate rejected it.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
        attempt: usize,
        error_kind: &'static str,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Exhausted { .. } => "Exhausted",
            RetryEvent::IgnoredError { .. } => "IgnoredError",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Exhausted { pattern_name, .. }
            | RetryEvent::IgnoredError { pattern_name, .. } => pattern_name,
        }
    }

    fn message(&self) -> String {
        match self {
            RetryEvent::Retry {
                attempt,
                delay,
                error_message,
                ..
            } => format!("attempt {attempt} failed ({error_message}), retrying in {delay:?}"),
            RetryEvent::Success { attempts, .. } => format!("succeeded after {attempts} attempt(s)"),
            RetryEvent::Exhausted { attempts, .. } => format!("Failed after {attempts} attempts"),
            RetryEvent::IgnoredError {
                attempt, error_kind, ..
            } => format!("{error_kind} on attempt {attempt} is not retried"),
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        match self {
            RetryEvent::Retry {
                attempt,
                delay,
                error_kind,
                ..
            } => {
                attrs.insert("attempt".into(), attempt.to_string());
                attrs.insert("delayMs".into(), delay.as_millis().to_string());
                attrs.insert("errorKind".into(), error_kind.to_string());
            }
            RetryEvent::Success { attempts, .. } | RetryEvent::Exhausted { attempts, .. } => {
                attrs.insert("attempts".into(), attempts.to_string());
            }
            RetryEvent::IgnoredError {
                attempt, error_kind, ..
            } => {
                attrs.insert("attempt".into(), attempt.to_string());
                attrs.insert("errorKind".into(), error_kind.to_string());
            }
        }
        attrs
    }

    fn severity(&self) -> Severity {
        match self {
            RetryEvent::Retry { .. } => Severity::Info,
            RetryEvent::Success { .. } => Severity::Debug,
            RetryEvent::Exhausted { .. } => Severity::Warn,
            RetryEvent::IgnoredError { .. } => Severity::Debug,
        }
    }
}
