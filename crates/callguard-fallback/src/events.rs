//! Events emitted by the fallback combinator.

use callguard_core::{ResilienceEvent, Severity};
use std::collections::BTreeMap;
use std::time::Instant;

/// Events emitted by the fallback combinator.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The primary operation succeeded; no fallback was needed.
    Success {
        /// Name of the fallback instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// The primary operation failed and its error is being suppressed.
    FailedAttempt {
        /// Name of the fallback instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Kind of the suppressed error.
        error_kind: &'static str,
        /// Message of the suppressed error.
        error_message: String,
        /// The suppressed error's chain, outermost first.
        chain: String,
    },

    /// The fallback produced a value.
    Applied {
        /// Name of the fallback instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The strategy that was applied.
        strategy: &'static str,
    },

    /// The fallback itself failed; its error is returned.
    Failed {
        /// Name of the fallback instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Kind of the fallback's error.
        error_kind: &'static str,
    },

    /// The error didn't match the handle predicate; propagated as-is.
    Skipped {
        /// Name of the fallback instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Kind of the propagated error.
        error_kind: &'static str,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::FailedAttempt { .. } => "failed_attempt",
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Success { timestamp, .. }
            | Self::FailedAttempt { timestamp, .. }
            | Self::Applied { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Skipped { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Success { pattern_name, .. }
            | Self::FailedAttempt { pattern_name, .. }
            | Self::Applied { pattern_name, .. }
            | Self::Failed { pattern_name, .. }
            | Self::Skipped { pattern_name, .. } => pattern_name,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Success { .. } => "primary succeeded".to_string(),
            Self::FailedAttempt { error_message, .. } => {
                format!("primary failed, using fallback: {error_message}")
            }
            Self::Applied { strategy, .. } => format!("fallback applied ({strategy})"),
            Self::Failed { .. } => "fallback failed".to_string(),
            Self::Skipped { error_kind, .. } => format!("{error_kind} not handled by fallback"),
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        match self {
            Self::Success { .. } => {}
            Self::FailedAttempt {
                error_kind, chain, ..
            } => {
                attrs.insert("errorKind".into(), error_kind.to_string());
                attrs.insert("chain".into(), chain.clone());
            }
            Self::Applied { strategy, .. } => {
                attrs.insert("strategy".into(), strategy.to_string());
            }
            Self::Failed { error_kind, .. } | Self::Skipped { error_kind, .. } => {
                attrs.insert("errorKind".into(), error_kind.to_string());
            }
        }
        attrs
    }

    fn severity(&self) -> Severity {
        match self {
            Self::FailedAttempt { .. } => Severity::Warn,
            Self::Failed { .. } => Severity::Error,
            _ => Severity::Debug,
        }
    }
}
