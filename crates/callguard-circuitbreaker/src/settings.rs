use crate::{CircuitBreaker, CircuitBreakerConfigBuilder};
use callguard_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plain circuit breaker settings, for loading from configuration files.
///
/// Missing fields take the builder defaults.
///
/// ```rust
/// use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerSettings};
///
/// let settings: CircuitBreakerSettings =
///     serde_json::from_str(r#"{ "name": "payments", "failureThreshold": 5 }"#).unwrap();
/// let breaker = CircuitBreaker::try_from(settings).unwrap();
/// assert_eq!(breaker.name(), "payments");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircuitBreakerSettings {
    pub name: String,
    pub failure_threshold: usize,
    pub open_duration_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 3,
            open_duration_ms: 5_000,
        }
    }
}

impl From<CircuitBreakerSettings> for CircuitBreakerConfigBuilder {
    fn from(settings: CircuitBreakerSettings) -> Self {
        CircuitBreaker::builder()
            .name(settings.name)
            .failure_threshold(settings.failure_threshold)
            .open_duration(Duration::from_millis(settings.open_duration_ms))
    }
}

impl TryFrom<CircuitBreakerSettings> for CircuitBreaker {
    type Error = ConfigError;

    fn try_from(settings: CircuitBreakerSettings) -> Result<Self, Self::Error> {
        CircuitBreakerConfigBuilder::from(settings).build()
    }
}
