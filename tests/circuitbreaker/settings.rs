use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerSettings, CircuitState};
use callguard_core::ConfigError;
use std::time::Duration;

#[test]
fn zero_threshold_is_rejected() {
    let err = CircuitBreaker::new("db", 0, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::BelowMinimum {
            field: "failure_threshold",
            ..
        }
    ));
    assert_eq!(err.to_string(), "failure_threshold must be at least 1, got 0");
}

#[test]
fn settings_from_json() {
    let settings: CircuitBreakerSettings = serde_json::from_str(
        r#"{ "name": "payments", "failureThreshold": 4, "openDurationMs": 250 }"#,
    )
    .unwrap();
    let breaker = CircuitBreaker::try_from(settings).unwrap();

    let metrics = breaker.metrics();
    assert_eq!(breaker.name(), "payments");
    assert_eq!(metrics.failure_threshold, 4);
    assert_eq!(metrics.state, CircuitState::Closed);
}

#[test]
fn state_serializes_by_name() {
    assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), r#""HalfOpen""#);
}
