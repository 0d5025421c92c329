//! Circuit breaker metrics regression tests

use super::helpers::*;
use callguard_circuitbreaker::CircuitBreaker;
use callguard_core::StructuredError;
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_call_metrics() {
    init_recorder();

    let cb = CircuitBreaker::builder()
        .name("test_cb")
        .failure_threshold(1)
        .open_duration(Duration::from_secs(60))
        .build()
        .unwrap();

    let _ = cb.execute(|| async { Ok::<_, StructuredError>(()) }).await;
    let _ = cb
        .execute(|| async { Err::<(), _>(StructuredError::service("down", "op")) })
        .await;
    let _ = cb.execute(|| async { Ok::<_, StructuredError>(()) }).await;

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_transition_metrics() {
    init_recorder();

    let cb = CircuitBreaker::builder()
        .name("transition_cb")
        .failure_threshold(2)
        .build()
        .unwrap();

    for _ in 0..2 {
        let _ = cb
            .execute(|| async { Err::<(), _>(StructuredError::service("down", "op")) })
            .await;
    }

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "transition_cb");
}
