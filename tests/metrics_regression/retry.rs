//! Retry metrics regression tests

use super::helpers::*;
use callguard_core::StructuredError;
use callguard_retry::{Retry, RetryPolicy};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), 1.0).unwrap()
}

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let retry = Retry::builder(policy(3)).name("test_retry").build();
    let calls = AtomicUsize::new(0);

    let _ = retry
        .run(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StructuredError::generic("flaky"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "result", "success");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");
}

#[tokio::test]
#[serial]
async fn retry_exhausted_and_ignored_metrics() {
    init_recorder();

    let retry = Retry::builder(policy(2)).name("exhausted_retry").build();

    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::generic("flaky")) })
        .await;
    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::circuit_open("db")) })
        .await;

    assert_metric_has_label("retry_calls_total", "result", "exhausted");
    assert_metric_has_label("retry_calls_total", "result", "ignored");
}
