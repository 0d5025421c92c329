//! Fallback metrics regression tests

use super::helpers::*;
use callguard_core::StructuredError;
use callguard_fallback::Fallback;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn fallback_metrics_exist() {
    init_recorder();

    let fallback = Fallback::builder()
        .name("test_fallback")
        .handle(|e: &StructuredError| !e.is_cancelled())
        .build();

    let _ = fallback
        .run_or(|| async { Ok::<_, StructuredError>(1) }, 0)
        .await;
    let _ = fallback
        .run_or(|| async { Err(StructuredError::generic("down")) }, 0)
        .await;
    let _ = fallback
        .run(
            || async { Err::<u8, _>(StructuredError::generic("down")) },
            || async { Err(StructuredError::generic("also down")) },
        )
        .await;
    let _ = fallback
        .run_or(|| async { Err(StructuredError::cancelled("stop")) }, 0)
        .await;

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "fallback", "test_fallback");
    assert_metric_has_label("fallback_calls_total", "result", "success");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
    assert_metric_has_label("fallback_calls_total", "strategy", "value");
    assert_metric_has_label("fallback_calls_total", "result", "failed");
    assert_metric_has_label("fallback_calls_total", "strategy", "operation");
    assert_metric_has_label("fallback_calls_total", "result", "skipped");
}
