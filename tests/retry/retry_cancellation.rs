//! Cancelling a retry loop:
//! - Token cancelled during the backoff sleep
//! - Deadline reached during the backoff sleep
//! - Token cancelled before the first attempt

use callguard_core::{CancellationToken, StructuredError, cancellable, with_deadline};
use callguard_retry::{RetryPolicy, retry_with_backoff};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn slow_policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_secs(10), 2.0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_abandons_the_wait() {
    let calls = AtomicUsize::new(0);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = cancellable(
        retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StructuredError::service("unavailable", "sync")) }
            },
            &slow_policy(),
        ),
        &token,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.kind().name(), "CancelledError");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn deadline_during_backoff_reports_cancelled() {
    let calls = AtomicUsize::new(0);

    let err = with_deadline(
        retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StructuredError::api("Bad gateway", "/orders", 502)) }
            },
            &slow_policy(),
        ),
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attribute("deadlineMs"), Some(serde_json::json!(1000)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_skips_the_operation() {
    let calls = AtomicUsize::new(0);
    let token = CancellationToken::new();
    token.cancel();

    let err = cancellable(
        retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, StructuredError>("never") }
            },
            &slow_policy(),
        ),
        &token,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
