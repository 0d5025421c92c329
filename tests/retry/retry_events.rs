//! Listener callbacks and sink records emitted by the retry executor.

use callguard_core::{MemorySink, Severity, StructuredError};
use callguard_retry::{Retry, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(100), 2.0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn on_retry_reports_attempt_and_delay() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let retry = Retry::builder(policy(3))
        .on_retry(move |attempt, delay| s.lock().unwrap().push((attempt, delay)))
        .build();

    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::service("down", "sync")) })
        .await;

    assert_eq!(
        *seen.lock().unwrap(),
        [(1, Duration::from_millis(100)), (2, Duration::from_millis(200))]
    );
}

#[tokio::test(start_paused = true)]
async fn on_success_reports_attempts_used() {
    let attempts_used = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts_used);
    let calls = AtomicUsize::new(0);
    let retry = Retry::builder(policy(5))
        .on_success(move |attempts| a.store(attempts, Ordering::SeqCst))
        .build();

    retry
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
        .await
        .unwrap();

    assert_eq!(attempts_used.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn on_error_fires_once_on_exhaustion() {
    let exhausted = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&exhausted);
    let retry = Retry::builder(policy(3))
        .on_error(move |attempts| {
            assert_eq!(attempts, 3);
            e.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::generic("flaky")) })
        .await;

    assert_eq!(exhausted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sink_receives_retry_then_exhausted() {
    let sink = MemorySink::new();
    let retry = Retry::builder(policy(3))
        .name("payments")
        .sink(sink.clone())
        .build();

    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::api("Bad gateway", "/charge", 502)) })
        .await;

    let kinds: Vec<_> = sink.records().into_iter().map(|r| r.kind).collect();
    assert_eq!(kinds, ["Retry", "Retry", "Exhausted"]);

    let retries = sink.records_of("Retry");
    assert_eq!(retries[0].source, "payments");
    assert_eq!(retries[0].attributes["attempt"], "1");
    assert_eq!(retries[0].attributes["delayMs"], "100");
    assert_eq!(retries[0].attributes["errorKind"], "APIError");
    assert_eq!(retries[1].attributes["delayMs"], "200");

    let exhausted = sink.records_of("Exhausted");
    assert_eq!(exhausted[0].severity, Severity::Warn);
    assert_eq!(exhausted[0].message, "Failed after 3 attempts");
}

#[tokio::test(start_paused = true)]
async fn ignored_error_is_recorded_without_retry() {
    let sink = MemorySink::new();
    let ignored = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&ignored);
    let retry = Retry::builder(policy(3))
        .on_ignored_error(move || {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .sink(sink.clone())
        .build();

    let _ = retry
        .run(|| async { Err::<(), _>(StructuredError::circuit_open("db")) })
        .await;

    assert_eq!(ignored.load(Ordering::SeqCst), 1);
    let kinds: Vec<_> = sink.records().into_iter().map(|r| r.kind).collect();
    assert_eq!(kinds, ["IgnoredError"]);
    assert_eq!(sink.records()[0].attributes["errorKind"], "CircuitOpenError");
}

#[tokio::test]
async fn first_try_success_records_success_only() {
    let sink = MemorySink::new();
    let retry = Retry::builder(policy(3)).sink(sink.clone()).build();

    retry
        .run(|| async { Ok::<_, StructuredError>(42) })
        .await
        .unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "Success");
    assert_eq!(records[0].attributes["attempts"], "1");
}
