use callguard::circuitbreaker::{CircuitBreaker, CircuitState};
use callguard::core::{ManualClock, MemorySink, StructuredError};
use callguard::fallback::Fallback;
use callguard::retry::{Retry, RetryPolicy};
use callguard::ResilientCall;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn database_down() -> StructuredError {
    StructuredError::database("Connection timeout", "SELECT * FROM stock", "CONN_TIMEOUT")
}

struct Harness {
    call: ResilientCall,
    clock: ManualClock,
    sink: MemorySink,
}

fn harness(threshold: usize, attempts: usize) -> Harness {
    let clock = ManualClock::new();
    let sink = MemorySink::new();
    let breaker = CircuitBreaker::builder()
        .name("stock-db")
        .failure_threshold(threshold)
        .open_duration(Duration::from_secs(30))
        .clock(Arc::new(clock.clone()))
        .sink(sink.clone())
        .build()
        .unwrap();
    let retry = Retry::builder(RetryPolicy::new(attempts, Duration::from_millis(10), 2.0).unwrap())
        .name("stock-retry")
        .sink(sink.clone())
        .build();
    let fallback = Fallback::builder()
        .name("stock-fallback")
        .sink(sink.clone())
        .build();

    Harness {
        call: ResilientCall::builder()
            .breaker(breaker)
            .retry(retry)
            .fallback(fallback)
            .build(),
        clock,
        sink,
    }
}

#[tokio::test(start_paused = true)]
async fn outage_then_recovery() {
    let h = harness(3, 5);
    let calls = AtomicUsize::new(0);

    // the outage: three real attempts open the breaker, the fourth is rejected
    let stock = h
        .call
        .call_or(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(database_down()) }
            },
            0,
        )
        .await
        .unwrap();
    assert_eq!(stock, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.call.breaker().unwrap().state(), CircuitState::Open);

    let suppressed = h.sink.records_of("failed_attempt");
    assert_eq!(suppressed.len(), 1);
    assert_eq!(suppressed[0].attributes["errorKind"], "CircuitOpenError");

    // still open: no attempt reaches the backend
    let stock = h
        .call
        .call_or(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, StructuredError>(42) }
            },
            0,
        )
        .await
        .unwrap();
    assert_eq!(stock, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // after the cool-down the probe succeeds and the breaker closes
    h.clock.advance(Duration::from_secs(30));
    let stock = h
        .call
        .call_or(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, StructuredError>(42) }
            },
            0,
        )
        .await
        .unwrap();
    assert_eq!(stock, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.call.breaker().unwrap().state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_below_threshold_keeps_breaker_closed() {
    let h = harness(10, 3);

    let err = h
        .call
        .call(|| async { Err::<(), _>(database_down()) })
        .await
        .unwrap_err();

    assert_eq!(err.kind().name(), "RetryExhaustedError");
    assert_eq!(err.root_cause().message(), "Connection timeout");
    let breaker = h.call.breaker().unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn fallback_operation_answers_with_cache() {
    let h = harness(3, 2);

    let profile = h
        .call
        .call_with_fallback(
            || async { Err(StructuredError::service("Service unavailable", "getProfile")) },
            || async { Ok("cached profile") },
        )
        .await
        .unwrap();

    assert_eq!(profile, "cached profile");
    let applied = h.sink.records_of("applied");
    assert_eq!(applied[0].attributes["strategy"], "operation");
}

#[tokio::test]
async fn parts_are_optional() {
    let bare = ResilientCall::builder().build();
    assert!(bare.breaker().is_none());

    let calls = AtomicUsize::new(0);
    let err = bare
        .call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(database_down()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.message(), "Connection timeout");
}
