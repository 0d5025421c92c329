use super::failure;
use callguard_circuitbreaker::{CircuitBreaker, CircuitState};
use callguard_core::StructuredError;
use std::time::Duration;
use tokio::sync::oneshot;

async fn tripped(threshold: usize) -> CircuitBreaker {
    let breaker = CircuitBreaker::new("half-open", threshold, Duration::from_secs(5)).unwrap();
    for _ in 0..threshold {
        let _ = breaker.execute(|| async { Err::<(), _>(failure()) }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    breaker
}

#[tokio::test(start_paused = true)]
async fn still_rejects_before_open_duration_elapses() {
    let breaker = tripped(2).await;
    tokio::time::advance(Duration::from_millis(4999)).await;

    let err = breaker
        .execute(|| async { Ok::<_, StructuredError>(()) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
}

#[tokio::test(start_paused = true)]
async fn probe_success_closes_and_restores_full_threshold() {
    let breaker = tripped(2).await;
    tokio::time::advance(Duration::from_secs(5)).await;

    breaker
        .execute(|| async { Ok::<_, StructuredError>("probe") })
        .await
        .unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);

    // a single failure must not reopen it
    let _ = breaker.execute(|| async { Err::<(), _>(failure()) }).await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    let _ = breaker.execute(|| async { Err::<(), _>(failure()) }).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_reopens_for_a_fresh_duration() {
    let breaker = tripped(3).await;
    tokio::time::advance(Duration::from_secs(5)).await;

    let _ = breaker.execute(|| async { Err::<(), _>(failure()) }).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.metrics().remaining_open, Some(Duration::from_secs(5)));
}

#[tokio::test(start_paused = true)]
async fn only_one_probe_at_a_time() {
    let breaker = tripped(1).await;
    tokio::time::advance(Duration::from_secs(5)).await;

    let (release, wait) = oneshot::channel::<()>();
    let probe = {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            breaker
                .execute(|| async move {
                    let _ = wait.await;
                    Ok::<_, StructuredError>("probe")
                })
                .await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    let err = breaker
        .execute(|| async { Ok::<_, StructuredError>("second") })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());

    release.send(()).unwrap();
    assert_eq!(probe.await.unwrap().unwrap(), "probe");
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn abandoned_probe_frees_the_slot() {
    let breaker = tripped(1).await;
    tokio::time::advance(Duration::from_secs(5)).await;

    let stalled = breaker.execute(|| std::future::pending::<Result<(), StructuredError>>());
    let timed_out = tokio::time::timeout(Duration::from_millis(10), stalled).await;
    assert!(timed_out.is_err());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker
        .execute(|| async { Ok::<_, StructuredError>(()) })
        .await
        .unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
