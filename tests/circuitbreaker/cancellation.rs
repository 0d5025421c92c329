use callguard_circuitbreaker::{CircuitBreaker, CircuitState};
use callguard_core::{CancellationToken, ErrorKind, StructuredError, cancellable, with_deadline};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn cancelled_call_records_nothing() {
    let breaker = CircuitBreaker::new("db", 1, Duration::from_secs(5)).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = cancellable(
        breaker.execute(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err::<(), _>(StructuredError::service("slow", "query"))
        }),
        &token,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_inside_the_breaker_is_not_a_failure() {
    let breaker = CircuitBreaker::new("db", 1, Duration::from_secs(5)).unwrap();

    let err = breaker
        .execute(|| {
            with_deadline(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<_, StructuredError>(())
                },
                Duration::from_millis(250),
            )
        })
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::Cancelled));
    assert_eq!(err.attribute("deadlineMs"), Some(serde_json::json!(250)));
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_flight_releases_the_probe() {
    let breaker = CircuitBreaker::new("db", 1, Duration::from_secs(5)).unwrap();
    let _ = breaker
        .execute(|| async { Err::<(), _>(StructuredError::service("down", "query")) })
        .await;
    tokio::time::advance(Duration::from_secs(5)).await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = cancellable(
        breaker.execute(|| std::future::pending::<Result<(), StructuredError>>()),
        &token,
    )
    .await
    .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker
        .execute(|| async { Ok::<_, StructuredError>(()) })
        .await
        .unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
