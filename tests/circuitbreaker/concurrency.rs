use super::failure;
use callguard_circuitbreaker::{CircuitBreaker, CircuitState};
use callguard_core::StructuredError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_call_is_counted_exactly_once() {
    let breaker = CircuitBreaker::new("concurrent", 5, Duration::from_secs(60)).unwrap();
    let invoked = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let breaker = breaker.clone();
            let invoked = Arc::clone(&invoked);
            tokio::spawn(async move {
                breaker
                    .execute(|| {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::task::yield_now().await;
                            Err::<(), _>(failure())
                        }
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    let metrics = breaker.metrics();
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(metrics.total_failures as usize, invoked.load(Ordering::SeqCst));
    assert_eq!(metrics.total_failures + metrics.total_rejections, 100);
    assert!(metrics.total_failures >= 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successes_keep_the_circuit_closed_under_load() {
    let breaker = CircuitBreaker::new("healthy", 1, Duration::from_secs(60)).unwrap();

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let breaker = breaker.clone();
            tokio::spawn(async move {
                breaker
                    .execute(|| async move { Ok::<_, StructuredError>(i) })
                    .await
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap().unwrap();
    }

    assert_eq!(total, (0..50).sum::<i32>());
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().total_successes, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listeners_may_inspect_the_breaker() {
    let slot: Arc<std::sync::OnceLock<CircuitBreaker>> = Arc::new(std::sync::OnceLock::new());
    let observed = Arc::new(AtomicUsize::new(0));

    let s = Arc::clone(&slot);
    let o = Arc::clone(&observed);
    let breaker = CircuitBreaker::builder()
        .failure_threshold(1)
        .on_failure(move |_, _| {
            // runs after the state lock is released
            if let Some(b) = s.get() {
                o.store(b.failure_count(), Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();
    let _ = slot.set(breaker.clone());

    let _ = breaker.execute(|| async { Err::<(), _>(failure()) }).await;
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}
