//! A retry loop whose attempts go through a circuit breaker.

use callguard::circuitbreaker::CircuitBreaker;
use callguard::core::StructuredError;
use callguard::retry::{Retry, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let breaker = CircuitBreaker::builder()
        .name("orders-db")
        .failure_threshold(3)
        .open_duration(Duration::from_secs(2))
        .on_state_transition(|from, to| println!("  [BREAKER] {from} -> {to}"))
        .build()?;

    let retry = Retry::builder(RetryPolicy::new(5, Duration::from_millis(50), 2.0)?)
        .name("orders")
        .on_retry(|attempt, delay| println!("  [RETRY] attempt {attempt} failed, waiting {delay:?}"))
        .build();

    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let result = retry
        .run(|| {
            breaker.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(StructuredError::database(
                        "Connection timeout",
                        "SELECT * FROM orders",
                        "CONN_TIMEOUT",
                    ))
                }
            })
        })
        .await;

    let err = result.unwrap_err();
    println!("\noperation ran {} times", calls.load(Ordering::SeqCst));
    println!("breaker is {}", breaker.state());
    println!("{}", err.report());

    Ok(())
}
