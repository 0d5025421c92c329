//! Walks a breaker through Closed -> Open -> HalfOpen -> Closed.
//!
//! Run with:
//! ```sh
//! cargo run -p callguard-circuitbreaker --example circuitbreaker_lifecycle --features tracing
//! ```

use callguard_circuitbreaker::CircuitBreaker;
use callguard_core::{ManualClock, StructuredError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::builder()
        .name("inventory")
        .failure_threshold(2)
        .open_duration(Duration::from_secs(5))
        .clock(clock.clone())
        .on_state_transition(|from, to| println!("  transition: {from} -> {to}"))
        .on_call_rejected(|retry_after| println!("  rejected, retry after {retry_after:?}"))
        .build()?;

    println!("Two failures open the circuit:");
    for _ in 0..2 {
        let _ = breaker
            .execute(|| async { Err::<(), _>(StructuredError::service("Service unavailable", "reserve")) })
            .await;
    }

    println!("A third call is rejected without running:");
    let err = breaker
        .execute(|| async { Ok::<_, StructuredError>("never runs") })
        .await
        .unwrap_err();
    println!("  {err}");

    println!("After the open duration, a probe is admitted:");
    clock.advance(Duration::from_secs(5));
    let stock = breaker
        .execute(|| async { Ok::<_, StructuredError>(12) })
        .await?;
    println!("  probe returned {stock}, failure count {}", breaker.failure_count());

    println!("Final metrics: {:?}", breaker.metrics());
    Ok(())
}
