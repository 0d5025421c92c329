//! Fallback, retry and circuit breaker composed with `ResilientCall`, behind
//! an error boundary.

use callguard::boundary::ErrorBoundary;
use callguard::circuitbreaker::CircuitBreaker;
use callguard::core::{MemorySink, StructuredError, TracingSink};
use callguard::fallback::Fallback;
use callguard::retry::{Retry, RetryPolicy};
use callguard::ResilientCall;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let events = MemorySink::new();

    let call = ResilientCall::builder()
        .breaker(
            CircuitBreaker::builder()
                .name("user-service")
                .failure_threshold(2)
                .open_duration(Duration::from_secs(5))
                .sink(events.clone())
                .build()?,
        )
        .retry(
            Retry::builder(RetryPolicy::new(3, Duration::from_millis(20), 2.0)?)
                .name("user-service")
                .sink(events.clone())
                .build(),
        )
        .fallback(
            Fallback::builder()
                .name("user-service")
                .sink(events.clone())
                .build(),
        )
        .build();

    let calls = AtomicUsize::new(0);
    let fetch_user = || {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
            Err::<String, _>(
                StructuredError::api("Failed to fetch user data", "/api/users/123", 500)
                    .with_cause(StructuredError::service("User service failed", "getUserById")),
            )
        }
    };

    println!("--- Request 1: degraded answer from cache ---");
    let user = call
        .call_or(fetch_user, "guest (cached)".to_string())
        .await?;
    println!("user = {user}, operation ran {} times", calls.load(Ordering::SeqCst));

    println!("\n--- Request 2: breaker is open, error reaches the boundary ---");
    let boundary = ErrorBoundary::new("http", TracingSink);
    let response = boundary.guard(call.call(fetch_user)).await;
    if let Err(response) = response {
        println!("response: {response}");
        println!("json: {}", serde_json::to_string(&response)?);
    }

    println!("\n--- Events ---");
    for record in events.records() {
        println!("[{}] {} {}: {}", record.severity, record.source, record.kind, record.message);
    }

    Ok(())
}
