//! Health check endpoint built on the breaker's state inspection API.
//!
//! `state()`, `is_open()`, `http_status()`, `health_status()` and `metrics()`
//! never block on an in-flight call, so they can back a health endpoint or a
//! dashboard.
//!
//! Run with:
//! ```bash
//! cargo run -p callguard-circuitbreaker --example circuitbreaker_health_check
//! ```

use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer};
use callguard_core::StructuredError;
use std::time::Duration;
use tower::{Layer, ServiceExt};

async fn backend_service(req: String) -> Result<String, StructuredError> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    if req.contains("fail") {
        Err(StructuredError::api("Backend error", "/backend", 502))
    } else {
        Ok(format!("Processed: {req}"))
    }
}

fn health_check(breakers: &[&CircuitBreaker]) -> (u16, String) {
    let status = breakers
        .iter()
        .map(|b| b.http_status())
        .max()
        .unwrap_or(200);
    let body = breakers
        .iter()
        .map(|b| {
            let m = b.metrics();
            format!(
                "{}: {} (state {}, failures {}/{}, rejected {})",
                b.name(),
                b.health_status(),
                m.state,
                m.failure_count,
                m.failure_threshold,
                m.total_rejections
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    (status, body)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db = CircuitBreaker::new("database", 3, Duration::from_secs(30))?;
    let cache = CircuitBreaker::new("cache", 3, Duration::from_secs(30))?;

    let service = CircuitBreakerLayer::new(db.clone()).layer(tower::service_fn(backend_service));

    println!("Healthy traffic:");
    for i in 0..3 {
        service.clone().oneshot(format!("request-{i}")).await?;
    }
    let (status, body) = health_check(&[&db, &cache]);
    println!("HTTP {status}\n{body}\n");

    println!("Failing traffic:");
    for i in 0..4 {
        if let Err(e) = service.clone().oneshot(format!("fail-{i}")).await {
            println!("  {}: {}", e.kind().name(), e);
        }
    }
    let (status, body) = health_check(&[&db, &cache]);
    println!("HTTP {status}\n{body}");
    println!("database open: {}", db.is_open());

    Ok(())
}
