use callguard_core::StructuredError;
use callguard_retry::{retry_with_backoff, Retry, RetryLayer, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Retry Example");
    println!("=============\n");

    // Example 1: transient database error, succeeds on the third attempt
    println!("Example 1: retry_with_backoff");
    let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0)?;
    let attempts = AtomicUsize::new(0);

    let rows = retry_with_backoff(
        || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  query attempt {n}");
            async move {
                if n < 3 {
                    Err(StructuredError::database(
                        "Connection timeout",
                        "SELECT * FROM users",
                        "CONN_TIMEOUT",
                    ))
                } else {
                    Ok(vec!["alice", "bob"])
                }
            }
        },
        &policy,
    )
    .await?;
    println!("  got {} rows\n", rows.len());

    // Example 2: exhaustion keeps the last failure as the cause
    println!("Example 2: exhausted retries");
    let retry = Retry::builder(RetryPolicy::new(3, Duration::from_millis(50), 2.0)?)
        .name("payments")
        .on_retry(|attempt, delay| println!("  [RETRY] attempt {attempt} failed, waiting {delay:?}"))
        .on_error(|attempts| println!("  [EXHAUSTED] after {attempts} attempts"))
        .build();

    let err = retry
        .run(|| async { Err::<(), _>(StructuredError::service("gateway unavailable", "charge")) })
        .await
        .unwrap_err();
    println!("{}", err.report());

    // Example 3: errors marked non-retryable are returned at once
    println!("Example 3: non-retryable error");
    let err = retry
        .run(|| async {
            Err::<(), _>(StructuredError::validation("Invalid email", "email").with_retryable(false))
        })
        .await
        .unwrap_err();
    println!("  returned unchanged: {err}\n");

    // Example 4: as a tower layer
    println!("Example 4: RetryLayer");
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = RetryLayer::new(retry).layer(tower::service_fn(move |req: String| {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(StructuredError::api("upstream returned 503", "/search", 503))
            } else {
                Ok(format!("results for {req}"))
            }
        }
    }));
    let response = service.oneshot("rust".to_string()).await?;
    println!("  {response} after {} calls", calls.load(Ordering::SeqCst));

    Ok(())
}
