use callguard_core::{ErrorKind, MemorySink, StructuredError};
use callguard_fallback::{with_fallback, Fallback, FallbackLayer};
use tower::{Layer, ServiceExt};

#[tokio::main]
async fn main() -> Result<(), StructuredError> {
    println!("Fallback Example");
    println!("================\n");

    // Example 1: primary fails, cached value answers
    println!("Example 1: with_fallback");
    let profile = with_fallback(
        || async { Err(StructuredError::service("Service unavailable", "getProfile")) },
        || async { Ok("cached profile") },
    )
    .await?;
    println!("  got: {profile}\n");

    // Example 2: named fallback reporting to a sink
    println!("Example 2: suppressed errors are reported");
    let sink = MemorySink::new();
    let fallback = Fallback::builder()
        .name("recommendations")
        .handle(|e: &StructuredError| !matches!(e.kind(), ErrorKind::Validation { .. }))
        .sink(sink.clone())
        .build();

    let items = fallback
        .run_or(
            || async { Err(StructuredError::api("Bad gateway", "/recommendations", 502)) },
            Vec::<String>::new(),
        )
        .await?;
    println!("  got {} items", items.len());
    for record in sink.records() {
        println!("  [{}] {}: {}", record.severity, record.kind, record.message);
    }
    println!();

    // Example 3: validation errors are not handled
    println!("Example 3: unhandled error");
    let err = fallback
        .run_or(
            || async { Err(StructuredError::validation("Invalid email", "email")) },
            Vec::<String>::new(),
        )
        .await
        .unwrap_err();
    println!("  propagated: {err}\n");

    // Example 4: as a tower layer
    println!("Example 4: FallbackLayer");
    let service = FallbackLayer::<String, String>::from_error(|e| format!("degraded ({})", e.message()))
        .layer(tower::service_fn(|_req: String| async move {
            Err::<String, _>(StructuredError::service("search cluster down", "search"))
        }));
    let response = service.oneshot("rust".to_string()).await?;
    println!("  {response}");

    Ok(())
}
