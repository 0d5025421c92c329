//! Selective fallbacks: errors outside the handle predicate propagate.

use callguard_core::{ErrorKind, MemorySink, StructuredError};
use callguard_fallback::Fallback;
use std::sync::atomic::{AtomicUsize, Ordering};

fn backend_only() -> Fallback {
    Fallback::builder()
        .name("profile")
        .handle(|e: &StructuredError| {
            matches!(
                e.kind(),
                ErrorKind::Service { .. } | ErrorKind::Api { .. } | ErrorKind::Database { .. }
            )
        })
        .build()
}

#[tokio::test]
async fn matching_error_is_handled() {
    let value = backend_only()
        .run_or(
            || async { Err(StructuredError::service("down", "getProfile")) },
            "guest",
        )
        .await
        .unwrap();
    assert_eq!(value, "guest");
}

#[tokio::test]
async fn non_matching_error_propagates_without_fallback() {
    let invoked = AtomicUsize::new(0);

    let err = backend_only()
        .run(
            || async { Err::<&str, _>(StructuredError::validation("Invalid email", "email")) },
            || {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok("guest") }
            },
        )
        .await
        .unwrap_err();

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(matches!(err.kind(), ErrorKind::Validation { .. }));
}

#[tokio::test]
async fn skipped_error_is_recorded() {
    let sink = MemorySink::new();
    let fallback = Fallback::builder()
        .handle(|e: &StructuredError| !e.is_cancelled())
        .sink(sink.clone())
        .build();

    let _ = fallback
        .run_or(|| async { Err(StructuredError::cancelled("shutdown")) }, ())
        .await;

    let skipped = sink.records_of("skipped");
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].attributes["errorKind"], "CancelledError");
    assert!(sink.records_of("failed_attempt").is_empty());
}
