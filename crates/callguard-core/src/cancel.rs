//! Caller-driven cancellation and deadlines.
//!
//! Both helpers race the wrapped future against a stop condition and report
//! the loss as a [`Cancelled`](crate::ErrorKind::Cancelled) error. The wrapped
//! future is dropped when it loses, which releases any breaker probe slot it
//! holds.

use crate::error::StructuredError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs `future` until it completes or `token` is cancelled.
///
/// An already-cancelled token wins without polling `future`.
pub async fn cancellable<F, T>(future: F, token: &CancellationToken) -> Result<T, StructuredError>
where
    F: Future<Output = Result<T, StructuredError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StructuredError::cancelled("operation cancelled by caller")),
        result = future => result,
    }
}

/// Runs `future` for at most `deadline`.
pub async fn with_deadline<F, T>(future: F, deadline: Duration) -> Result<T, StructuredError>
where
    F: Future<Output = Result<T, StructuredError>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            let millis = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
            Err(
                StructuredError::cancelled(format!("deadline of {millis}ms exceeded"))
                    .with_attribute("deadlineMs", millis),
            )
        }
    }
}
