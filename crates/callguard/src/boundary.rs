//! The outermost error handler.
//!
//! An [`ErrorBoundary`] sits where a request or job enters the program. It
//! reports every error that reaches it, with its full cause chain, to a sink
//! and turns it into an [`ErrorResponse`] fit to hand back to a caller.
//! Panics inside [`ErrorBoundary::guard`] are handled the same way.
//!
//! ```rust
//! use callguard::boundary::{classify, ErrorBoundary};
//! use callguard::core::{MemorySink, StructuredError};
//!
//! let response = classify(&StructuredError::validation("Invalid email format", "email"));
//! assert_eq!(response.status, 400);
//! assert_eq!(response.field.as_deref(), Some("email"));
//!
//! let sink = MemorySink::new();
//! let boundary = ErrorBoundary::new("api", sink.clone());
//! let response = boundary.handle(&StructuredError::database(
//!     "Connection lost",
//!     "SELECT * FROM products",
//!     "CONN_TIMEOUT",
//! ));
//! assert_eq!(response.status, 503);
//! assert_eq!(response.retry_after_ms, Some(5000));
//! assert_eq!(sink.len(), 1);
//! ```

use crate::core::{deliver, EventRecord, EventSink, ErrorKind, Severity, StructuredError, TracingSink};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Delay suggested to clients after a transient database failure.
pub const DATABASE_RETRY_AFTER_MS: u64 = 5000;

const INTERNAL: &str = "Internal server error";
const UNAVAILABLE: &str = "Service temporarily unavailable";

/// What a caller is told about a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Kind of the error that produced this response.
    pub error: &'static str,
    pub message: String,
    /// The offending input field, for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// How long the caller should wait before trying again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub retryable: bool,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

/// Maps an error to the response a caller should see.
///
/// Messages of server-side failures (database, service, exhausted retries,
/// generic) are replaced so internals don't leak.
pub fn classify(error: &StructuredError) -> ErrorResponse {
    let kind = error.kind();
    let mut response = ErrorResponse {
        status: 500,
        error: kind.name(),
        message: error.message().to_string(),
        field: None,
        retry_after_ms: None,
        retryable: error.is_retryable(),
    };

    match kind {
        ErrorKind::Validation { field } => {
            response.status = 400;
            response.field = Some(field.clone());
        }
        ErrorKind::Auth { code, .. } => response.status = *code,
        ErrorKind::Database { .. } => {
            response.status = 503;
            response.message = UNAVAILABLE.to_string();
            if error.is_retryable() {
                response.retry_after_ms = Some(DATABASE_RETRY_AFTER_MS);
            }
        }
        ErrorKind::CircuitOpen { .. } => {
            response.status = 503;
            response.retry_after_ms = error.attribute("retryAfterMs").and_then(|v| v.as_u64());
        }
        ErrorKind::Api { status_code, .. } => response.status = *status_code,
        ErrorKind::Cancelled => response.status = 499,
        ErrorKind::Service { .. } | ErrorKind::RetryExhausted { .. } | ErrorKind::Generic => {
            response.message = INTERNAL.to_string();
        }
    }

    response
}

/// Reports errors that reach the top of a call stack and converts them into
/// responses.
#[derive(Clone)]
pub struct ErrorBoundary {
    name: String,
    sink: Arc<dyn EventSink>,
}

impl ErrorBoundary {
    pub fn new<S>(name: impl Into<String>, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        Self {
            name: name.into(),
            sink: Arc::new(sink),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports `error` with its chain and returns the response for it.
    pub fn handle(&self, error: &StructuredError) -> ErrorResponse {
        let response = classify(error);
        let severity = if response.status >= 500 {
            Severity::Error
        } else {
            Severity::Warn
        };
        let record = EventRecord::from_error(self.name.clone(), error, severity)
            .with_attribute("status", response.status.to_string());
        deliver(&*self.sink, &record);
        response
    }

    /// Runs `fut`, converting both its error and any panic into a response.
    pub async fn guard<T, Fut>(&self, fut: Fut) -> Result<T, ErrorResponse>
    where
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(self.handle(&error)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(boundary = %self.name, %message, "panic caught at error boundary");
                let error = StructuredError::generic(format!("panic: {message}"))
                    .with_retryable(false);
                Err(self.handle(&error))
            }
        }
    }
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self::new("boundary", TracingSink)
    }
}

impl fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
