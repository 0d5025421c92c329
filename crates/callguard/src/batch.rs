//! Log-and-continue processing.
//!
//! [`process_all`] applies a fallible function to every item. Failures are
//! reported to a sink and collected with the index of the item that caused
//! them; processing carries on with the next item. To stop at the first
//! failure instead, use `?` in an ordinary loop.

use crate::core::{deliver, EventRecord, EventSink, Severity, StructuredError};
use std::future::Future;

/// An item that could not be processed.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the item in the input.
    pub index: usize,
    pub error: StructuredError,
}

/// Result of processing a batch.
#[derive(Debug)]
pub struct BatchOutcome<U> {
    /// Outputs of the items that succeeded, in input order.
    pub successes: Vec<U>,
    /// Failures in input order.
    pub failures: Vec<BatchFailure>,
}

impl<U> BatchOutcome<U> {
    fn new() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of items processed, successful or not.
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    fn record<S: EventSink + ?Sized>(&mut self, index: usize, result: Result<U, StructuredError>, sink: &S) {
        match result {
            Ok(value) => self.successes.push(value),
            Err(error) => {
                let record = EventRecord::from_error("batch", &error, Severity::Warn)
                    .with_attribute("index", index.to_string());
                deliver(sink, &record);
                self.failures.push(BatchFailure { index, error });
            }
        }
    }
}

/// Applies `f` to every item, reporting and collecting failures.
pub fn process_all<I, T, U, F, S>(items: I, mut f: F, sink: &S) -> BatchOutcome<U>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<U, StructuredError>,
    S: EventSink + ?Sized,
{
    let mut outcome = BatchOutcome::new();
    for (index, item) in items.into_iter().enumerate() {
        outcome.record(index, f(item), sink);
    }

    tracing::debug!(
        succeeded = outcome.successes.len(),
        failed = outcome.failures.len(),
        "batch processed"
    );
    outcome
}

/// Async form of [`process_all`]. Items are processed one after another.
pub async fn process_all_async<I, T, U, F, Fut, S>(items: I, mut f: F, sink: &S) -> BatchOutcome<U>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U, StructuredError>>,
    S: EventSink + ?Sized,
{
    let mut outcome = BatchOutcome::new();
    for (index, item) in items.into_iter().enumerate() {
        let result = f(item).await;
        outcome.record(index, result, sink);
    }

    tracing::debug!(
        succeeded = outcome.successes.len(),
        failed = outcome.failures.len(),
        "batch processed"
    );
    outcome
}
