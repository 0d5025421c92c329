//! Retry, circuit breaker and fallback around one operation.
//!
//! ```text
//! call ──► Fallback ──► Retry ──► CircuitBreaker ──► operation
//! ```
//!
//! Every retry attempt passes through the breaker. A rejection by an open
//! breaker is a `CircuitOpenError`, which is never retryable, so the retry
//! loop stops at once and the fallback (when one is given) answers.

use crate::circuitbreaker::CircuitBreaker;
use crate::core::StructuredError;
use crate::fallback::Fallback;
use crate::retry::Retry;
use std::future::Future;

/// A composed resilient call. Cheap to clone; clones share the breaker.
#[derive(Clone, Debug)]
pub struct ResilientCall {
    breaker: Option<CircuitBreaker>,
    retry: Option<Retry>,
    fallback: Fallback,
}

impl ResilientCall {
    pub fn builder() -> ResilientCallBuilder {
        ResilientCallBuilder::default()
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    /// Runs `operation` through retry and breaker, without a fallback.
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T, StructuredError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        self.protected(&operation).await
    }

    /// Like [`call`](Self::call), answering with `fallback` when it fails.
    pub async fn call_with_fallback<T, F, Fut, FB, FBFut>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, StructuredError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
        FB: FnOnce() -> FBFut,
        FBFut: Future<Output = Result<T, StructuredError>>,
    {
        let operation = &operation;
        self.fallback
            .run(|| self.protected(operation), fallback)
            .await
    }

    /// Like [`call`](Self::call), answering with `value` when it fails.
    pub async fn call_or<T, F, Fut>(&self, operation: F, value: T) -> Result<T, StructuredError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        let operation = &operation;
        self.fallback
            .run_or(|| self.protected(operation), value)
            .await
    }

    async fn protected<T, F, Fut>(&self, operation: &F) -> Result<T, StructuredError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        match &self.retry {
            Some(retry) => retry.run(move || self.guarded(operation)).await,
            None => self.guarded(operation).await,
        }
    }

    async fn guarded<T, F, Fut>(&self, operation: &F) -> Result<T, StructuredError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StructuredError>>,
    {
        match &self.breaker {
            Some(breaker) => breaker.execute(operation).await,
            None => operation().await,
        }
    }
}

/// Builder for [`ResilientCall`]. Every part is optional.
#[derive(Default)]
pub struct ResilientCallBuilder {
    breaker: Option<CircuitBreaker>,
    retry: Option<Retry>,
    fallback: Option<Fallback>,
}

impl ResilientCallBuilder {
    pub fn breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    /// The fallback used by `call_with_fallback` and `call_or`.
    ///
    /// Default: an unselective fallback named `fallback`.
    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn build(self) -> ResilientCall {
        ResilientCall {
            breaker: self.breaker,
            retry: self.retry,
            fallback: self
                .fallback
                .unwrap_or_else(|| Fallback::builder().build()),
        }
    }
}
