use crate::Retry;
use callguard_core::StructuredError;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower [`Layer`] that retries failed requests with a [`Retry`] executor.
///
/// Requests must be `Clone`: every attempt sends a fresh copy to a fresh
/// clone of the inner service.
///
/// ```
/// use callguard_core::StructuredError;
/// use callguard_retry::{Retry, RetryLayer, RetryPolicy};
/// use tower::{ServiceBuilder, service_fn};
///
/// let retry = Retry::builder(RetryPolicy::default()).name("search").build();
///
/// let service = ServiceBuilder::new()
///     .layer(RetryLayer::new(retry))
///     .service(service_fn(|query: String| async move {
///         Ok::<_, StructuredError>(format!("results for {query}"))
///     }));
/// ```
#[derive(Clone, Debug)]
pub struct RetryLayer {
    retry: Retry,
}

impl RetryLayer {
    pub fn new(retry: Retry) -> Self {
        Self { retry }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RetryService {
            inner: service,
            retry: self.retry.clone(),
        }
    }
}

/// A service whose calls are retried.
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    inner: S,
    retry: Retry,
}

impl<S, Req> Service<Req> for RetryService<S>
where
    S: Service<Req, Error = StructuredError> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = StructuredError;
    type Future = BoxFuture<'static, Result<S::Response, StructuredError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let retry = self.retry.clone();

        Box::pin(async move {
            retry
                .run(move || {
                    let service = inner.clone();
                    let req = req.clone();
                    async move { service.oneshot(req).await }
                })
                .await
        })
    }
}
