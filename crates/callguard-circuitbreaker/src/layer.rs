use crate::CircuitBreaker;
use callguard_core::StructuredError;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower Layer that puts an existing [`CircuitBreaker`] in front of a
/// service.
///
/// Every service produced by the layer shares the breaker's state, so one
/// layer can protect several clones of the same client.
///
/// ```rust
/// use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer};
/// use callguard_core::StructuredError;
/// use tower::{ServiceBuilder, service_fn};
///
/// let breaker = CircuitBreaker::builder().name("inventory").build().unwrap();
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker.clone()))
///     .service(service_fn(|sku: String| async move {
///         Ok::<_, StructuredError>(format!("{sku}: 12 in stock"))
///     }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
        }
    }
}

/// A service protected by a [`CircuitBreaker`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req, Error = StructuredError> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = StructuredError;
    type Future = BoxFuture<'static, Result<S::Response, StructuredError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The readied service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let breaker = self.breaker.clone();

        Box::pin(async move { breaker.execute(move || inner.call(req)).await })
    }
}
