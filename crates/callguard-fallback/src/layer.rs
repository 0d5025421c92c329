//! Tower layer for fallback.

use crate::Fallback;
use callguard_core::StructuredError;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::layer::Layer;
use tower::Service;

/// Function that computes a fallback response from an error.
pub type FromErrorFn<Res> = Arc<dyn Fn(&StructuredError) -> Res + Send + Sync>;

/// Function that calls a backup service asynchronously.
pub type ServiceFn<Req, Res> =
    Arc<dyn Fn(Req) -> BoxFuture<'static, Result<Res, StructuredError>> + Send + Sync>;

/// The strategy a [`FallbackService`] uses to produce a response.
pub enum FallbackStrategy<Req, Res> {
    /// Return a static value (cloned for each fallback).
    Value(Res),

    /// Compute a response from the error.
    FromError(FromErrorFn<Res>),

    /// Call a backup service with a copy of the request.
    Service(ServiceFn<Req, Res>),
}

impl<Req, Res> FallbackStrategy<Req, Res> {
    fn name(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::FromError(_) => "from_error",
            Self::Service(_) => "service",
        }
    }
}

/// A Tower layer that applies a [`Fallback`] to a service.
///
/// ```rust
/// use callguard_core::StructuredError;
/// use callguard_fallback::FallbackLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(FallbackLayer::<String, String>::value("unavailable".to_string()))
///     .service(tower::service_fn(|req: String| async move {
///         Ok::<_, StructuredError>(req)
///     }));
/// ```
pub struct FallbackLayer<Req, Res> {
    fallback: Fallback,
    strategy: Arc<FallbackStrategy<Req, Res>>,
}

impl<Req, Res> FallbackLayer<Req, Res> {
    /// Creates a layer answering failures of the inner service with `strategy`.
    pub fn new(fallback: Fallback, strategy: FallbackStrategy<Req, Res>) -> Self {
        Self {
            fallback,
            strategy: Arc::new(strategy),
        }
    }

    /// Returns a static value on failure.
    pub fn value(value: Res) -> Self {
        Self::new(Fallback::builder().build(), FallbackStrategy::Value(value))
    }

    /// Computes a response from the error.
    pub fn from_error<F>(f: F) -> Self
    where
        F: Fn(&StructuredError) -> Res + Send + Sync + 'static,
    {
        Self::new(
            Fallback::builder().build(),
            FallbackStrategy::FromError(Arc::new(f)),
        )
    }

    /// Routes the request to a backup service on failure.
    pub fn service<F, Fut>(f: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Res, StructuredError>> + Send + 'static,
    {
        Self::new(
            Fallback::builder().build(),
            FallbackStrategy::Service(Arc::new(move |req| Box::pin(f(req)))),
        )
    }
}

impl<Req, Res> Clone for FallbackLayer<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            fallback: self.fallback.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<S, Req, Res> Layer<S> for FallbackLayer<Req, Res> {
    type Service = FallbackService<S, Req, Res>;

    fn layer(&self, service: S) -> Self::Service {
        FallbackService {
            inner: service,
            fallback: self.fallback.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

/// A Tower service that provides fallback responses when the inner service fails.
pub struct FallbackService<S, Req, Res> {
    inner: S,
    fallback: Fallback,
    strategy: Arc<FallbackStrategy<Req, Res>>,
}

impl<S: Clone, Req, Res> Clone for FallbackService<S, Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fallback: self.fallback.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl<S, Req, Res> Service<Req> for FallbackService<S, Req, Res>
where
    S: Service<Req, Response = Res, Error = StructuredError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + Sync + 'static,
    Res: Clone + Send + Sync + 'static,
{
    type Response = Res;
    type Error = StructuredError;
    type Future = BoxFuture<'static, Result<Res, StructuredError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let fallback = self.fallback.clone();
        let strategy = Arc::clone(&self.strategy);
        let req_clone = req.clone();

        Box::pin(async move {
            let primary = inner.call(req);
            fallback
                .apply(primary, strategy.name(), move |error| async move {
                    match &*strategy {
                        FallbackStrategy::Value(v) => Ok(v.clone()),
                        FallbackStrategy::FromError(f) => Ok(f(&error)),
                        FallbackStrategy::Service(backup) => backup(req_clone).await,
                    }
                })
                .await
        })
    }
}
