//! Resilient calls for async operations that can fail.
//!
//! `callguard` wraps fallible operations returning
//! [`StructuredError`](crate::core::StructuredError) with a retry executor, a
//! circuit breaker and a fallback. Each pattern is available as both an
//! individual crate and as a feature in this meta-crate.
//!
//! # Patterns
//!
//! - **Circuit Breaker** (`circuitbreaker` feature): stops calling a resource
//!   after consecutive failures, probing it again after a cool-down
//! - **Retry** (`retry` feature): retries retryable failures with exponential
//!   backoff
//! - **Fallback** (`fallback` feature): answers with an alternative when the
//!   primary operation fails
//!
//! With all three enabled (`full`), [`ResilientCall`] composes them:
//! fallback outermost, then retry, then the breaker around each attempt.
//!
//! Always available:
//!
//! - [`boundary`]: the outermost error handler, mapping errors to responses
//! - [`batch`]: log-and-continue processing of many items
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! callguard = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "full")]
//! # {
//! use callguard::circuitbreaker::CircuitBreaker;
//! use callguard::core::StructuredError;
//! use callguard::retry::{Retry, RetryPolicy};
//! use callguard::ResilientCall;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let call = ResilientCall::builder()
//!     .breaker(CircuitBreaker::new("inventory", 3, Duration::from_secs(5))?)
//!     .retry(Retry::new(RetryPolicy::new(3, Duration::from_millis(100), 2.0)?))
//!     .build();
//!
//! let stock = call
//!     .call_or(|| async { Ok::<_, StructuredError>(42) }, 0)
//!     .await?;
//! # Ok(())
//! # }
//! # }
//! ```

// Re-export core (always available)
pub use callguard_core as core;

// Re-export patterns based on features
#[cfg(feature = "circuitbreaker")]
pub use callguard_circuitbreaker as circuitbreaker;

#[cfg(feature = "fallback")]
pub use callguard_fallback as fallback;

#[cfg(feature = "retry")]
pub use callguard_retry as retry;

pub mod batch;
pub mod boundary;

#[cfg(feature = "full")]
mod composition;

#[cfg(feature = "full")]
pub use composition::{ResilientCall, ResilientCallBuilder};
