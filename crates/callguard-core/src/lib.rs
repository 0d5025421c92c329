//! Core infrastructure for callguard.
//!
//! This crate provides what every callguard pattern shares:
//! - [`StructuredError`], the error taxonomy with cause chains
//! - The event system and the [`EventSink`] logging side-channel
//! - An injectable [`Clock`]
//! - Cancellation and deadline helpers
//! - [`ConfigError`] for builder validation

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod sink;

pub use cancel::{cancellable, with_deadline};
pub use clock::{default_clock, Clock, ManualClock, SharedClock, TokioClock};
pub use config::ConfigError;
pub use error::{Chain, ChainReport, ErrorKind, Link, StructuredError, TRANSIENT_DATABASE_CODES};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent, Severity};
pub use sink::{deliver, EventRecord, EventSink, MemorySink, SinkError, SinkListener, TracingSink};
pub use tokio_util::sync::CancellationToken;
