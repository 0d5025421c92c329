//! Configuration for the fallback combinator.

use crate::{Fallback, FallbackEvent, HandlePredicate};
use callguard_core::{EventListeners, EventSink, FnListener, StructuredError};
use std::sync::Arc;

/// Configuration for a [`Fallback`].
pub struct FallbackConfig {
    pub(crate) name: String,
    pub(crate) handle_predicate: Option<HandlePredicate>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl FallbackConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `error` should be replaced by the fallback.
    pub fn handles(&self, error: &StructuredError) -> bool {
        self.handle_predicate
            .as_ref()
            .map(|p| p(error))
            .unwrap_or(true)
    }
}

/// Builder for constructing a [`Fallback`].
pub struct FallbackConfigBuilder {
    name: String,
    handle_predicate: Option<HandlePredicate>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl Default for FallbackConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: "fallback".to_string(),
            handle_predicate: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name for this fallback instance (used in metrics and events).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Only trigger fallback for errors matching this predicate.
    ///
    /// Errors that don't match the predicate will be propagated as-is.
    pub fn handle<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StructuredError) -> bool + Send + Sync + 'static,
    {
        self.handle_predicate = Some(Arc::new(predicate));
        self
    }

    /// Adds an event listener.
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FallbackEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Called with the name of the strategy whenever the fallback answers.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Applied { strategy, .. } = event {
                f(strategy);
            }
        }));
        self
    }

    /// Reports every event, suppressed errors included, to `sink`.
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        self.event_listeners.add_sink(sink);
        self
    }

    /// Builds the fallback.
    pub fn build(self) -> Fallback {
        Fallback::from_config(FallbackConfig {
            name: self.name,
            handle_predicate: self.handle_predicate,
            event_listeners: self.event_listeners,
        })
    }
}
