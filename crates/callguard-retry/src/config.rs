use crate::events::RetryEvent;
use crate::policy::RetryPolicy;
use crate::Retry;
use callguard_core::events::{EventListeners, FnListener};
use callguard_core::EventSink;
use std::time::Duration;

/// Everything a [`Retry`] executor needs besides the operation.
pub struct RetryConfig {
    pub(crate) policy: RetryPolicy,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryConfig {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a named [`Retry`] executor with event callbacks.
pub struct RetryConfigBuilder {
    policy: RetryPolicy,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl RetryConfigBuilder {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Give this executor a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Called before each wait with the failed attempt number and the delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Called with the number of attempts it took to succeed.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Called with the number of attempts made when every one of them failed.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Called when an error is propagated without retrying.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Sends every event to `sink` as an [`EventRecord`](callguard_core::EventRecord).
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        self.event_listeners.add_sink(sink);
        self
    }

    pub fn build(self) -> Retry {
        Retry::from_config(RetryConfig {
            policy: self.policy,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}
