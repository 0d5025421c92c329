//! Logging side-channel.
//!
//! Patterns report what they observe through an [`EventSink`]. A sink that
//! fails never affects the outcome of the call being reported: its error is
//! traced and dropped.

use crate::error::StructuredError;
use crate::events::{EventListener, EventListeners, ResilienceEvent, Severity};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A flat, pattern-agnostic description of something worth reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Name of the pattern instance or component that produced the record.
    pub source: String,
    /// Event type or error kind.
    pub kind: String,
    pub message: String,
    pub attributes: BTreeMap<String, String>,
    pub severity: Severity,
}

impl EventRecord {
    pub fn new(
        source: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            source: source.into(),
            kind: kind.into(),
            message: message.into(),
            attributes: BTreeMap::new(),
            severity,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Describes a pattern event.
    pub fn from_event<E: ResilienceEvent + ?Sized>(event: &E) -> Self {
        Self {
            source: event.pattern_name().to_string(),
            kind: event.event_type().to_string(),
            message: event.message(),
            attributes: event.attributes(),
            severity: event.severity(),
        }
    }

    /// Describes an error, including a rendering of its full chain under the
    /// `chain` attribute.
    pub fn from_error(source: impl Into<String>, error: &StructuredError, severity: Severity) -> Self {
        let mut attributes: BTreeMap<String, String> = error
            .attributes()
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        attributes.insert("retryable".into(), error.is_retryable().to_string());
        let chain = error
            .chain()
            .map(|link| format!("{}: {}", link.kind_name(), link.message()))
            .collect::<Vec<_>>()
            .join(" <- ");
        attributes.insert("chain".into(), chain);

        Self {
            source: source.into(),
            kind: error.kind().name().to_string(),
            message: error.message().to_string(),
            attributes,
            severity,
        }
    }
}

/// Errors a sink may report. Callers never propagate these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for [`EventRecord`]s.
pub trait EventSink: Send + Sync {
    fn record(&self, record: &EventRecord) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn record(&self, record: &EventRecord) -> Result<(), SinkError> {
        (**self).record(record)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&self, record: &EventRecord) -> Result<(), SinkError> {
        (**self).record(record)
    }
}

/// Hands `record` to `sink`, dropping any failure.
pub fn deliver<S: EventSink + ?Sized>(sink: &S, record: &EventRecord) {
    if let Err(error) = sink.record(record) {
        tracing::trace!(%error, kind = %record.kind, source = %record.source, "event sink failed");
    }
}

/// Forwards records to `tracing` at the record's severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, r: &EventRecord) -> Result<(), SinkError> {
        match r.severity {
            Severity::Trace => {
                tracing::trace!(source = %r.source, kind = %r.kind, attributes = ?r.attributes, "{}", r.message)
            }
            Severity::Debug => {
                tracing::debug!(source = %r.source, kind = %r.kind, attributes = ?r.attributes, "{}", r.message)
            }
            Severity::Info => {
                tracing::info!(source = %r.source, kind = %r.kind, attributes = ?r.attributes, "{}", r.message)
            }
            Severity::Warn => {
                tracing::warn!(source = %r.source, kind = %r.kind, attributes = ?r.attributes, "{}", r.message)
            }
            Severity::Error => {
                tracing::error!(source = %r.source, kind = %r.kind, attributes = ?r.attributes, "{}", r.message)
            }
        }
        Ok(())
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Records whose kind equals `kind`.
    pub fn records_of(&self, kind: &str) -> Vec<EventRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: &EventRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Adapts an [`EventSink`] into an [`EventListener`] for any event type.
pub struct SinkListener<S> {
    sink: S,
}

impl<S: EventSink> SinkListener<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<E, S> EventListener<E> for SinkListener<S>
where
    E: ResilienceEvent,
    S: EventSink,
{
    fn on_event(&self, event: &E) {
        deliver(&self.sink, &EventRecord::from_event(event));
    }
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Registers `sink` to receive every event as an [`EventRecord`].
    pub fn add_sink<S>(&mut self, sink: S)
    where
        S: EventSink + 'static,
    {
        self.add(SinkListener::new(sink));
    }
}
