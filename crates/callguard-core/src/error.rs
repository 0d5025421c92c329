//! Structured errors with kind-specific attributes and cause chains.
//!
//! [`StructuredError`] is the single error type that flows through every
//! callguard pattern. Rather than a hierarchy of error types, it carries an
//! [`ErrorKind`] tag with the attributes that belong to that kind, a message,
//! a creation timestamp, a `retryable` flag fixed at construction, and an
//! optional cause.
//!
//! # Building a chain
//!
//! ```rust
//! use callguard_core::{ErrorKind, StructuredError};
//!
//! let db = StructuredError::database(
//!     "Connection timeout",
//!     "SELECT * FROM users WHERE id = 123",
//!     "CONN_TIMEOUT",
//! );
//! assert!(db.is_retryable());
//!
//! let api = StructuredError::service("Failed to fetch user data", "getUserById")
//!     .with_cause(db)
//!     .wrap(
//!         ErrorKind::Api { endpoint: "/api/users/123".into(), status_code: 500 },
//!         "Internal server error while processing request",
//!     );
//!
//! let kinds: Vec<_> = api.chain().map(|link| link.kind_name()).collect();
//! assert_eq!(kinds, ["APIError", "ServiceError", "DatabaseError"]);
//! ```
//!
//! # Serialization
//!
//! [`StructuredError::to_map`] produces a plain JSON object with `kind`,
//! `message`, `timestamp`, `retryable`, every kind-specific attribute, and the
//! cause nested under `cause`. Foreign (non-structured) causes serialize with
//! `kind = "GenericError"`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Database error codes that indicate a transient condition.
pub const TRANSIENT_DATABASE_CODES: &[&str] = &["CONN_TIMEOUT", "DEADLOCK"];

/// Attributes a wrapper takes over from the error it wraps.
const INHERITED_KEYS: &[&str] = &["statusCode", "code"];

/// The kind of a [`StructuredError`], with the attributes specific to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input.
    Validation {
        /// The offending field.
        field: String,
    },
    /// Authentication or authorization failure.
    Auth {
        /// The user the failure relates to.
        user_id: String,
        /// Status code to report (401 unless told otherwise).
        code: u16,
    },
    /// Database operation failure.
    Database {
        /// The query that failed.
        query: String,
        /// Driver or server error code.
        error_code: String,
    },
    /// Business-logic failure.
    Service {
        /// The service operation that failed.
        operation: String,
    },
    /// Failure at an HTTP endpoint.
    Api {
        /// The endpoint path.
        endpoint: String,
        /// The HTTP status code to report.
        status_code: u16,
    },
    /// A circuit breaker rejected the call without invoking the operation.
    CircuitOpen {
        /// Name of the breaker that rejected the call.
        name: String,
    },
    /// The call was cancelled or ran past its deadline.
    Cancelled,
    /// A retry executor gave up.
    RetryExhausted {
        /// Attempts made, including the first.
        attempts: usize,
    },
    /// Anything else.
    Generic,
}

impl ErrorKind {
    /// The kind tag as it appears in serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation { .. } => "ValidationError",
            ErrorKind::Auth { .. } => "AuthError",
            ErrorKind::Database { .. } => "DatabaseError",
            ErrorKind::Service { .. } => "ServiceError",
            ErrorKind::Api { .. } => "APIError",
            ErrorKind::CircuitOpen { .. } => "CircuitOpenError",
            ErrorKind::Cancelled => "CancelledError",
            ErrorKind::RetryExhausted { .. } => "RetryExhaustedError",
            ErrorKind::Generic => "GenericError",
        }
    }

    /// Whether errors of this kind can never be retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::CircuitOpen { .. } | ErrorKind::Cancelled | ErrorKind::RetryExhausted { .. }
        )
    }

    /// The `retryable` value an error of this kind gets unless overridden.
    ///
    /// Database errors are retryable only for codes in
    /// [`TRANSIENT_DATABASE_CODES`]; terminal kinds never are.
    pub fn default_retryable(&self) -> bool {
        match self {
            ErrorKind::Database { error_code, .. } => {
                TRANSIENT_DATABASE_CODES.contains(&error_code.as_str())
            }
            kind if kind.is_terminal() => false,
            _ => true,
        }
    }

    /// A status code carried by the kind itself, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ErrorKind::Api { status_code, .. } => Some(*status_code),
            ErrorKind::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }

    fn write_attributes(&self, map: &mut Map<String, Value>) {
        match self {
            ErrorKind::Validation { field } => {
                map.insert("field".into(), Value::from(field.as_str()));
            }
            ErrorKind::Auth { user_id, code } => {
                map.insert("userId".into(), Value::from(user_id.as_str()));
                map.insert("code".into(), Value::from(*code));
            }
            ErrorKind::Database { query, error_code } => {
                map.insert("query".into(), Value::from(query.as_str()));
                map.insert("errorCode".into(), Value::from(error_code.as_str()));
            }
            ErrorKind::Service { operation } => {
                map.insert("operation".into(), Value::from(operation.as_str()));
            }
            ErrorKind::Api {
                endpoint,
                status_code,
            } => {
                map.insert("endpoint".into(), Value::from(endpoint.as_str()));
                map.insert("statusCode".into(), Value::from(*status_code));
            }
            ErrorKind::CircuitOpen { name } => {
                map.insert("name".into(), Value::from(name.as_str()));
            }
            ErrorKind::RetryExhausted { attempts } => {
                map.insert("attempts".into(), Value::from(*attempts));
            }
            ErrorKind::Cancelled | ErrorKind::Generic => {}
        }
    }
}

#[derive(Debug, Clone)]
enum Cause {
    Structured(Box<StructuredError>),
    Foreign(Arc<dyn StdError + Send + Sync + 'static>),
}

/// An error with a kind, attributes, a timestamp, a retryable flag and an
/// optional cause.
///
/// The `with_*` methods consume `self` and are meant for construction; once an
/// error has been handed to a caller it is never modified.
#[derive(Debug, Clone)]
pub struct StructuredError {
    kind: ErrorKind,
    message: String,
    attributes: BTreeMap<String, Value>,
    timestamp: DateTime<Utc>,
    retryable: bool,
    cause: Option<Cause>,
}

impl StructuredError {
    /// Creates an error of the given kind, timestamped now.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();
        Self {
            kind,
            message: message.into(),
            attributes: BTreeMap::new(),
            timestamp: Utc::now(),
            retryable,
            cause: None,
        }
    }

    /// A validation failure on `field`.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Validation {
                field: field.into(),
            },
            message,
        )
    }

    /// An authentication failure for `user_id`, reported with status 401.
    pub fn auth(message: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::auth_with_code(message, user_id, 401)
    }

    /// An authentication failure with an explicit status code.
    pub fn auth_with_code(
        message: impl Into<String>,
        user_id: impl Into<String>,
        code: u16,
    ) -> Self {
        Self::new(
            ErrorKind::Auth {
                user_id: user_id.into(),
                code,
            },
            message,
        )
    }

    /// A database failure. Retryable iff `error_code` is transient.
    pub fn database(
        message: impl Into<String>,
        query: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::Database {
                query: query.into(),
                error_code: error_code.into(),
            },
            message,
        )
    }

    /// A service-layer failure in `operation`.
    pub fn service(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Service {
                operation: operation.into(),
            },
            message,
        )
    }

    /// An API-layer failure at `endpoint`.
    pub fn api(message: impl Into<String>, endpoint: impl Into<String>, status_code: u16) -> Self {
        Self::new(
            ErrorKind::Api {
                endpoint: endpoint.into(),
                status_code,
            },
            message,
        )
    }

    /// Rejection by the circuit breaker called `name`.
    pub fn circuit_open(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = format!("Circuit breaker '{}' is open", name);
        Self::new(ErrorKind::CircuitOpen { name }, message)
    }

    /// A cancelled call.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// A generic failure.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// Sets a structured cause.
    pub fn with_cause(mut self, cause: StructuredError) -> Self {
        self.cause = Some(Cause::Structured(Box::new(cause)));
        self
    }

    /// Sets a foreign error as the cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Cause::Foreign(Arc::new(source)));
        self
    }

    /// Adds a free-form attribute. Reserved keys (`kind`, `message`,
    /// `timestamp`, `retryable`, `cause`) and kind-specific keys take
    /// precedence when serializing.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Overrides the retryable flag. Terminal kinds stay non-retryable.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable && !self.kind.is_terminal();
        self
    }

    /// Overrides the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Wraps `self` as the cause of a new error.
    ///
    /// The cause's `statusCode` and `code` attributes, when present, are
    /// copied onto the wrapper as free-form attributes.
    pub fn wrap(self, kind: ErrorKind, message: impl Into<String>) -> StructuredError {
        let mut wrapper = StructuredError::new(kind, message);
        let inherited = self.attributes();
        for key in INHERITED_KEYS {
            if let Some(value) = inherited.get(*key) {
                wrapper.attributes.insert((*key).to_string(), value.clone());
            }
        }
        wrapper.with_cause(self)
    }

    /// The kind tag and its attributes.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// When the error was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether a retry loop may try the operation again.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether this is a rejection by an open circuit breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self.kind, ErrorKind::CircuitOpen { .. })
    }

    /// Whether the operation was cancelled or ran past its deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Kind-specific attributes merged with free-form ones.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.kind.write_attributes(&mut map);
        map
    }

    /// A single attribute by key.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes().remove(key)
    }

    /// The structured cause, if the cause is structured.
    pub fn cause(&self) -> Option<&StructuredError> {
        match &self.cause {
            Some(Cause::Structured(inner)) => Some(inner),
            _ => None,
        }
    }

    /// Iterates the chain from this error to its innermost cause.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            next: Some(Link::Structured(self)),
        }
    }

    /// The innermost link of the chain.
    pub fn root_cause(&self) -> Link<'_> {
        self.chain().last().unwrap_or(Link::Structured(self))
    }

    /// The chain flattened to `(kind, message)` pairs, outermost first.
    pub fn flatten(&self) -> Vec<(&'static str, String)> {
        self.chain()
            .map(|link| (link.kind_name(), link.message()))
            .collect()
    }

    /// Serializes the whole chain to a plain mapping.
    pub fn to_map(&self) -> Map<String, Value> {
        link_map(Link::Structured(self))
    }

    /// Serializes the whole chain to a JSON value.
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// A `Display` adapter rendering the chain as an indented tree.
    pub fn report(&self) -> ChainReport<'_> {
        ChainReport { error: self }
    }

    fn own_map(&self) -> Map<String, Value> {
        let mut map = self.attributes();
        map.insert("kind".into(), Value::from(self.kind.name()));
        map.insert("message".into(), Value::from(self.message.as_str()));
        map.insert(
            "timestamp".into(),
            Value::from(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        map.insert("retryable".into(), Value::from(self.retryable));
        map
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for StructuredError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(Cause::Structured(inner)) => Some(&**inner),
            Some(Cause::Foreign(inner)) => Some(&**inner),
            None => None,
        }
    }
}

impl Serialize for StructuredError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// One link of an error chain.
#[derive(Debug, Clone, Copy)]
pub enum Link<'a> {
    /// A [`StructuredError`].
    Structured(&'a StructuredError),
    /// Any other error type.
    Foreign(&'a (dyn StdError + 'static)),
}

impl<'a> Link<'a> {
    /// The kind tag; foreign errors report `GenericError`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Link::Structured(e) => e.kind.name(),
            Link::Foreign(_) => ErrorKind::Generic.name(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Link::Structured(e) => e.message.clone(),
            Link::Foreign(e) => e.to_string(),
        }
    }

    pub fn as_structured(&self) -> Option<&'a StructuredError> {
        match self {
            Link::Structured(e) => Some(e),
            Link::Foreign(_) => None,
        }
    }

    fn attributes(&self) -> Map<String, Value> {
        match self {
            Link::Structured(e) => e.attributes(),
            Link::Foreign(_) => Map::new(),
        }
    }

    fn cause(&self) -> Option<Link<'a>> {
        match *self {
            Link::Structured(e) => match &e.cause {
                Some(Cause::Structured(inner)) => Some(Link::Structured(inner)),
                Some(Cause::Foreign(inner)) => {
                    let inner: &'a (dyn StdError + Send + Sync + 'static) = &**inner;
                    Some(Link::Foreign(inner))
                }
                None => None,
            },
            Link::Foreign(e) => e.source().map(Link::Foreign),
        }
    }
}

/// Iterator over an error chain, outermost first.
///
/// Created by [`StructuredError::chain`]. Cloning restarts from the clone
/// point without touching the original.
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<Link<'a>>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = Link<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.cause();
        Some(current)
    }
}

impl FusedIterator for Chain<'_> {}

fn link_map(link: Link<'_>) -> Map<String, Value> {
    let mut map = match link {
        Link::Structured(e) => e.own_map(),
        Link::Foreign(e) => {
            let mut map = Map::new();
            map.insert("kind".into(), Value::from(ErrorKind::Generic.name()));
            map.insert("message".into(), Value::from(e.to_string()));
            map
        }
    };
    if let Some(cause) = link.cause() {
        map.insert("cause".into(), Value::Object(link_map(cause)));
    }
    map
}

/// Indented rendering of an error chain. See [`StructuredError::report`].
pub struct ChainReport<'a> {
    error: &'a StructuredError,
}

impl fmt::Display for ChainReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, link) in self.error.chain().enumerate() {
            let indent = "  ".repeat(level);
            if level > 0 {
                writeln!(f, "{indent}↓ caused by:")?;
            }
            writeln!(f, "{indent}[{}] {}", link.kind_name(), link.message())?;
            for (key, value) in link.attributes() {
                match value {
                    Value::String(s) => writeln!(f, "{indent}  {key}: {s}")?,
                    other => writeln!(f, "{indent}  {key}: {other}")?,
                }
            }
        }
        Ok(())
    }
}
