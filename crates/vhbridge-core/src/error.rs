//! Error types for the bridge core library.

use thiserror::Error;

/// Result type alias using the bridge [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by subscriber handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Failures while decoding an inbound wire line or choosing an outbound template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// `multimodal:` marker missing or carrying something other than `true`/`false`.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(Option<String>),

    /// `location:` value is not exactly three numeric components.
    #[error("malformed location: {0:?}")]
    MalformedLocation(String),

    /// A field the message kind requires is absent.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// No template exists for the requested actor.
    #[error("unknown target actor: {0}")]
    UnknownTarget(String),
}

/// Failures while building an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Horizontal look angle needs `x / y`; `y == 0` has no defined angle.
    #[error("look angle undefined for position with y == 0")]
    UndefinedAngle,

    #[error("unknown target actor: {0}")]
    UnknownTarget(String),
}

/// Per-subscriber failure collected during a fan-out.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("subscriber {subscriber} failed on topic {topic}: {cause}")]
    HandlerFailed {
        topic: String,
        subscriber: String,
        #[source]
        cause: HandlerError,
    },
}

/// Errors raised by a transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is gone; nothing more can be sent.
    #[error("transport closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Core error type wrapping every stage failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// One or more subscribers failed during a single publish.
    #[error("{} subscriber(s) failed on topic {topic}", failures.len())]
    Route {
        topic: String,
        failures: Vec<RouteError>,
    },

    /// A bounded wait for a reply expired.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
