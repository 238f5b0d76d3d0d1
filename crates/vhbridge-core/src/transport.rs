//! Transport collaborator seam.
//!
//! The bridge does not own a connection. Whatever carries the bytes pushes
//! [`RawMessage`]s into a queue from its own callback thread and accepts
//! outbound text through [`Transport::send`]. One transport instance is
//! constructed by the process and shared by reference with every component
//! that needs to send.

use crate::error::TransportError;
use crate::router::Payload;

/// A payload as it arrived, tagged with its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Payload,
}

impl RawMessage {
    pub fn text(topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: Payload::Text(text.into()),
        }
    }

    pub fn binary(topic: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload: Payload::Binary(bytes),
        }
    }

    /// Text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

/// Outbound half of the transport.
pub trait Transport: Send + Sync {
    /// Hand one message to the transport. An error is terminal for this
    /// message only; the bridge never retries.
    fn send(&self, text: &str) -> Result<(), TransportError>;
}

/// In-memory transport that records everything sent through it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: std::sync::Mutex<Vec<String>>,
    closed: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Make every further `send` fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Transport for MemoryTransport {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}
