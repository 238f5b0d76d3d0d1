//! Structured message types produced by the wire parser.

use serde::{Deserialize, Serialize};

/// Field separator of the PSI wire encoding.
pub const MARKER: &str = ";%;";

/// Source identity used when a message carries no `identity:` field.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Discriminant of a [`ParsedMessage`], taken from the `multimodal:` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `multimodal:false` - an utterance to be spoken.
    Text,
    /// `multimodal:true` - a 3D position to look at.
    Spatial,
}

/// Position reported by the perception side, in the room's length units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    pub source_identity: String,
    /// Everything after `text:` up to end of input, verbatim.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMessage {
    pub source_identity: String,
    /// Optional `text:` payload; empty when absent.
    pub body: String,
    pub position: Position,
}

/// A decoded inbound message. The variant decides which fields exist, so a
/// position can only be read from a spatial message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedMessage {
    Text(TextMessage),
    Spatial(SpatialMessage),
}

impl ParsedMessage {
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::Spatial(_) => MessageKind::Spatial,
        }
    }

    pub fn source_identity(&self) -> &str {
        match self {
            Self::Text(m) => &m.source_identity,
            Self::Spatial(m) => &m.source_identity,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text(m) => &m.body,
            Self::Spatial(m) => &m.body,
        }
    }

    pub const fn position(&self) -> Option<Position> {
        match self {
            Self::Text(_) => None,
            Self::Spatial(m) => Some(m.position),
        }
    }
}

/// Horizontal/vertical orientation pair plus the fixed gaze distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookAngles {
    /// Degrees, positive to the right.
    pub horizontal: f64,
    /// Degrees, positive upwards from the calibration height.
    pub vertical: f64,
    pub distance: f64,
}

/// Text ready for the transport, addressed to one animated character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub target_actor: String,
    pub encoded_text: String,
}
