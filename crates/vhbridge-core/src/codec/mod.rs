//! Wire codec for PSI → VHT traffic.
//!
//! Inbound lines use the PSI marker-delimited encoding
//! (`multimodal:false;%;identity:Agent1;%;text:Hello`); outbound text is
//! VHMsg (`vrExpress ...` speech acts and `sbm bml ...` gaze commands).
//!
//! There is no escaping for `;%;`: a marker inside an `identity:` or
//! `location:` value splits the field. Producers must emit `text:` last.

mod angles;
mod parser;
mod templates;
mod types;

pub use angles::{
    DEFAULT_CALIBRATION_OFFSET, DEFAULT_GAZE_DISTANCE, GazeGeometry, derive_look_angles,
};
pub use parser::{parse, parse_location};
pub use templates::{
    ActorProfile, ActorRegistry, gaze_command, new_utterance_id, serialize, speech_act,
};
pub use types::*;
