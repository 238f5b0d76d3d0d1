//! Parsed PSI message → actor-specific VHMsg text.

use crate::codec::{self, ActorRegistry, GazeGeometry, OutboundMessage, ParsedMessage};
use crate::config::Config;
use crate::error::{Error, TranslateError};

/// Builds outbound messages. Pure: returns text for the caller to send.
#[derive(Debug, Clone)]
pub struct Translator {
    actors: ActorRegistry,
    geometry: GazeGeometry,
}

impl Translator {
    pub const fn new(actors: ActorRegistry, geometry: GazeGeometry) -> Self {
        Self { actors, geometry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.actors.clone(), config.gaze)
    }

    pub const fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    pub const fn geometry(&self) -> &GazeGeometry {
        &self.geometry
    }

    /// Text messages become a speech act carrying the body unchanged; spatial
    /// messages become a gaze command aimed at the derived look angles.
    pub fn translate(
        &self,
        parsed: &ParsedMessage,
        target_actor: &str,
    ) -> Result<OutboundMessage, TranslateError> {
        let encoded_text = codec::serialize(&self.actors, target_actor, parsed, &self.geometry)
            .map_err(|e| match e {
                Error::Translate(e) => e,
                _ => TranslateError::UnknownTarget(target_actor.to_string()),
            })?;

        Ok(OutboundMessage {
            target_actor: target_actor.to_string(),
            encoded_text,
        })
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(ActorRegistry::default(), GazeGeometry::default())
    }
}
