//! Outbound VHMsg templates and the actor registry that selects them.
//!
//! Two shapes exist: a `vrExpress` speech act that carries the text body
//! verbatim inside an SSML `<speech>` element, and an `sbm bml` gaze command
//! that carries the computed look angles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::angles::{GazeGeometry, derive_look_angles};
use super::types::{LookAngles, ParsedMessage};
use crate::error::{ParseError, Result};

/// Per-character template parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    /// Character name as known to the animation runtime.
    pub name: String,
    /// Voice reference attached to the `<speech>` element, if the character
    /// uses a dedicated TTS voice.
    #[serde(default)]
    pub voice_ref: Option<String>,
}

impl ActorProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice_ref: None,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice_ref: impl Into<String>) -> Self {
        self.voice_ref = Some(voice_ref.into());
        self
    }
}

/// Characters the bridge knows how to address. Lookups are exact; an
/// unknown name is an error, never a fallback to some default character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorRegistry {
    actors: Vec<ActorProfile>,
}

impl ActorRegistry {
    pub const fn new(actors: Vec<ActorProfile>) -> Self {
        Self { actors }
    }

    pub fn get(&self, name: &str) -> Option<&ActorProfile> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a profile by name.
    pub fn insert(&mut self, profile: ActorProfile) {
        match self.actors.iter_mut().find(|a| a.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.actors.push(profile),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actors.iter().map(|a| a.name.as_str())
    }

    pub fn resolve(&self, name: &str) -> std::result::Result<&ActorProfile, ParseError> {
        self.get(name)
            .ok_or_else(|| ParseError::UnknownTarget(name.to_string()))
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new(vec![
            ActorProfile::new("Brad"),
            ActorProfile::new("Rachel").with_voice("rachel_ownvoiceTTS"),
        ])
    }
}

/// Fresh utterance id for a speech act.
pub fn new_utterance_id() -> String {
    format!("user-{}", Uuid::new_v4().simple())
}

/// Build a `vrExpress` speech act. `body` is embedded as-is.
pub fn speech_act(actor: &ActorProfile, utterance_id: &str, body: &str) -> String {
    let name = &actor.name;
    let voice = actor
        .voice_ref
        .as_deref()
        .map(|r| format!(" ref=\"{r}\""))
        .unwrap_or_default();

    format!(
        "vrExpress {name} User {utterance_id} \
         <?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\" ?>\n\
         <act>\n\
         <participant id=\"{name}\" role=\"actor\" />\n\
         <fml>\n\
         <turn start=\"take\" end=\"give\" />\n\
         <affect type=\"neutral\" target=\"addressee\"></affect>\n\
         <culture type=\"neutral\"></culture>\n\
         <personality type=\"neutral\"></personality>\n\
         </fml>\n\
         <bml>\n\
         <speech id=\"sp1\"{voice} type=\"application/ssml+xml\">\n\
         {body}</speech>\n\
         </bml>\n\
         </act>\n"
    )
}

/// Build an `sbm bml` gaze command aimed at the given angles.
pub fn gaze_command(actor: &ActorProfile, angles: &LookAngles) -> String {
    format!(
        "sbm bml char {} <gaze sbm:target-pos=\"{} {} {}\" sbm:joint-range=\"EYES NECK CHEST\"/>",
        actor.name, angles.horizontal, angles.vertical, angles.distance
    )
}

/// Serialize a parsed message into the wire text for `target`.
///
/// The template is chosen by `(target, kind)`: text messages become speech
/// acts, spatial messages become gaze commands. The only non-translation
/// failure is [`ParseError::UnknownTarget`].
pub fn serialize(
    registry: &ActorRegistry,
    target: &str,
    parsed: &ParsedMessage,
    geometry: &GazeGeometry,
) -> Result<String> {
    let actor = registry.resolve(target)?;
    match parsed {
        ParsedMessage::Text(msg) => Ok(speech_act(actor, &new_utterance_id(), &msg.body)),
        ParsedMessage::Spatial(msg) => {
            let angles = derive_look_angles(msg.position, geometry)?;
            Ok(gaze_command(actor, &angles))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::codec::parse;
    use crate::error::{Error, TranslateError};

    #[test]
    fn text_round_trips_verbatim() {
        let registry = ActorRegistry::default();
        for body in [
            "Hello there",
            "<prosody rate=\"slow\">Take your time.</prosody>",
            "semicolons; colons: and ;%; markers",
            "",
        ] {
            let line = format!("multimodal:false;%;identity:Agent1;%;text:{body}");
            let parsed = parse(&line).unwrap();
            let wire = serialize(&registry, "Brad", &parsed, &GazeGeometry::default()).unwrap();
            assert!(wire.contains(&format!(">\n{body}</speech>")));
        }
    }

    #[test]
    fn speech_act_carries_voice_reference() {
        let registry = ActorRegistry::default();
        let rachel = registry.get("Rachel").unwrap();
        let wire = speech_act(rachel, "u1", "Hi");
        assert!(wire.starts_with("vrExpress Rachel User u1 "));
        assert!(wire.contains("<participant id=\"Rachel\" role=\"actor\" />"));
        assert!(wire.contains(
            "<speech id=\"sp1\" ref=\"rachel_ownvoiceTTS\" type=\"application/ssml+xml\">"
        ));

        let brad = registry.get("Brad").unwrap();
        let wire = speech_act(brad, "u2", "Hi");
        assert!(wire.contains("<speech id=\"sp1\" type=\"application/ssml+xml\">"));
    }

    #[test]
    fn gaze_command_embeds_angles() {
        let actor = ActorProfile::new("Brad");
        let angles = LookAngles {
            horizontal: 45.0,
            vertical: -12.5,
            distance: 55.0,
        };
        assert_eq!(
            gaze_command(&actor, &angles),
            "sbm bml char Brad <gaze sbm:target-pos=\"45 -12.5 55\" sbm:joint-range=\"EYES NECK CHEST\"/>"
        );
    }

    #[test]
    fn unknown_target_is_rejected() {
        let parsed = parse("multimodal:false;%;text:hi").unwrap();
        let err = serialize(
            &ActorRegistry::default(),
            "Nobody",
            &parsed,
            &GazeGeometry::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError::UnknownTarget(ref name)) if name == "Nobody"
        ));
    }

    #[test]
    fn spatial_with_zero_y_fails_serialization() {
        let parsed = parse("multimodal:true;%;location:1:0:3").unwrap();
        let err = serialize(
            &ActorRegistry::default(),
            "Brad",
            &parsed,
            &GazeGeometry::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Translate(TranslateError::UndefinedAngle)
        ));
    }

    #[test]
    fn registry_insert_replaces_by_name() {
        let mut registry = ActorRegistry::default();
        registry.insert(ActorProfile::new("Brad").with_voice("brad_tts"));
        registry.insert(ActorProfile::new("Utah"));
        assert_eq!(
            registry.get("Brad").unwrap().voice_ref.as_deref(),
            Some("brad_tts")
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), ["Brad", "Rachel", "Utah"]);
    }
}
