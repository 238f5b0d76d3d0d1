//! Marker-delimited field parser for PSI messages.
//!
//! The line is split on `;%;` and each segment is matched against a field
//! prefix. Fields may appear in any order and are individually optional;
//! `text:` is greedy and swallows the rest of the input, markers included.
//! The first `multimodal:` segment may carry an arbitrary preamble such as
//! `message to Bazaar:`.

use tracing::trace;

use super::types::{
    MARKER, MessageKind, ParsedMessage, Position, SpatialMessage, TextMessage, UNKNOWN_IDENTITY,
};
use crate::error::ParseError;

const MULTIMODAL: &str = "multimodal:";
const IDENTITY: &str = "identity:";
const TEXT: &str = "text:";
const LOCATION: &str = "location:";

/// Raw field values located in one line, before any validation.
#[derive(Debug, Default, PartialEq, Eq)]
struct Fields<'a> {
    multimodal: Option<&'a str>,
    identity: Option<&'a str>,
    text: Option<&'a str>,
    location: Option<&'a str>,
}

fn tokenize(raw: &str) -> Fields<'_> {
    let mut fields = Fields::default();
    let mut rest = Some(raw);
    let mut first = true;

    while let Some(current) = rest {
        if let Some(body) = current.strip_prefix(TEXT) {
            fields.text.get_or_insert(body);
            break;
        }

        let (segment, tail) = match current.split_once(MARKER) {
            Some((segment, tail)) => (segment, Some(tail)),
            None => (current, None),
        };

        if let Some(value) = segment.strip_prefix(IDENTITY) {
            fields.identity.get_or_insert(value);
        } else if let Some(value) = segment.strip_prefix(LOCATION) {
            fields.location.get_or_insert(value);
        } else if let Some(value) = multimodal_value(segment, first) {
            fields.multimodal.get_or_insert(value);
        } else {
            trace!(segment, "Ignoring unrecognised segment");
        }

        rest = tail;
        first = false;
    }

    fields
}

/// Only the leading segment may prefix `multimodal:` with a preamble.
fn multimodal_value(segment: &str, first: bool) -> Option<&str> {
    if first {
        segment
            .find(MULTIMODAL)
            .and_then(|idx| segment.get(idx + MULTIMODAL.len()..))
    } else {
        segment.strip_prefix(MULTIMODAL)
    }
}

fn parse_kind(value: Option<&str>) -> Result<MessageKind, ParseError> {
    match value.map(str::trim) {
        Some("true") => Ok(MessageKind::Spatial),
        Some("false") => Ok(MessageKind::Text),
        other => Err(ParseError::UnknownKind(other.map(String::from))),
    }
}

/// Parse `x:y:z` into a position. Exactly three finite numbers are accepted.
pub fn parse_location(value: &str) -> Result<Position, ParseError> {
    let malformed = || ParseError::MalformedLocation(value.to_string());

    let coords = value
        .split(':')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(malformed)?;

    match coords.as_slice() {
        [x, y, z] => Ok(Position::new(*x, *y, *z)),
        _ => Err(malformed()),
    }
}

/// Parse a single PSI wire line into a structured message.
pub fn parse(raw: &str) -> Result<ParsedMessage, ParseError> {
    let fields = tokenize(raw);
    let kind = parse_kind(fields.multimodal)?;
    let source_identity = fields.identity.unwrap_or(UNKNOWN_IDENTITY).to_string();

    match kind {
        MessageKind::Text => {
            let body = fields
                .text
                .ok_or(ParseError::MissingRequiredField("text"))?;
            Ok(ParsedMessage::Text(TextMessage {
                source_identity,
                body: body.to_string(),
            }))
        }
        MessageKind::Spatial => {
            let location = fields
                .location
                .ok_or(ParseError::MissingRequiredField("location"))?;
            Ok(ParsedMessage::Spatial(SpatialMessage {
                source_identity,
                body: fields.text.unwrap_or_default().to_string(),
                position: parse_location(location)?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parse_text_message_with_preamble() {
        let msg =
            parse("message to Bazaar:multimodal:false;%;identity:Agent1;%;text:Hello there")
                .unwrap();
        assert_eq!(
            msg,
            ParsedMessage::Text(TextMessage {
                source_identity: "Agent1".into(),
                body: "Hello there".into(),
            })
        );
        assert_eq!(msg.position(), None);
    }

    #[test]
    fn parse_spatial_message() {
        let msg = parse("multimodal:true;%;identity:Agent1;%;location:1:1:11.89").unwrap();
        assert_eq!(msg.kind(), MessageKind::Spatial);
        assert_eq!(msg.source_identity(), "Agent1");
        assert_eq!(msg.position(), Some(Position::new(1.0, 1.0, 11.89)));
    }

    #[test]
    fn text_is_greedy_to_end_of_input() {
        let msg = parse("multimodal:false;%;text:a;%;identity:ignored;%;b").unwrap();
        assert_eq!(msg.body(), "a;%;identity:ignored;%;b");
        assert_eq!(msg.source_identity(), UNKNOWN_IDENTITY);
    }

    #[test]
    fn missing_identity_defaults_to_unknown() {
        let msg = parse("multimodal:false;%;text:hi").unwrap();
        assert_eq!(msg.source_identity(), "unknown");
    }

    #[test]
    fn fields_may_appear_in_any_order() {
        let msg = parse("multimodal:true;%;location:2:4:1;%;identity:Cam").unwrap();
        assert_eq!(msg.source_identity(), "Cam");
        assert_eq!(msg.position(), Some(Position::new(2.0, 4.0, 1.0)));
    }

    #[test]
    fn missing_multimodal_is_unknown_kind() {
        let err = parse("identity:Agent1;%;text:hi").unwrap_err();
        assert_eq!(err, ParseError::UnknownKind(None));
    }

    #[test]
    fn invalid_multimodal_value_is_unknown_kind() {
        let err = parse("multimodal:maybe;%;text:hi").unwrap_err();
        assert_eq!(err, ParseError::UnknownKind(Some("maybe".into())));
    }

    #[test]
    fn text_message_requires_text() {
        let err = parse("multimodal:false;%;identity:Agent1").unwrap_err();
        assert_eq!(err, ParseError::MissingRequiredField("text"));
    }

    #[test]
    fn spatial_message_requires_location() {
        let err = parse("multimodal:true;%;identity:Agent1;%;text:look").unwrap_err();
        assert_eq!(err, ParseError::MissingRequiredField("location"));
    }

    #[test]
    fn location_with_wrong_arity_is_malformed() {
        assert!(matches!(
            parse("multimodal:true;%;location:1:2"),
            Err(ParseError::MalformedLocation(_))
        ));
        assert!(matches!(
            parse("multimodal:true;%;location:1:2:3:4"),
            Err(ParseError::MalformedLocation(_))
        ));
    }

    #[test]
    fn location_with_non_numeric_component_is_malformed() {
        let err = parse("multimodal:true;%;location:1:north:3").unwrap_err();
        assert_eq!(err, ParseError::MalformedLocation("1:north:3".into()));
    }

    #[test]
    fn location_rejects_non_finite_numbers() {
        assert!(parse_location("NaN:1:1").is_err());
        assert!(parse_location("1:inf:1").is_err());
    }

    #[test]
    fn location_tolerates_surrounding_whitespace() {
        assert_eq!(
            parse_location(" 1 : -2.5 : 3\n").unwrap(),
            Position::new(1.0, -2.5, 3.0)
        );
    }

    #[test]
    fn preamble_only_allowed_on_first_segment() {
        let err = parse("identity:A;%;junk multimodal:false;%;text:hi").unwrap_err();
        assert_eq!(err, ParseError::UnknownKind(None));
    }

    #[test]
    fn spatial_message_keeps_optional_text() {
        let msg = parse("multimodal:true;%;location:1:2:3;%;text:over there").unwrap();
        assert_eq!(msg.body(), "over there");
    }
}
