//! The `{message, steps}` reply contract and its parser.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::AiError;

/// Where the tooltip sits relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    #[serde(other)]
    Auto,
}

/// A step as proposed by the AI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiStep {
    /// Feature id the step points at.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Ignored when the feature is known: the registry owns selectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl AiStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            selector: None,
            position: None,
        }
    }
}

/// A parsed AI reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiReply {
    pub message: String,
    pub steps: Vec<AiStep>,
}

/// Parse raw provider output into an `AiReply`.
///
/// Accepts an optional markdown code fence around the JSON. Anything that is
/// not an object with a string `message` and an array `steps` is a
/// `ResponseFormat` error; the raw payload is logged, never shown.
pub fn parse_response(raw: &str) -> Result<AiReply, AiError> {
    let body = strip_code_fence(raw);

    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, raw = raw, "AI response is not valid JSON");
        AiError::unreadable()
    })?;

    let has_message = value.get("message").is_some_and(Value::is_string);
    let has_steps = value.get("steps").is_some_and(Value::is_array);
    if !has_message || !has_steps {
        warn!(
            has_message,
            has_steps,
            raw = raw,
            "AI response is missing required fields"
        );
        return Err(AiError::unreadable());
    }

    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, raw = raw, "AI response steps are malformed");
        AiError::unreadable()
    })
}

/// Strip a ```` ``` ```` or ```` ```json ```` fence if the whole reply is
/// wrapped in one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UNREADABLE_RESPONSE;

    #[test]
    fn parses_plain_json() {
        let reply = parse_response(
            r#"{"message": "Here you go", "steps": [
                {"id": "export", "title": "Click export", "text": "Click the button to export.", "position": "bottom"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(reply.message, "Here you go");
        assert_eq!(reply.steps.len(), 1);
        assert_eq!(reply.steps[0].position, Some(Position::Bottom));
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"message\": \"hi\", \"steps\": []}\n```";
        assert_eq!(parse_response(raw).unwrap().message, "hi");

        let bare = "```\n{\"message\": \"hi\", \"steps\": []}\n```";
        assert!(parse_response(bare).unwrap().steps.is_empty());
    }

    #[test]
    fn missing_steps_is_format_error() {
        let err = parse_response(r#"{"message": "no steps here"}"#).unwrap_err();
        assert!(matches!(err, AiError::ResponseFormat(ref m) if m == UNREADABLE_RESPONSE));
    }

    #[test]
    fn wrong_types_are_format_errors() {
        assert!(parse_response(r#"{"message": 3, "steps": []}"#).is_err());
        assert!(parse_response(r#"{"message": "x", "steps": "none"}"#).is_err());
        assert!(parse_response("I could not find that feature").is_err());
        assert!(parse_response(r#"{"message": "x", "steps": [{"title": "no id"}]}"#).is_err());
    }

    #[test]
    fn unknown_position_falls_back_to_auto() {
        let reply =
            parse_response(r#"{"message": "", "steps": [{"id": "a", "position": "center"}]}"#)
                .unwrap();
        assert_eq!(reply.steps[0].position, Some(Position::Auto));
    }
}
