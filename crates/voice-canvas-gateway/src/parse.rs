//! Decoding of model replies.
//!
//! Models are asked for bare JSON but often wrap it in a markdown fence or
//! surround it with prose, so decoding is forgiving about the envelope and
//! strict about the command inside.

use serde::Deserialize;
use serde_json::{Map, Value};
use voice_canvas_core::{Command, Translation};

/// Reply does not contain a usable translation.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Could not parse model response")]
    NoJson,
    #[error("Model response is missing `command`")]
    MissingCommand,
    #[error("Invalid command in model response: {0}")]
    Command(#[from] voice_canvas_core::CommandDecodeError),
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    #[serde(default)]
    command: Option<Map<String, Value>>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Remove markdown code fences around a reply.
#[must_use]
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Outermost `{...}` span of `text`.
#[must_use]
pub fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn decode_json(text: &str) -> Option<Value> {
    let cleaned = strip_fences(text);
    serde_json::from_str(cleaned)
        .ok()
        .or_else(|| serde_json::from_str(outermost_object(cleaned)?).ok())
}

/// Decode a translation reply.
///
/// A missing or empty `rawText` is filled with `raw_text`; a missing
/// `timestamp` is stamped when the command is decoded. Confidence is clamped
/// to `0.0..=1.0`, with a missing or non-finite value read as `0.0`.
///
/// # Errors
/// Returns error if no JSON object can be recovered or the command is invalid.
pub fn parse_translation(text: &str, raw_text: Option<&str>) -> Result<Translation, ParseError> {
    let value = decode_json(text).ok_or(ParseError::NoJson)?;
    let reply: ModelReply = serde_json::from_value(value).map_err(|_| ParseError::NoJson)?;
    let mut command = reply.command.ok_or(ParseError::MissingCommand)?;

    if let Some(raw_text) = raw_text {
        let has_raw = command
            .get("rawText")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !has_raw {
            command.insert("rawText".into(), Value::String(raw_text.to_owned()));
        }
    }

    let command = Command::from_value(Value::Object(command))?;
    let confidence = reply
        .confidence
        .filter(|c| c.is_finite())
        .map_or(0.0, |c| c.clamp(0.0, 1.0));

    Ok(Translation {
        command,
        confidence,
        explanation: reply.explanation,
    })
}

/// Decode a suggestions reply into a list of strings.
///
/// Non-string entries are skipped.
#[must_use]
pub fn parse_suggestions(text: &str) -> Option<Vec<String>> {
    let cleaned = strip_fences(text);
    let value: Value = serde_json::from_str(cleaned).ok().or_else(|| {
        let start = cleaned.find('[')?;
        let end = cleaned.rfind(']')?;
        serde_json::from_str(cleaned.get(start..=end)?).ok()
    })?;

    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
    )
}
