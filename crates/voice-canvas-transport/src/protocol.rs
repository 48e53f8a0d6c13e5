//! Wire protocol for hub connections.
//!
//! Every frame is a JSON object with a `type` tag. Inbound frames with an
//! unrecognized `type` are not errors: [`ClientEnvelope::decode`] reports them
//! as [`Inbound::Unknown`] so the hub can drop them quietly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use voice_canvas_core::{Command, Translation};

/// Message shown to every connection on accept.
pub const CONNECTED_MESSAGE: &str = "Connected to voice canvas server";

/// Error text for a voice command without input.
pub const NO_INPUT_MESSAGE: &str = "No audio or text data provided";

/// Payload of a `voice-command` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceCommandData {
    /// Base64-encoded audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Document context object supplied by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl VoiceCommandData {
    /// Audio payload, if non-empty.
    #[must_use]
    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref().filter(|a| !a.is_empty())
    }

    /// Text payload, if it has any non-whitespace content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Render host's report on an executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub command: Command,
}

/// Message from a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    /// Instruction to translate and relay.
    VoiceCommand {
        #[serde(default)]
        data: VoiceCommandData,
    },
    /// Document state pushed by the render host.
    FileData {
        #[serde(default)]
        data: Value,
    },
    /// Result of an `execute-command`.
    CommandExecuted { data: ExecutionReport },
    /// Ping for keepalive.
    Ping,
}

impl ClientEnvelope {
    const KNOWN_TYPES: &'static [&'static str] =
        &["voice-command", "file-data", "command-executed", "ping"];

    /// Decode a text frame.
    ///
    /// # Errors
    /// Returns error if the frame is not JSON, or if a known type carries a
    /// malformed payload. JSON without a string `type` is [`Inbound::Unknown`].
    pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            other => {
                let kind = other.map(Value::to_string).unwrap_or_default();
                return Ok(Inbound::Unknown(kind));
            }
        };

        if !Self::KNOWN_TYPES.contains(&kind) {
            return Ok(Inbound::Unknown(kind.to_owned()));
        }

        Ok(Inbound::Known(serde_json::from_value(value)?))
    }

    /// Wire name of this envelope's type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VoiceCommand { .. } => "voice-command",
            Self::FileData { .. } => "file-data",
            Self::CommandExecuted { .. } => "command-executed",
            Self::Ping => "ping",
        }
    }
}

/// Result of decoding an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Known(ClientEnvelope),
    /// Well-formed frame with a type this hub does not handle. Empty when
    /// the frame has no `type`; the JSON text when it is not a string.
    Unknown(String),
}

/// Message from the hub to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEnvelope {
    /// Sent once on accept.
    Connected { message: String },
    /// Command for the render host.
    ExecuteCommand { data: Command },
    /// Translation result for the originating client.
    CommandProcessed { data: Translation },
    /// Render host's report, relayed to the originating client.
    CommandExecuted { data: ExecutionReport },
    /// Pong response.
    Pong,
    /// Error message.
    Error { error: String },
}

impl ServerEnvelope {
    #[must_use]
    pub fn connected() -> Self {
        Self::Connected {
            message: CONNECTED_MESSAGE.to_owned(),
        }
    }

    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

/// Protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_ping() {
        let inbound = ClientEnvelope::decode(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(inbound, Inbound::Known(ClientEnvelope::Ping));
    }

    #[test]
    fn test_decode_voice_command_without_data() {
        let inbound = ClientEnvelope::decode(r#"{"type":"voice-command"}"#).unwrap();
        let Inbound::Known(ClientEnvelope::VoiceCommand { data }) = inbound else {
            panic!("Wrong message type");
        };
        assert_eq!(data.audio(), None);
        assert_eq!(data.text(), None);
    }

    #[test]
    fn test_blank_text_is_absent() {
        let data = VoiceCommandData {
            text: Some("  ".into()),
            audio: Some(String::new()),
            context: None,
        };
        assert_eq!(data.text(), None);
        assert_eq!(data.audio(), None);
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let inbound = ClientEnvelope::decode(r#"{"type":"telemetry","data":1}"#).unwrap();
        assert_eq!(inbound, Inbound::Unknown("telemetry".into()));
    }

    #[test]
    fn test_untyped_frames_are_unknown() {
        assert_eq!(
            ClientEnvelope::decode(r#"{"data":{}}"#).unwrap(),
            Inbound::Unknown(String::new())
        );
        assert_eq!(
            ClientEnvelope::decode(r#"{"type":5}"#).unwrap(),
            Inbound::Unknown("5".into())
        );
        assert_eq!(
            ClientEnvelope::decode("[1, 2]").unwrap(),
            Inbound::Unknown(String::new())
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            ClientEnvelope::decode("{not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ClientEnvelope::decode(r#"{"type":"voice-command","data":{"text":5}}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_server_envelope_shapes() {
        assert_eq!(
            serde_json::to_value(ServerEnvelope::Pong).unwrap(),
            json!({"type": "pong"})
        );
        assert_eq!(
            serde_json::to_value(ServerEnvelope::error("boom")).unwrap(),
            json!({"type": "error", "error": "boom"})
        );
        let connected = serde_json::to_value(ServerEnvelope::connected()).unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["message"], CONNECTED_MESSAGE);
    }

    #[test]
    fn test_execute_command_carries_wire_command() {
        let command = Command::from_value(json!({
            "type": "move",
            "target": "logo",
            "properties": {"x": 10},
            "rawText": "move the logo",
            "timestamp": 5
        }))
        .unwrap();
        let value = serde_json::to_value(ServerEnvelope::ExecuteCommand { data: command }).unwrap();
        assert_eq!(value["type"], "execute-command");
        assert_eq!(value["data"]["type"], "move");
        assert_eq!(value["data"]["target"], "logo");
        assert_eq!(value["data"]["rawText"], "move the logo");
    }
}
