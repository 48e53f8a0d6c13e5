//! Structured edit commands.
//!
//! On the wire a command is `{type, target?, properties?, rawText, timestamp}`
//! where `properties` is an open mapping. In memory every command type
//! carries its own property struct. Decoding is permissive: unknown keys are
//! ignored and known keys with an unexpected JSON type are dropped.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Create,
    Modify,
    Delete,
    Style,
    Move,
    Resize,
}

impl CommandType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
            Self::Style => "style",
            Self::Move => "move",
            Self::Resize => "resize",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of element produced by a `create` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    #[serde(alias = "circle")]
    Ellipse,
    Text,
    Frame,
    /// Unrecognized shapes are created as rectangles.
    #[serde(other)]
    Unknown,
}

/// Properties of a `create` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProps {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ShapeKind>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Paint list or color string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fills: Option<Value>,
}

impl CreateProps {
    pub const DEFAULT_WIDTH: f64 = 100.0;
    pub const DEFAULT_HEIGHT: f64 = 100.0;

    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        match self.element_type {
            None | Some(ShapeKind::Unknown) => ShapeKind::Rectangle,
            Some(kind) => kind,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width.unwrap_or(Self::DEFAULT_WIDTH)
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.height.unwrap_or(Self::DEFAULT_HEIGHT)
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.x.unwrap_or(0.0)
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.y.unwrap_or(0.0)
    }
}

/// Properties of a `modify` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyProps {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

/// Properties of a `style` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fills: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strokes: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub effects: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
}

/// Properties of a `move` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveProps {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// Properties of a `resize` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeProps {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// What a command does, with only the fields legal for its type.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandAction {
    Create(CreateProps),
    Modify { target: String, props: ModifyProps },
    Delete { target: String },
    Style { target: String, props: StyleProps },
    Move { target: String, props: MoveProps },
    Resize { target: String, props: ResizeProps },
}

impl CommandAction {
    #[must_use]
    pub const fn command_type(&self) -> CommandType {
        match self {
            Self::Create(_) => CommandType::Create,
            Self::Modify { .. } => CommandType::Modify,
            Self::Delete { .. } => CommandType::Delete,
            Self::Style { .. } => CommandType::Style,
            Self::Move { .. } => CommandType::Move,
            Self::Resize { .. } => CommandType::Resize,
        }
    }

    /// Target description; `None` for `create`.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Create(_) => None,
            Self::Modify { target, .. }
            | Self::Delete { target }
            | Self::Style { target, .. }
            | Self::Move { target, .. }
            | Self::Resize { target, .. } => Some(target),
        }
    }
}

/// An immutable structured instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCommand", into = "WireCommand")]
pub struct Command {
    pub action: CommandAction,
    /// Original human input, kept for audit.
    pub raw_text: String,
    /// Advisory creation time in epoch milliseconds.
    pub timestamp: u64,
}

impl Command {
    /// Create a command stamped with the current time.
    #[must_use]
    pub fn new(action: CommandAction, raw_text: impl Into<String>) -> Self {
        Self {
            action,
            raw_text: raw_text.into(),
            timestamp: now_ms(),
        }
    }

    #[must_use]
    pub const fn command_type(&self) -> CommandType {
        self.action.command_type()
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.action.target()
    }

    /// Decode from the wire form, stamping `timestamp` when absent.
    ///
    /// # Errors
    /// Returns error if the value is not a command object.
    pub fn from_value(value: Value) -> Result<Self, CommandDecodeError> {
        let wire: WireCommand =
            serde_json::from_value(value).map_err(|e| CommandDecodeError::Shape(e.to_string()))?;
        Self::try_from(wire)
    }

    /// Key used to correlate render reports with the command's origin.
    #[must_use]
    pub fn correlation_key(&self) -> (u64, String) {
        (self.timestamp, self.raw_text.clone())
    }
}

/// Command decode error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandDecodeError {
    #[error("command `{0}` requires a target")]
    MissingTarget(CommandType),
    #[error("invalid command: {0}")]
    Shape(String),
}

/// Wire representation of a [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCommand {
    #[serde(rename = "type")]
    command_type: CommandType,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    properties: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient")]
    raw_text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    timestamp: Option<u64>,
}

impl TryFrom<WireCommand> for Command {
    type Error = CommandDecodeError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let props = Value::Object(wire.properties.unwrap_or_default());
        let target = wire
            .target
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        let require_target =
            || target.clone().ok_or(CommandDecodeError::MissingTarget(wire.command_type));

        let action = match wire.command_type {
            CommandType::Create => CommandAction::Create(decode_props(props)?),
            CommandType::Modify => CommandAction::Modify {
                target: require_target()?,
                props: decode_props(props)?,
            },
            CommandType::Delete => CommandAction::Delete {
                target: require_target()?,
            },
            CommandType::Style => CommandAction::Style {
                target: require_target()?,
                props: decode_props(props)?,
            },
            CommandType::Move => CommandAction::Move {
                target: require_target()?,
                props: decode_props(props)?,
            },
            CommandType::Resize => CommandAction::Resize {
                target: require_target()?,
                props: decode_props(props)?,
            },
        };

        Ok(Self {
            action,
            raw_text: wire.raw_text.unwrap_or_default(),
            timestamp: wire.timestamp.unwrap_or_else(now_ms),
        })
    }
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        let command_type = command.command_type();
        let (target, properties) = match command.action {
            CommandAction::Create(p) => (None, encode_props(&p)),
            CommandAction::Modify { target, props } => (Some(target), encode_props(&props)),
            CommandAction::Delete { target } => (Some(target), None),
            CommandAction::Style { target, props } => (Some(target), encode_props(&props)),
            CommandAction::Move { target, props } => (Some(target), encode_props(&props)),
            CommandAction::Resize { target, props } => (Some(target), encode_props(&props)),
        };
        Self {
            command_type,
            target,
            properties: Some(properties.unwrap_or_default()),
            raw_text: Some(command.raw_text),
            timestamp: Some(command.timestamp),
        }
    }
}

fn decode_props<T: DeserializeOwned>(props: Value) -> Result<T, CommandDecodeError> {
    serde_json::from_value(props).map_err(|e| CommandDecodeError::Shape(e.to_string()))
}

fn encode_props<T: Serialize>(props: &T) -> Option<Map<String, Value>> {
    match serde_json::to_value(props) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Deserialize an optional field, treating a mistyped value as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::debug!("dropping mistyped command field: {e}");
            Ok(None)
        }
    }
}
