//! Paint parsing for fills and strokes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Linear RGB color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0);
    pub const YELLOW: Self = Self::new(1.0, 1.0, 0.0);
    pub const CYAN: Self = Self::new(0.0, 1.0, 1.0);
    pub const MAGENTA: Self = Self::new(1.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const GRAY: Self = Self::new(0.5, 0.5, 0.5);
    pub const ORANGE: Self = Self::new(1.0, 0.5, 0.0);
    pub const PURPLE: Self = Self::new(0.5, 0.0, 0.5);

    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Color for a name, case-insensitively. Unknown names are gray.
    #[must_use]
    pub fn named(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "yellow" => Self::YELLOW,
            "cyan" => Self::CYAN,
            "magenta" => Self::MAGENTA,
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "orange" => Self::ORANGE,
            "purple" => Self::PURPLE,
            _ => Self::GRAY,
        }
    }
}

/// Solid paint in the design tool's paint format.
#[must_use]
pub fn solid(color: Rgb) -> Value {
    json!({"type": "SOLID", "color": color})
}

/// Normalize a `fills`/`strokes` property into a paint list.
///
/// A list is taken as-is, a string is read as a color name, and anything
/// else yields no paints.
#[must_use]
pub fn parse_paints(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(paints) => paints.clone(),
        Value::String(name) => vec![solid(Rgb::named(name))],
        _ => Vec::new(),
    }
}

/// Color of the first solid paint in `paints`.
#[must_use]
pub fn first_solid(paints: &[Value]) -> Option<Rgb> {
    paints
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("SOLID"))
        .find_map(|p| serde_json::from_value(p.get("color")?.clone()).ok())
}
