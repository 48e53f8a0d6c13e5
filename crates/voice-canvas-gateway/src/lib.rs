//! External services behind the voice canvas contracts.
//!
//! Provides:
//! - `GeminiGateway` - translation of text and audio into commands
//! - `FigmaClient` - read access to a design file as a tree source
//! - Prompt construction and forgiving reply decoding

pub mod figma;
pub mod gemini;
pub mod parse;
pub mod prompt;

pub use figma::FigmaClient;
pub use gemini::{GeminiConfig, GeminiError, GeminiGateway};
pub use parse::ParseError;
