//! Reference render host for voice canvas commands.
//!
//! Provides:
//! - `Canvas` - In-memory scene graph implementing `CommandExecutor`
//! - `RenderSession` - Envelope handling for the render side of the hub
//! - Paint parsing (paint lists and named colors)

pub mod canvas;
pub mod paint;
pub mod session;

pub use canvas::{Canvas, SceneNode};
pub use paint::Rgb;
pub use session::{RenderSession, SessionError};
