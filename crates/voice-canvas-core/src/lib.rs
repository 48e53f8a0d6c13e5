//! Core abstractions for voice-driven canvas editing.
//!
//! This crate provides the fundamental building blocks:
//! - `Element` - Read-only snapshot of the render tree
//! - `Command` - Structured edit operation with per-type properties
//! - `resolver` - Deterministic mapping of a target phrase onto elements
//! - `CommandContext` - Document context for the translation gateway
//! - Translation gateway, tree source and executor traits

pub mod command;
pub mod context;
pub mod element;
pub mod resolver;
pub mod traits;

pub use command::{Command, CommandAction, CommandDecodeError, CommandType};
pub use context::CommandContext;
pub use element::{DocumentSnapshot, Element, ElementId, ElementKind, FileMetadata, NodeSummary};
pub use resolver::{Match, resolve, resolve_elements};
pub use traits::{
    Applied, CommandExecutor, ExecutionError, GatewayError, Translation, TranslationGateway,
    TranslationInput, TreeSource, TreeSourceError, resolve_target,
};
