//! Contracts of the external collaborators.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::command::{Command, CommandType};
use crate::context::CommandContext;
use crate::element::{DocumentSnapshot, Element, ElementId};
use crate::resolver::{candidate_names, resolve};

/// Human input to translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationInput {
    /// Typed or transcribed text.
    Text(String),
    /// Base64-encoded WAV audio.
    Audio(String),
}

/// Result of a translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub command: Command,
    /// Model confidence in `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Translation gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to process text command: {0}")]
    Text(String),
    #[error("Failed to process voice command: {0}")]
    Voice(String),
    #[error("Translation timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Translation cancelled: server shutting down")]
    Cancelled,
}

/// Trait for services that turn human input into commands.
#[async_trait]
pub trait TranslationGateway: Send + Sync {
    /// Translate one instruction.
    async fn translate(
        &self,
        input: TranslationInput,
        context: Option<&CommandContext>,
    ) -> Result<Translation, GatewayError>;

    /// Suggest instructions for the given document state.
    ///
    /// Implementations return an empty list rather than fail.
    async fn suggestions(&self, state: &Value) -> Vec<String>;
}

/// Tree source error.
#[derive(Debug, Error)]
pub enum TreeSourceError {
    #[error("Failed to fetch design file: {0}")]
    Request(String),
    #[error("Design service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Node not found: {0}")]
    NodeNotFound(ElementId),
}

/// Trait for read access to the design document.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Fetch the whole document.
    async fn document(&self) -> Result<DocumentSnapshot, TreeSourceError>;

    /// Elements whose name contains `query`, case-insensitively.
    async fn find_by_name(&self, query: &str) -> Result<Vec<Element>, TreeSourceError> {
        let needle = query.to_lowercase();
        let snapshot = self.document().await?;
        Ok(crate::element::Walk::new(std::slice::from_ref(&snapshot.document))
            .filter(|(_, e)| !e.name.is_empty() && e.name.to_lowercase().contains(&needle))
            .map(|(_, e)| Element {
                children: None,
                ..e.clone()
            })
            .collect())
    }
}

/// Outcome of a successfully applied command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applied {
    pub command_type: CommandType,
    /// Elements created, changed or removed.
    pub affected: Vec<ElementId>,
}

/// Command execution error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error(
        "No nodes found matching \"{target}\". Available nodes include: \"{}\". Try using exact node names or create the element first.",
        .candidates.join("\", \"")
    )]
    NoMatch {
        target: String,
        candidates: Vec<String>,
    },
    #[error("Command `{0}` requires a target")]
    MissingTarget(CommandType),
    #[error("{0}")]
    Host(String),
}

/// Trait implemented by render hosts that own the element tree.
pub trait CommandExecutor {
    /// Read-only snapshot of the current tree.
    fn snapshot(&self) -> Vec<Element>;

    /// Apply one command.
    ///
    /// # Errors
    /// Returns error if the target resolves to nothing or the host rejects
    /// the change.
    fn apply(&mut self, command: &Command) -> Result<Applied, ExecutionError>;
}

/// Resolve the target of a non-`create` command to element ids.
///
/// Zero matches fail with a diagnostic naming up to
/// [`MAX_SUGGESTIONS`](crate::resolver::MAX_SUGGESTIONS) candidates.
///
/// # Errors
/// Returns [`ExecutionError::NoMatch`] or [`ExecutionError::MissingTarget`].
pub fn resolve_target(
    roots: &[Element],
    command: &Command,
) -> Result<Vec<ElementId>, ExecutionError> {
    let target = command
        .target()
        .ok_or(ExecutionError::MissingTarget(command.command_type()))?;

    let ids: Vec<ElementId> = resolve(roots, target)
        .into_iter()
        .map(|m| m.element.id.clone())
        .collect();

    if ids.is_empty() {
        return Err(ExecutionError::NoMatch {
            target: target.to_owned(),
            candidates: candidate_names(roots),
        });
    }
    Ok(ids)
}
