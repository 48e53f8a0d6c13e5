//! Render-side protocol session.
//!
//! Turns hub envelopes into executor calls and executor outcomes into
//! `command-executed` reports. The session owns no socket: callers feed it
//! frames and send back whatever it returns.

use voice_canvas_core::CommandExecutor;
use voice_canvas_transport::protocol::{ClientEnvelope, ExecutionReport, ServerEnvelope};

use crate::canvas::Canvas;

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid server message: {0}")]
    Decode(serde_json::Error),
    #[error("Failed to encode reply: {0}")]
    Encode(serde_json::Error),
}

/// Render host end of a hub connection.
pub struct RenderSession<E> {
    executor: E,
    executed: usize,
    failed: usize,
}

impl<E: CommandExecutor> RenderSession<E> {
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self {
            executor,
            executed: 0,
            failed: 0,
        }
    }

    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Commands applied successfully and commands rejected so far.
    #[must_use]
    pub const fn stats(&self) -> (usize, usize) {
        (self.executed, self.failed)
    }

    /// Handle one envelope from the hub, returning the reply to send.
    pub fn handle(&mut self, envelope: ServerEnvelope) -> Option<ClientEnvelope> {
        match envelope {
            ServerEnvelope::ExecuteCommand { data: command } => {
                let report = match self.executor.apply(&command) {
                    Ok(applied) => {
                        self.executed += 1;
                        tracing::info!(
                            command_type = %applied.command_type,
                            affected = applied.affected.len(),
                            "command executed"
                        );
                        ExecutionReport {
                            success: true,
                            error: None,
                            command,
                        }
                    }
                    Err(e) => {
                        self.failed += 1;
                        tracing::warn!(
                            command_type = %command.command_type(),
                            "Error executing command: {e}"
                        );
                        ExecutionReport {
                            success: false,
                            error: Some(e.to_string()),
                            command,
                        }
                    }
                };
                Some(ClientEnvelope::CommandExecuted { data: report })
            }
            ServerEnvelope::Connected { message } => {
                tracing::info!("{message}");
                None
            }
            ServerEnvelope::Error { error } => {
                tracing::warn!("Server error: {error}");
                None
            }
            other => {
                tracing::debug!(?other, "ignoring message");
                None
            }
        }
    }

    /// Handle one text frame, returning the encoded reply.
    ///
    /// # Errors
    /// Returns error if the frame is not a server envelope.
    pub fn handle_frame(&mut self, frame: &str) -> Result<Option<String>, SessionError> {
        let envelope: ServerEnvelope = serde_json::from_str(frame).map_err(SessionError::Decode)?;
        self.handle(envelope)
            .map(|reply| serde_json::to_string(&reply).map_err(SessionError::Encode))
            .transpose()
    }
}

impl RenderSession<Canvas> {
    /// Current document state as a `file-data` envelope.
    ///
    /// # Errors
    /// Returns error if the context cannot be encoded.
    pub fn file_data(&self) -> Result<ClientEnvelope, SessionError> {
        let data =
            serde_json::to_value(self.executor.file_context()).map_err(SessionError::Encode)?;
        Ok(ClientEnvelope::FileData { data })
    }
}
