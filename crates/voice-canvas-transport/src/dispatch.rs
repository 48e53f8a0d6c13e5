//! Inbound envelope routing.

use voice_canvas_core::{
    CommandContext, GatewayError, Translation, TranslationInput, TreeSourceError,
};

use crate::{
    hub::{ConnectionId, Hub, shutdown_requested},
    protocol::{
        ClientEnvelope, ExecutionReport, Inbound, NO_INPUT_MESSAGE, ServerEnvelope,
        VoiceCommandData,
    },
};

impl Hub {
    /// Handle one text frame from `origin`.
    ///
    /// Frames from one connection must be dispatched in arrival order; the
    /// transport awaits each call before reading the next frame.
    pub async fn dispatch(&self, origin: ConnectionId, frame: &str) {
        let envelope = match ClientEnvelope::decode(frame) {
            Ok(Inbound::Known(envelope)) => envelope,
            Ok(Inbound::Unknown(kind)) => {
                tracing::info!(connection = %origin, "Unknown message type: {kind}");
                return;
            }
            Err(e) => {
                tracing::warn!(connection = %origin, "Invalid client message: {e}");
                self.reply(origin, &ServerEnvelope::error(e.to_string()));
                return;
            }
        };

        tracing::debug!(connection = %origin, kind = envelope.kind(), "received message");
        match envelope {
            ClientEnvelope::Ping => self.reply(origin, &ServerEnvelope::Pong),
            ClientEnvelope::VoiceCommand { data } => self.handle_voice_command(origin, data).await,
            ClientEnvelope::FileData { data } => self.handle_file_data(origin, data),
            ClientEnvelope::CommandExecuted { data } => self.handle_report(data),
        }
    }

    async fn handle_voice_command(&self, origin: ConnectionId, data: VoiceCommandData) {
        let audio = data.audio().map(str::to_owned);
        let text = data.text().map(str::to_owned);

        let (input, context) = if let Some(audio) = audio {
            let context = data.context.map(CommandContext::from_value);
            (TranslationInput::Audio(audio), context)
        } else if let Some(text) = text {
            let context = match data.context {
                Some(value) => Some(CommandContext::from_value(value)),
                None => self.fallback_context().await,
            };
            (TranslationInput::Text(text), context)
        } else {
            self.reply(origin, &ServerEnvelope::error(NO_INPUT_MESSAGE));
            return;
        };

        match self.translate(input, context.as_ref()).await {
            Ok(translation) => {
                let command = &translation.command;
                tracing::info!(
                    connection = %origin,
                    command_type = %command.command_type(),
                    element = command.target().unwrap_or_default(),
                    confidence = translation.confidence,
                    "command translated"
                );

                self.record_origin(command, origin);
                let delivered = self.broadcast(&ServerEnvelope::ExecuteCommand {
                    data: command.clone(),
                });
                tracing::debug!(delivered, "execute-command broadcast");

                self.reply(origin, &ServerEnvelope::CommandProcessed { data: translation });
            }
            Err(e) => {
                tracing::error!(connection = %origin, "Error processing voice command: {e}");
                self.reply(origin, &ServerEnvelope::error(e.to_string()));
            }
        }
    }

    /// Call the gateway, bounded by the translation timeout and hub shutdown.
    pub(crate) async fn translate(
        &self,
        input: TranslationInput,
        context: Option<&CommandContext>,
    ) -> Result<Translation, GatewayError> {
        let limit = self.config.translation_timeout;
        tokio::select! {
            result = tokio::time::timeout(limit, self.gateway.translate(input, context)) => {
                result.unwrap_or(Err(GatewayError::TimedOut(limit)))
            }
            () = shutdown_requested(self.shutdown_signal()) => Err(GatewayError::Cancelled),
        }
    }

    /// Context for a text command that arrived without one: the last
    /// `file-data` report, else a fresh fetch from the tree source.
    pub(crate) async fn fallback_context(&self) -> Option<CommandContext> {
        if let Some(context) = self.last_file_data() {
            return Some(context);
        }

        let tree = self.tree.as_ref()?;
        match tree.document().await {
            Ok(snapshot) => Some(CommandContext::from_document(&snapshot)),
            Err(e) => {
                log_tree_error(&e);
                None
            }
        }
    }

    fn handle_file_data(&self, origin: ConnectionId, data: serde_json::Value) {
        let context = CommandContext::from_value(data);
        tracing::info!(
            connection = %origin,
            nodes = context.reported_node_count(),
            "Received file data"
        );
        self.record_file_data(context);
    }

    fn handle_report(&self, report: ExecutionReport) {
        if let Some(error) = &report.error {
            tracing::warn!(
                command_type = %report.command.command_type(),
                "command failed on render host: {error}"
            );
        }

        match self.take_origin(&report.command) {
            Some(origin) => {
                self.reply(origin, &ServerEnvelope::CommandExecuted { data: report });
            }
            None => {
                tracing::info!(
                    raw_text = %report.command.raw_text,
                    success = report.success,
                    "execution report has no known origin"
                );
            }
        }
    }

    pub(crate) fn reply(&self, id: ConnectionId, envelope: &ServerEnvelope) {
        if let Err(e) = self.send_to(id, envelope) {
            tracing::warn!(connection = %id, "Failed to send message: {e}");
        }
    }
}

fn log_tree_error(error: &TreeSourceError) {
    tracing::warn!("Could not fetch document context: {error}");
}
