//! WebSocket transport for hub connections.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};

use crate::{
    hub::{Frame, Hub, HubError, shutdown_requested},
    protocol::ServerEnvelope,
};

/// Error text for a binary frame that is not UTF-8 JSON.
pub const INVALID_BINARY_MESSAGE: &str = "Invalid message: binary frame is not valid UTF-8";

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    if hub.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let accepted = match hub.accept() {
        Ok(accepted) => accepted,
        Err(HubError::Closed) => return,
        Err(e) => {
            tracing::error!("Failed to register connection: {e}");
            return;
        }
    };
    let id = accepted.id;
    let (mut sender, mut receiver) = socket.split();

    // Forward queued frames to the socket
    let mut rx = accepted.outbound;
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Frame::Text(json) => Message::Text(json.as_ref().into()),
                Frame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let shutdown = shutdown_requested(hub.shutdown_signal());
    tokio::pin!(shutdown);

    // Frames from one connection are handled strictly in order
    loop {
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            () = &mut shutdown => break,
        };
        let Some(msg) = msg else { break };

        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(connection = %id, "Invalid binary frame: {e}");
                    hub.reply(id, &ServerEnvelope::error(INVALID_BINARY_MESSAGE));
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(connection = %id, "WebSocket error: {e}");
                break;
            }
        };

        hub.dispatch(id, &text).await;
    }

    hub.remove(id);
    // Let a pending close frame flush before tearing down the writer.
    if tokio::time::timeout(Duration::from_secs(1), &mut send_task)
        .await
        .is_err()
    {
        tracing::debug!(connection = %id, "send task did not finish in time");
        send_task.abort();
    }
}

/// Create WebSocket router.
///
/// Serves the upgrade at both `/` and `/ws`.
///
/// # Example
/// ```ignore
/// let app = create_ws_router(hub);
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_ws_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(hub)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
    };
    use voice_canvas_core::{
        Command, CommandAction, CommandContext, GatewayError, Translation, TranslationGateway,
        TranslationInput, command::CreateProps,
    };

    use super::*;
    use crate::hub::HubConfig;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Gateway that answers every text with a `create` after a delay.
    struct SlowGateway(Duration);

    #[async_trait]
    impl TranslationGateway for SlowGateway {
        async fn translate(
            &self,
            input: TranslationInput,
            _context: Option<&CommandContext>,
        ) -> Result<Translation, GatewayError> {
            tokio::time::sleep(self.0).await;
            let TranslationInput::Text(text) = input else {
                return Err(GatewayError::Voice("text only".into()));
            };
            Ok(Translation {
                command: Command::new(CommandAction::Create(CreateProps::default()), text),
                confidence: 1.0,
                explanation: None,
            })
        }

        async fn suggestions(&self, _state: &Value) -> Vec<String> {
            Vec::new()
        }
    }

    fn hub() -> Arc<Hub> {
        let gateway = Arc::new(SlowGateway(Duration::from_millis(50)));
        Arc::new(Hub::new(gateway, None, HubConfig::default()))
    }

    async fn serve(hub: Arc<Hub>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_ws_router(hub)).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    /// Connect and consume the `connected` greeting.
    async fn connect(url: &str) -> Client {
        let (mut client, _) = connect_async(url).await.unwrap();
        assert_eq!(next_json(&mut client).await["type"], "connected");
        client
    }

    async fn next_message(client: &mut Client) -> Option<WsMessage> {
        tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .map(Result::unwrap)
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            match next_message(client).await {
                Some(WsMessage::Text(text)) => return serde_json::from_str(&text).unwrap(),
                Some(WsMessage::Ping(_) | WsMessage::Pong(_)) => {}
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    }

    async fn send_text(client: &mut Client, text: &str) {
        client.send(WsMessage::Text(text.to_owned())).await.unwrap();
    }

    async fn wait_for_connections(hub: &Hub, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.connection_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_frames_are_handled_in_order() {
        let hub = hub();
        let url = serve(Arc::clone(&hub)).await;
        let mut client = connect(&url).await;

        let command = json!({"type": "voice-command", "data": {"text": "add a box"}});
        send_text(&mut client, &command.to_string()).await;
        send_text(&mut client, r#"{"type":"ping"}"#).await;

        let mut kinds = Vec::new();
        for _ in 0..3 {
            kinds.push(next_json(&mut client).await["type"].clone());
        }
        assert_eq!(
            kinds,
            vec![
                json!("execute-command"),
                json!("command-processed"),
                json!("pong")
            ]
        );
    }

    #[tokio::test]
    async fn test_disconnect_removes_connection() {
        let hub = hub();
        let url = serve(Arc::clone(&hub)).await;

        let client = connect(&url).await;
        let mut other = connect(&url).await;
        assert_eq!(hub.connection_count(), 2);

        drop(client);
        wait_for_connections(&hub, 1).await;

        send_text(&mut other, r#"{"type":"ping"}"#).await;
        assert_eq!(next_json(&mut other).await, json!({"type": "pong"}));
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let hub = hub();
        let url = serve(Arc::clone(&hub)).await;
        let mut client = connect(&url).await;

        hub.close();

        assert!(matches!(
            next_message(&mut client).await,
            Some(WsMessage::Close(_))
        ));
        assert_eq!(hub.connection_count(), 0);
        assert!(connect_async(url.as_str()).await.is_err());
    }

    #[tokio::test]
    async fn test_binary_frames() {
        let hub = hub();
        let url = serve(Arc::clone(&hub)).await;
        let mut client = connect(&url).await;

        client
            .send(WsMessage::Binary(vec![0xff, 0xfe, 0x00]))
            .await
            .unwrap();
        assert_eq!(
            next_json(&mut client).await,
            json!({"type": "error", "error": INVALID_BINARY_MESSAGE})
        );

        client
            .send(WsMessage::Binary(br#"{"type":"ping"}"#.to_vec()))
            .await
            .unwrap();
        assert_eq!(next_json(&mut client).await, json!({"type": "pong"}));
        assert_eq!(hub.connection_count(), 1);
    }
}
