//! Connection hub: the live-connection set and outbound delivery.
//!
//! Delivery is at-most-once. A broadcast serializes the envelope once and
//! queues it on every connection whose outbound channel is still open;
//! closed connections are skipped with no retry and no buffering.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;
use voice_canvas_core::{Command, CommandContext, TranslationGateway, TreeSource};

use crate::protocol::ServerEnvelope;

/// Connection identifier.
pub type ConnectionId = Uuid;

/// Outbound frame queued for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized envelope.
    Text(Arc<str>),
    /// Ask the transport to close the connection.
    Close,
}

/// Hub error.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub is closed")]
    Closed,
    #[error("Connection not found: {0}")]
    NotFound(ConnectionId),
    #[error("Connection closed: {0}")]
    Disconnected(ConnectionId),
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Hub tuning.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upper bound on a single translation call.
    pub translation_timeout: Duration,
    /// How many broadcast commands remember their originating connection.
    pub max_tracked_commands: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            translation_timeout: Duration::from_secs(30),
            max_tracked_commands: 256,
        }
    }
}

/// A freshly accepted connection.
#[derive(Debug)]
pub struct Accepted {
    pub id: ConnectionId,
    /// Frames to write to the transport, in order.
    pub outbound: mpsc::UnboundedReceiver<Frame>,
}

struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Frame>,
}

/// Remembers which connection originated each broadcast command.
struct OriginLog {
    entries: VecDeque<((u64, String), ConnectionId)>,
    capacity: usize,
}

impl OriginLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    fn record(&mut self, key: (u64, String), origin: ConnectionId) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, origin));
    }

    fn take(&mut self, key: &(u64, String)) -> Option<ConnectionId> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        self.entries.remove(pos).map(|(_, origin)| origin)
    }

    fn forget(&mut self, origin: ConnectionId) {
        self.entries.retain(|(_, id)| *id != origin);
    }
}

/// Connection hub.
///
/// The gateway and tree source are injected once at construction. The
/// connection set sits behind a synchronous mutex that is never held across
/// an `.await`.
pub struct Hub {
    connections: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
    accepting: AtomicBool,
    shutdown: watch::Sender<bool>,
    origins: Mutex<OriginLog>,
    file_data: Mutex<Option<CommandContext>>,
    pub(crate) gateway: Arc<dyn TranslationGateway>,
    pub(crate) tree: Option<Arc<dyn TreeSource>>,
    pub(crate) config: HubConfig,
}

impl Hub {
    /// Create a new hub.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn TranslationGateway>,
        tree: Option<Arc<dyn TreeSource>>,
        config: HubConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            connections: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
            shutdown,
            origins: Mutex::new(OriginLog::new(config.max_tracked_commands)),
            file_data: Mutex::new(None),
            gateway,
            tree,
            config,
        }
    }

    /// Register a connection and greet it with `connected`.
    ///
    /// # Errors
    /// Returns error if the hub has been closed.
    pub fn accept(&self) -> Result<Accepted, HubError> {
        let id = Uuid::new_v4();
        let (tx, outbound) = mpsc::unbounded_channel();
        {
            // Checked under the lock so `close` cannot drain in between.
            let mut connections = lock(&self.connections);
            if !self.accepting.load(Ordering::SeqCst) {
                return Err(HubError::Closed);
            }
            connections.insert(id, ConnectionHandle { tx });
        }
        tracing::info!(connection = %id, "client connected");

        if let Err(e) = self.send_to(id, &ServerEnvelope::connected()) {
            tracing::warn!(connection = %id, "failed to greet client: {e}");
        }
        Ok(Accepted { id, outbound })
    }

    /// Drop a connection. Returns whether it was still registered.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = lock(&self.connections).remove(&id).is_some();
        if removed {
            lock(&self.origins).forget(id);
            tracing::info!(connection = %id, "client disconnected");
        }
        removed
    }

    /// Deliver an envelope to every live connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn broadcast(&self, envelope: &ServerEnvelope) -> usize {
        let frame: Arc<str> = match serde_json::to_string(envelope) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!("Failed to serialize message: {e}");
                return 0;
            }
        };

        let connections = lock(&self.connections);
        connections
            .values()
            .filter(|conn| !conn.tx.is_closed())
            .filter(|conn| conn.tx.send(Frame::Text(Arc::clone(&frame))).is_ok())
            .count()
    }

    /// Deliver an envelope to one connection.
    ///
    /// # Errors
    /// Returns error if the connection is unknown or already closed.
    pub fn send_to(&self, id: ConnectionId, envelope: &ServerEnvelope) -> Result<(), HubError> {
        let json = serde_json::to_string(envelope)?;
        let connections = lock(&self.connections);
        let conn = connections.get(&id).ok_or(HubError::NotFound(id))?;
        conn.tx
            .send(Frame::Text(json.into()))
            .map_err(|_| HubError::Disconnected(id))
    }

    /// Close every connection and refuse new ones.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);

        let drained: Vec<_> = lock(&self.connections).drain().collect();
        for (_, conn) in &drained {
            let _ = conn.tx.send(Frame::Close);
        }
        lock(&self.origins).entries.clear();
        tracing::info!(connections = drained.len(), "hub closed");
    }

    /// Whether [`Hub::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        lock(&self.connections).len()
    }

    /// Resolves once [`Hub::close`] has been called.
    pub async fn closed(&self) {
        shutdown_requested(self.shutdown_signal()).await;
    }

    /// Receiver that flips to `true` when the hub closes.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Most recent `file-data` payload.
    #[must_use]
    pub fn last_file_data(&self) -> Option<CommandContext> {
        lock(&self.file_data).clone()
    }

    pub(crate) fn record_file_data(&self, context: CommandContext) {
        *lock(&self.file_data) = Some(context);
    }

    pub(crate) fn record_origin(&self, command: &Command, origin: ConnectionId) {
        lock(&self.origins).record(command.correlation_key(), origin);
    }

    pub(crate) fn take_origin(&self, command: &Command) -> Option<ConnectionId> {
        lock(&self.origins).take(&command.correlation_key())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves once `signal` reports shutdown. Never resolves if the sender is
/// dropped without signalling.
pub(crate) async fn shutdown_requested(mut signal: watch::Receiver<bool>) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
