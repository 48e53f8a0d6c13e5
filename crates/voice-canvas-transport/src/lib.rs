//! Transport layer for voice canvas clients.
//!
//! Provides:
//! - Envelope protocol (JSON, `type`-tagged)
//! - Connection hub with broadcast and point delivery
//! - Inbound routing to the translation gateway
//! - WebSocket and HTTP transports (feature: websocket)

pub mod dispatch;
pub mod hub;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod http;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use hub::{Accepted, ConnectionId, Frame, Hub, HubConfig, HubError};
pub use protocol::{ClientEnvelope, ExecutionReport, Inbound, ServerEnvelope, VoiceCommandData};
