//! Signaling: relaying negotiation messages between peers
//!
//! All sessions share one signaling channel. Every message carries the
//! sender and target peer ids; the coordinator demultiplexes inbound
//! messages by sender id and message kind.
//!
//! Adapters:
//! - [`MemoryRelay`]: in-process relay for embedding and tests
//! - [`WebSocketSignaling`]: JSON-RPC 2.0 client for a [`SignalingRelay`]
//! - [`SignalingRelay`]: the WebSocket relay server

pub mod memory;
pub mod protocol;
pub mod relay;
pub mod websocket;

pub use memory::{MemoryRelay, MemorySignaling};
pub use relay::{RelayHandle, SignalingRelay};
pub use websocket::WebSocketSignaling;

use crate::identity::PeerId;
use crate::negotiation::{IceCandidate, SessionDescription};
use crate::Result;
use async_trait::async_trait;

/// Negotiation message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    Hangup,
}

impl SignalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer(_) => "offer",
            SignalPayload::Answer(_) => "answer",
            SignalPayload::IceCandidate(_) => "ice-candidate",
            SignalPayload::Hangup => "hangup",
        }
    }
}

/// A message addressed from one peer to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEnvelope {
    pub from: PeerId,
    pub to: PeerId,
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn new(from: PeerId, to: PeerId, payload: SignalPayload) -> Self {
        Self { from, to, payload }
    }
}

/// Outbound half of a signaling channel
///
/// Inbound messages are delivered through the `mpsc::Receiver` the adapter
/// returns when connecting. Delivery is ordered per sender and at least once.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Send to `envelope.to`
    ///
    /// Adapters label the message with their own identity; `envelope.from`
    /// is informational.
    async fn send(&self, envelope: SignalEnvelope) -> Result<()>;
}
