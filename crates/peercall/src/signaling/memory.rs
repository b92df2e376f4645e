//! In-process signaling relay
//!
//! Every connected peer owns a bounded inbox. Sending to a peer that is not
//! connected fails with [`Error::PeerNotFound`]; the relay is also the
//! presence directory for everyone connected to it.

use super::{SignalEnvelope, SignalingTransport};
use crate::identity::{PeerId, PeerIdentity};
use crate::presence::PresenceDirectory;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

struct Endpoint {
    identity: PeerIdentity,
    tx: mpsc::Sender<SignalEnvelope>,
}

/// Shared in-memory relay
///
/// # Example
///
/// ```
/// use peercall::{MemoryRelay, PeerId, PeerIdentity, SignalEnvelope, SignalPayload, SignalingTransport};
///
/// # tokio_test::block_on(async {
/// let relay = MemoryRelay::new();
/// let (alice, _alice_rx) = relay.connect(PeerIdentity::new("alice", "Alice"), 16);
/// let (_bob, mut bob_rx) = relay.connect(PeerIdentity::new("bob", "Bob"), 16);
///
/// let hangup = SignalEnvelope::new(PeerId::from("alice"), PeerId::from("bob"), SignalPayload::Hangup);
/// alice.send(hangup).await.unwrap();
///
/// let received = bob_rx.recv().await.unwrap();
/// assert_eq!(received.from, PeerId::from("alice"));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MemoryRelay {
    endpoints: Arc<Mutex<HashMap<PeerId, Endpoint>>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a peer, replacing any previous connection with the same id
    pub fn connect(
        &self,
        identity: PeerIdentity,
        capacity: usize,
    ) -> (MemorySignaling, mpsc::Receiver<SignalEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let local = identity.id.clone();

        let replaced = self
            .endpoints
            .lock()
            .insert(local.clone(), Endpoint { identity, tx })
            .is_some();
        info!(peer = %local, replaced, "Peer connected to memory relay");

        let signaling = MemorySignaling {
            local,
            relay: self.clone(),
        };
        (signaling, rx)
    }

    /// Disconnect a peer; its inbox closes once buffered messages are read
    pub fn disconnect(&self, peer: &PeerId) -> bool {
        let removed = self.endpoints.lock().remove(peer).is_some();
        if removed {
            info!(peer = %peer, "Peer disconnected from memory relay");
        }
        removed
    }

    /// Connected peers, sorted by id
    pub fn roster(&self) -> Vec<PeerIdentity> {
        let mut peers: Vec<PeerIdentity> = self
            .endpoints
            .lock()
            .values()
            .map(|endpoint| endpoint.identity.clone())
            .collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    async fn deliver(&self, envelope: SignalEnvelope) -> Result<()> {
        let tx = self
            .endpoints
            .lock()
            .get(&envelope.to)
            .map(|endpoint| endpoint.tx.clone())
            .ok_or_else(|| Error::PeerNotFound(envelope.to.to_string()))?;

        let to = envelope.to.clone();
        tx.send(envelope)
            .await
            .map_err(|_| Error::PeerNotFound(to.to_string()))
    }
}

impl PresenceDirectory for MemoryRelay {
    fn reachable_peers(&self) -> Vec<PeerIdentity> {
        self.roster()
    }

    fn is_reachable(&self, peer: &PeerId) -> bool {
        self.endpoints.lock().contains_key(peer)
    }
}

/// One peer's handle onto a [`MemoryRelay`]
#[derive(Clone)]
pub struct MemorySignaling {
    local: PeerId,
    relay: MemoryRelay,
}

impl MemorySignaling {
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    pub fn relay(&self) -> &MemoryRelay {
        &self.relay
    }
}

#[async_trait]
impl SignalingTransport for MemorySignaling {
    async fn send(&self, mut envelope: SignalEnvelope) -> Result<()> {
        envelope.from = self.local.clone();
        debug!(
            from = %envelope.from,
            to = %envelope.to,
            kind = envelope.payload.kind(),
            "Relaying signal"
        );
        self.relay.deliver(envelope).await
    }
}
