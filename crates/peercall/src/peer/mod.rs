//! Peer transport: the media connection a session negotiates
//!
//! The negotiator drives a [`PeerTransport`] (create descriptions, apply the
//! remote side, add candidates) and observes it through [`TransportEvent`]s
//! delivered into the session's serialized event queue.

mod rtc;

pub use self::rtc::{WebRtcPeerTransport, WebRtcTransportFactory};

use crate::identity::PeerId;
use crate::media::{LocalTrack, RemoteTrack};
use crate::negotiation::{IceCandidate, SessionDescription, SessionEvent};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Something the peer transport observed
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local candidate was gathered
    LocalCandidate(IceCandidate),
    /// Candidate gathering finished
    GatheringComplete,
    /// The remote peer's media arrived
    TrackReceived(RemoteTrack),
    /// Connectivity checks succeeded
    Connected,
    /// Connectivity was lost for good
    Failed(String),
}

/// Delivers transport events into one session's event queue
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl TransportEventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event; returns false once the session has finished
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(SessionEvent::Transport(event)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Media connection to one remote peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Start sending the given local tracks
    async fn attach_local_tracks(&self, tracks: &[LocalTrack]) -> Result<()>;

    /// Create an offer and install it as the local description
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an answer and install it as the local description
    ///
    /// The remote offer must have been applied first.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn apply_remote_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply a remote candidate
    ///
    /// Malformed or unusable candidates are reported as
    /// [`Error::CandidateRejected`](crate::Error::CandidateRejected).
    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates one peer transport per session
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    async fn create(
        &self,
        peer: &PeerId,
        events: TransportEventSink,
    ) -> Result<Arc<dyn PeerTransport>>;
}
