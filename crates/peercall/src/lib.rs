//! One-to-one calls over WebRTC
//!
//! This crate negotiates peer-to-peer audio/video calls: offer/answer
//! exchange, trickle ICE candidate buffering, session lifecycle with
//! timeouts, and routing of a shared signaling channel to per-call sessions.
//!
//! # Features
//!
//! - **Call coordination**: caller/callee roles, one call per remote peer,
//!   a configurable limit on concurrent calls
//! - **Trickle ICE**: candidates that arrive before their description is
//!   ready are buffered and released in arrival order
//! - **Deadlines**: unanswered offers and stalled connectivity end the call
//! - **Pluggable edges**: signaling, peer transport, media capture and
//!   rendering are traits, with WebRTC and WebSocket implementations
//! - **JSON-RPC 2.0 signaling**: WebSocket client plus the relay server
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  CallCoordinator                                         │
//! │  ├─ place_call / hang_up / dispatch                      │
//! │  ├─ SessionRegistry (peer → session handle)              │
//! │  └─ per call: SessionNegotiator task                     │
//! │      ├─ CallSession (state machine)                      │
//! │      ├─ CandidateQueue (trickle ICE buffering)           │
//! │      ├─ PeerTransport (WebRtcPeerTransport)              │
//! │      ├─ MediaLease (local tracks)                        │
//! │      └─ Outbox (ordered outbound signaling)              │
//! │          ↕                                               │
//! │  SignalingTransport (MemoryRelay / WebSocketSignaling)   │
//! │          ↕                                               │
//! │  SignalingRelay (JSON-RPC 2.0 over WebSocket)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use peercall::CallConfig;
//!
//! let config = CallConfig {
//!     signaling_url: "ws://localhost:8080".to_string(),
//!     answer_timeout_ms: 20_000,
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_active_calls, 1);
//! ```
//!
//! ## Async Usage
//!
//! ```no_run
//! use peercall::{
//!     CallConfig, CallCoordinator, Collaborators, Credential, PeerId, PeerIdentity,
//!     WebRtcTransportFactory, WebSocketSignaling,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     media: Arc<dyn peercall::MediaDevice>,
//! #     renderer: Arc<dyn peercall::RenderSurface>,
//! # ) -> peercall::Result<()> {
//! let config = CallConfig::default();
//! let credential = Credential::new(PeerIdentity::new("alice", "Alice"), "token");
//!
//! let (signaling, inbound) = WebSocketSignaling::from_config(&config, &credential).await?;
//! let coordinator = CallCoordinator::new(
//!     credential,
//!     config.clone(),
//!     Collaborators {
//!         signaling: signaling.clone(),
//!         transports: Arc::new(WebRtcTransportFactory::new(config)?),
//!         media,
//!         presence: signaling,
//!         renderer,
//!     },
//! )?;
//! coordinator.spawn_dispatcher(inbound);
//!
//! coordinator.place_call(&PeerId::from("bob")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod media;
pub mod negotiation;
pub mod peer;
pub mod presence;
pub mod signaling;

pub use config::{CallConfig, TurnServerConfig};
pub use coordinator::{CallCoordinator, CallEvent, Collaborators};
pub use error::{Error, Result};
pub use identity::{AuthService, Credential, PeerId, PeerIdentity};
pub use media::{
    LocalTrack, MediaDevice, MediaLease, RemoteStream, RemoteTrack, RenderSurface, TrackKind,
};
pub use negotiation::{
    CallSession, CallState, EndReason, IceCandidate, Role, SdpType, SessionDescription,
};
pub use peer::{
    PeerTransport, PeerTransportFactory, TransportEvent, TransportEventSink,
    WebRtcPeerTransport, WebRtcTransportFactory,
};
pub use presence::{PresenceDirectory, PresenceRoster};
pub use signaling::{
    MemoryRelay, MemorySignaling, RelayHandle, SignalEnvelope, SignalPayload, SignalingRelay,
    SignalingTransport, WebSocketSignaling,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
