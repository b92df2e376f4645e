//! WebSocket signaling client
//!
//! Connects to a [`super::SignalingRelay`], announces the local credential and
//! then exchanges JSON-RPC frames. Routed sends are requests, so relay errors
//! such as `PEER_NOT_FOUND` surface from [`SignalingTransport::send`].
//! Inbound routed notifications become [`SignalEnvelope`]s; `peer.joined` and
//! `peer.left` keep a presence roster current. A `peer.left` for a peer is
//! also delivered as a hangup from that peer.

use super::protocol::{
    error_codes, to_json, Frame, JsonRpcError, PeerAnnounceParams, PeerListResult,
    SignalingMessage,
};
use super::{SignalEnvelope, SignalPayload, SignalingTransport};
use crate::config::CallConfig;
use crate::identity::{Credential, PeerId, PeerIdentity};
use crate::presence::{PresenceDirectory, PresenceRoster};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, instrument, warn};

/// How long a request waits for the relay's response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value>>>;

/// JSON-RPC signaling client
pub struct WebSocketSignaling {
    local: PeerId,
    outbound: mpsc::Sender<Message>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    roster: Arc<PresenceRoster>,
    request_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebSocketSignaling {
    /// Connect using `signaling_url` and `signaling_capacity` from the config
    pub async fn from_config(
        config: &CallConfig,
        credential: &Credential,
    ) -> Result<(Arc<Self>, mpsc::Receiver<SignalEnvelope>)> {
        Self::connect(&config.signaling_url, credential, config.signaling_capacity).await
    }

    /// Connect and announce
    ///
    /// Returns the client and the inbound envelope stream. The stream ends
    /// when the connection is lost.
    #[instrument(skip(credential), fields(peer = %credential.peer_id()))]
    pub async fn connect(
        url: &str,
        credential: &Credential,
        capacity: usize,
    ) -> Result<(Arc<Self>, mpsc::Receiver<SignalEnvelope>)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocketError(format!("Failed to connect to {}: {}", url, e)))?;
        debug!("Signaling websocket connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel::<SignalEnvelope>(capacity.max(1));

        let local = credential.peer_id().clone();
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let roster = Arc::new(PresenceRoster::new());

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_tx.send(message).await {
                    debug!("Failed to send WebSocket message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = {
            let local = local.clone();
            let pending = Arc::clone(&pending);
            let roster = Arc::clone(&roster);
            tokio::spawn(async move {
                while let Some(msg) = ws_rx.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if !handle_frame(&text, &local, &pending, &roster, &inbound_tx).await {
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Signaling connection error: {}", e);
                            break;
                        }
                    }
                }
                // Dropping the senders fails every in-flight request
                pending.lock().clear();
                info!("Signaling connection closed");
            })
        };

        let client = Arc::new(Self {
            local,
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            roster,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tasks: Mutex::new(vec![writer, reader]),
        });

        let identity = credential.identity();
        let announce = SignalingMessage::Announce(PeerAnnounceParams {
            peer_id: identity.id.to_string(),
            display_name: Some(identity.display_name.clone()),
            token: Some(credential.token().to_string()),
        });
        let result = match client.request(&announce).await {
            Ok(result) => result,
            Err(e) => {
                client.close().await;
                return Err(e);
            }
        };
        let peers: PeerListResult = serde_json::from_value(result).map_err(|e| {
            Error::ProtocolError(format!("Invalid announce response: {}", e))
        })?;
        client
            .roster
            .replace(peers.peers.into_iter().map(|p| p.into_identity()));
        info!(peers = client.roster.len(), "Announced to signaling relay");

        Ok((client, inbound_rx))
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    /// Re-fetch the roster from the relay
    pub async fn refresh_roster(&self) -> Result<Vec<PeerIdentity>> {
        let result = self
            .request(&SignalingMessage::List(Default::default()))
            .await?;
        let peers: PeerListResult = serde_json::from_value(result)
            .map_err(|e| Error::ProtocolError(format!("Invalid peer.list response: {}", e)))?;
        self.roster
            .replace(peers.peers.into_iter().map(|p| p.into_identity()));
        Ok(self.roster.reachable_peers())
    }

    /// Close the connection; the inbound stream ends shortly after
    pub async fn close(&self) {
        let _ = self.outbound.send(Message::Close(None)).await;
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(self.request_timeout, task).await.is_err() {
                warn!("Signaling task did not stop in time");
            }
        }
    }

    async fn request(&self, message: &SignalingMessage) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = to_json(&message.to_request(Some(Value::from(id)))?)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if self.outbound.send(Message::Text(text)).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::SignalingError("Signaling connection closed".to_string()));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::SignalingError(
                "Signaling connection closed".to_string(),
            )),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::OperationTimeout(format!(
                    "No response to {} within {:?}",
                    message.method_name(),
                    self.request_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl SignalingTransport for WebSocketSignaling {
    async fn send(&self, envelope: SignalEnvelope) -> Result<()> {
        debug!(to = %envelope.to, kind = envelope.payload.kind(), "Sending signal");
        self.request(&SignalingMessage::from_envelope(&envelope))
            .await
            .map(|_| ())
    }
}

impl PresenceDirectory for WebSocketSignaling {
    fn reachable_peers(&self) -> Vec<PeerIdentity> {
        self.roster.reachable_peers()
    }

    fn is_reachable(&self, peer: &PeerId) -> bool {
        self.roster.is_reachable(peer)
    }
}

fn error_from_response(response: JsonRpcError) -> Error {
    match response.error.code {
        error_codes::PEER_NOT_FOUND => Error::PeerNotFound(response.error.message),
        error_codes::NOT_ANNOUNCED => Error::Unauthenticated(response.error.message),
        code => Error::SignalingError(format!("{} ({})", response.error.message, code)),
    }
}

/// Returns `false` once the inbound stream has no receiver left
async fn handle_frame(
    text: &str,
    local: &PeerId,
    pending: &Mutex<PendingMap>,
    roster: &PresenceRoster,
    inbound: &mpsc::Sender<SignalEnvelope>,
) -> bool {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            return true;
        }
    };

    match frame {
        Frame::Response(response) => {
            if let Some(tx) = response.id.as_u64().and_then(|id| pending.lock().remove(&id)) {
                let _ = tx.send(Ok(response.result));
            }
            true
        }
        Frame::Error(response) => {
            match response.id.as_u64().and_then(|id| pending.lock().remove(&id)) {
                Some(tx) => {
                    let _ = tx.send(Err(error_from_response(response)));
                }
                None => warn!(
                    code = response.error.code,
                    "Relay error: {}", response.error.message
                ),
            }
            true
        }
        Frame::Request(request) => {
            let message = match SignalingMessage::from_request(&request) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping notification: {}", e);
                    return true;
                }
            };
            match message {
                SignalingMessage::Joined(presence) => {
                    debug!(peer = %presence.peer_id, "Peer joined");
                    roster.insert(presence.into_identity());
                    true
                }
                SignalingMessage::Left(presence) => {
                    let peer = PeerId::from(presence.peer_id);
                    debug!(peer = %peer, "Peer left");
                    roster.remove(&peer);
                    let hangup = SignalEnvelope::new(peer, local.clone(), SignalPayload::Hangup);
                    inbound.send(hangup).await.is_ok()
                }
                routed => match routed.into_envelope() {
                    Some(envelope) => inbound.send(envelope).await.is_ok(),
                    None => {
                        debug!(method = %request.method, "Ignoring unexpected notification");
                        true
                    }
                },
            }
        }
    }
}
