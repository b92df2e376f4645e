//! WebSocket signaling relay
//!
//! Accepts WebSocket connections speaking the JSON-RPC protocol in
//! [`super::protocol`]. A connection must `peer.announce` before it can route
//! messages; routed messages are forwarded to the target connection as
//! notifications with `from` set to the sender's announced id.

use super::protocol::{
    error_codes, methods, to_json, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    PeerAnnounceParams, PeerListResult, PresenceParams, SignalingMessage,
};
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Outbound frames buffered per connection
const OUTBOUND_CAPACITY: usize = 128;

/// Time allowed to flush a closing connection
const CLOSE_GRACE: Duration = Duration::from_secs(1);

struct RelayPeer {
    presence: PresenceParams,
    tx: mpsc::Sender<String>,
}

/// Shared state across all relay connections
#[derive(Default)]
struct RelayState {
    peers: RwLock<HashMap<String, RelayPeer>>,
}

impl RelayState {
    async fn sender_for(&self, peer_id: &str) -> Option<mpsc::Sender<String>> {
        self.peers.read().await.get(peer_id).map(|peer| peer.tx.clone())
    }

    async fn roster_except(&self, peer_id: &str) -> Vec<PresenceParams> {
        let mut peers: Vec<PresenceParams> = self
            .peers
            .read()
            .await
            .iter()
            .filter(|(id, _)| id.as_str() != peer_id)
            .map(|(_, peer)| peer.presence.clone())
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    /// Send a notification to every announced peer except `skip`
    async fn broadcast(&self, message: SignalingMessage, skip: &str) {
        let text = match message.to_request(None).and_then(|req| to_json(&req)) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {}: {}", message.method_name(), e);
                return;
            }
        };

        let targets: Vec<mpsc::Sender<String>> = self
            .peers
            .read()
            .await
            .iter()
            .filter(|(id, _)| id.as_str() != skip)
            .map(|(_, peer)| peer.tx.clone())
            .collect();

        for tx in targets {
            let _ = tx.send(text.clone()).await;
        }
    }
}

/// WebSocket signaling relay, bound but not yet serving
pub struct SignalingRelay {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl SignalingRelay {
    /// Bind the listening socket (port 0 picks a free port)
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(RelayState::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Start the accept loop on the current runtime
    pub fn serve(self) -> Result<RelayHandle> {
        let addr = self.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let connection_shutdown = shutdown_tx.clone();
        let SignalingRelay { listener, state } = self;

        info!("Signaling relay listening on ws://{}", addr);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                debug!("Accepted WebSocket connection from {}", peer_addr);
                                let state = Arc::clone(&state);
                                let shutdown_rx = connection_shutdown.subscribe();
                                tokio::spawn(
                                    async move {
                                        if let Err(e) = handle_connection(stream, state, shutdown_rx).await {
                                            warn!("Connection ended with error: {}", e);
                                        }
                                    }
                                    .instrument(info_span!("relay_connection", %peer_addr)),
                                );
                            }
                            Err(e) => {
                                error!("Failed to accept WebSocket connection: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Signaling relay received shutdown signal");
                        break;
                    }
                }
            }
            info!("Signaling relay accept loop exited");
        });

        Ok(RelayHandle {
            addr,
            shutdown_tx,
            task,
        })
    }
}

/// Handle for a serving relay
pub struct RelayHandle {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// WebSocket URL clients connect to
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Stop accepting and close every connection
    pub async fn shutdown(self) {
        info!("Shutting down signaling relay");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Relay accept loop panicked: {}", e);
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<RelayState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| Error::WebSocketError(format!("Handshake failed: {}", e)))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let forward_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut announced: Option<String> = None;

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_frame(&text, &state, &mut announced, &tx).await {
                        error!("Error handling message: {}", e);
                        let response = JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string(), Value::Null);
                        if let Ok(text) = to_json(&response) {
                            let _ = tx.send(text).await;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            },
            _ = shutdown_rx.recv() => break,
        }
    }

    if let Some(peer_id) = announced {
        state.peers.write().await.remove(&peer_id);
        info!(peer = %peer_id, "Peer left the relay");
        state
            .broadcast(
                SignalingMessage::Left(PresenceParams {
                    peer_id: peer_id.clone(),
                    display_name: None,
                }),
                &peer_id,
            )
            .await;
    }

    drop(tx);
    let _ = tokio::time::timeout(CLOSE_GRACE, forward_task).await;
    Ok(())
}

async fn reply_error(
    tx: &mpsc::Sender<String>,
    code: i32,
    message: impl Into<String>,
    id: Value,
) -> Result<()> {
    let text = to_json(&JsonRpcError::new(code, message, id))?;
    tx.send(text)
        .await
        .map_err(|_| Error::WebSocketError("Connection closed".to_string()))
}

async fn reply_ok(tx: &mpsc::Sender<String>, result: Value, id: Option<Value>) -> Result<()> {
    // Notifications get no response
    let Some(id) = id else {
        return Ok(());
    };
    let text = to_json(&JsonRpcResponse::success(result, id))?;
    tx.send(text)
        .await
        .map_err(|_| Error::WebSocketError("Connection closed".to_string()))
}

async fn handle_frame(
    text: &str,
    state: &Arc<RelayState>,
    announced: &mut Option<String>,
    tx: &mpsc::Sender<String>,
) -> Result<()> {
    let request: JsonRpcRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            return reply_error(
                tx,
                error_codes::PARSE_ERROR,
                format!("Failed to parse JSON: {}", e),
                Value::Null,
            )
            .await;
        }
    };
    let request_id = request.id.clone().unwrap_or(Value::Null);

    if !methods::is_known(&request.method) {
        return reply_error(
            tx,
            error_codes::METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
            request_id,
        )
        .await;
    }

    let message = match SignalingMessage::from_request(&request) {
        Ok(message) => message,
        Err(e) => {
            return reply_error(tx, error_codes::INVALID_PARAMS, e.to_string(), request_id).await;
        }
    };

    match message {
        SignalingMessage::Announce(params) => {
            handle_announce(params, request.id, state, announced, tx).await
        }
        SignalingMessage::List(_) => {
            let own = announced.as_deref().unwrap_or_default();
            let result = PeerListResult {
                peers: state.roster_except(own).await,
            };
            reply_ok(tx, json!(result), request.id).await
        }
        SignalingMessage::Joined(_) | SignalingMessage::Left(_) => {
            reply_error(
                tx,
                error_codes::INVALID_REQUEST,
                format!("{} is sent by the relay only", request.method),
                request_id,
            )
            .await
        }
        routed => handle_routed(routed, request.id, state, announced.as_deref(), tx).await,
    }
}

async fn handle_announce(
    params: PeerAnnounceParams,
    id: Option<Value>,
    state: &Arc<RelayState>,
    announced: &mut Option<String>,
    tx: &mpsc::Sender<String>,
) -> Result<()> {
    let request_id = id.clone().unwrap_or(Value::Null);

    if params.peer_id.is_empty() {
        return reply_error(
            tx,
            error_codes::INVALID_PARAMS,
            "peer_id must not be empty",
            request_id,
        )
        .await;
    }
    if let Some(existing) = announced.as_ref() {
        return reply_error(
            tx,
            error_codes::ALREADY_ANNOUNCED,
            format!("Connection already announced as {}", existing),
            request_id,
        )
        .await;
    }

    let presence = PresenceParams {
        peer_id: params.peer_id.clone(),
        display_name: params.display_name.clone(),
    };

    {
        let mut peers = state.peers.write().await;
        if peers.contains_key(&params.peer_id) {
            drop(peers);
            return reply_error(
                tx,
                error_codes::ALREADY_ANNOUNCED,
                format!("Peer {} already announced", params.peer_id),
                request_id,
            )
            .await;
        }
        peers.insert(
            params.peer_id.clone(),
            RelayPeer {
                presence: presence.clone(),
                tx: tx.clone(),
            },
        );
        info!(peer = %params.peer_id, total = peers.len(), "Peer announced");
    }
    *announced = Some(params.peer_id.clone());

    let result = PeerListResult {
        peers: state.roster_except(&params.peer_id).await,
    };
    reply_ok(tx, json!(result), id).await?;

    state
        .broadcast(SignalingMessage::Joined(presence), &params.peer_id)
        .await;
    Ok(())
}

async fn handle_routed(
    mut message: SignalingMessage,
    id: Option<Value>,
    state: &Arc<RelayState>,
    announced: Option<&str>,
    tx: &mpsc::Sender<String>,
) -> Result<()> {
    let request_id = id.clone().unwrap_or(Value::Null);

    let Some(sender) = announced else {
        return reply_error(
            tx,
            error_codes::NOT_ANNOUNCED,
            "Announce before sending signaling messages",
            request_id,
        )
        .await;
    };
    message.stamp_sender(sender);

    let target = message.target().unwrap_or_default().to_string();
    let Some(target_tx) = state.sender_for(&target).await else {
        debug!(from = sender, to = %target, method = message.method_name(), "Target not connected");
        return reply_error(
            tx,
            error_codes::PEER_NOT_FOUND,
            format!("Peer {} not found", target),
            request_id,
        )
        .await;
    };

    let text = to_json(&message.to_request(None)?)?;
    if target_tx.send(text).await.is_err() {
        return reply_error(
            tx,
            error_codes::PEER_NOT_FOUND,
            format!("Peer {} disconnected", target),
            request_id,
        )
        .await;
    }

    debug!(from = sender, to = %target, method = message.method_name(), "Forwarded");
    reply_ok(tx, json!({ "delivered": true }), id).await
}
