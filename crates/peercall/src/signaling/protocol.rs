//! JSON-RPC 2.0 signaling protocol types
//!
//! Routed messages (`peer.offer`, `peer.answer`, `peer.ice_candidate`,
//! `peer.hangup`) are sent by clients as requests and delivered to the target
//! as notifications carrying the sender in `from`. The relay overwrites
//! `from` with the identity the connection announced, so clients cannot
//! spoof each other.

use super::{SignalEnvelope, SignalPayload};
use crate::identity::{PeerId, PeerIdentity};
use crate::negotiation::{IceCandidate, SessionDescription};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Method name to invoke
    pub method: String,

    /// Method parameters
    #[serde(default)]
    pub params: Value,

    /// Request ID for matching with response (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response (success)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub result: Value,
    pub id: Value,
}

/// JSON-RPC 2.0 error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub error: ErrorObject,
    pub id: Value,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id,
        }
    }
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error: ErrorObject {
                code,
                message: message.into(),
                data: None,
            },
            id,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes plus relay-specific ones
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;

    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;

    /// The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;

    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Target peer is not connected to the relay
    pub const PEER_NOT_FOUND: i32 = -32000;

    /// The connection has not announced an identity yet
    pub const NOT_ANNOUNCED: i32 = -32001;

    /// The connection (or another one) already announced this identity
    pub const ALREADY_ANNOUNCED: i32 = -32002;
}

/// Method names
pub mod methods {
    pub const ANNOUNCE: &str = "peer.announce";
    pub const OFFER: &str = "peer.offer";
    pub const ANSWER: &str = "peer.answer";
    pub const ICE_CANDIDATE: &str = "peer.ice_candidate";
    pub const HANGUP: &str = "peer.hangup";
    pub const LIST: &str = "peer.list";
    pub const JOINED: &str = "peer.joined";
    pub const LEFT: &str = "peer.left";

    pub const ALL: [&str; 8] = [ANNOUNCE, OFFER, ANSWER, ICE_CANDIDATE, HANGUP, LIST, JOINED, LEFT];

    pub fn is_known(method: &str) -> bool {
        ALL.contains(&method)
    }
}

/// Parameters for peer.announce
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerAnnounceParams {
    pub peer_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Session token from the authentication service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Parameters for peer.offer and peer.answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescriptionParams {
    /// Sender peer ID (set by the relay on delivery)
    #[serde(default)]
    pub from: String,

    /// Recipient peer ID
    pub to: String,

    pub sdp: String,
}

/// Parameters for peer.ice_candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceCandidateParams {
    #[serde(default)]
    pub from: String,

    pub to: String,

    pub candidate: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Parameters for peer.hangup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HangupParams {
    #[serde(default)]
    pub from: String,

    pub to: String,
}

/// Parameters for peer.list (none)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListParams {}

/// A peer entry in peer.joined / peer.left and list results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceParams {
    pub peer_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PresenceParams {
    pub fn from_identity(identity: &PeerIdentity) -> Self {
        Self {
            peer_id: identity.id.to_string(),
            display_name: Some(identity.display_name.clone()),
        }
    }

    pub fn into_identity(self) -> PeerIdentity {
        match self.display_name {
            Some(name) => PeerIdentity::new(self.peer_id, name),
            None => PeerIdentity::anonymous(PeerId::from(self.peer_id)),
        }
    }
}

/// Result of peer.announce and peer.list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PeerListResult {
    pub peers: Vec<PresenceParams>,
}

/// Signaling message types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", content = "params")]
pub enum SignalingMessage {
    /// Register this connection's identity with the relay
    #[serde(rename = "peer.announce")]
    Announce(PeerAnnounceParams),

    #[serde(rename = "peer.offer")]
    Offer(DescriptionParams),

    #[serde(rename = "peer.answer")]
    Answer(DescriptionParams),

    #[serde(rename = "peer.ice_candidate")]
    IceCandidate(IceCandidateParams),

    #[serde(rename = "peer.hangup")]
    Hangup(HangupParams),

    /// Ask the relay for every announced peer
    #[serde(rename = "peer.list")]
    List(ListParams),

    /// Relay notification: a peer announced itself
    #[serde(rename = "peer.joined")]
    Joined(PresenceParams),

    /// Relay notification: a peer disconnected
    #[serde(rename = "peer.left")]
    Left(PresenceParams),
}

impl SignalingMessage {
    pub fn method_name(&self) -> &'static str {
        match self {
            SignalingMessage::Announce(_) => methods::ANNOUNCE,
            SignalingMessage::Offer(_) => methods::OFFER,
            SignalingMessage::Answer(_) => methods::ANSWER,
            SignalingMessage::IceCandidate(_) => methods::ICE_CANDIDATE,
            SignalingMessage::Hangup(_) => methods::HANGUP,
            SignalingMessage::List(_) => methods::LIST,
            SignalingMessage::Joined(_) => methods::JOINED,
            SignalingMessage::Left(_) => methods::LEFT,
        }
    }

    /// Wrap into a JSON-RPC request (a notification when `id` is `None`)
    pub fn to_request(&self, id: Option<Value>) -> Result<JsonRpcRequest> {
        let mut value = serde_json::to_value(self).map_err(|e| {
            Error::SerializationError(format!("Failed to serialize {}: {}", self.method_name(), e))
        })?;
        let params = value
            .get_mut("params")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Default::default()));

        Ok(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: self.method_name().to_string(),
            params,
            id,
        })
    }

    pub fn from_request(request: &JsonRpcRequest) -> Result<Self> {
        if !methods::is_known(&request.method) {
            return Err(Error::ProtocolError(format!(
                "Unknown method: {}",
                request.method
            )));
        }
        let params = match &request.params {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(serde_json::json!({
            "method": request.method,
            "params": params,
        }))
        .map_err(|e| {
            Error::ProtocolError(format!("Invalid params for {}: {}", request.method, e))
        })
    }

    /// Encode a routed envelope
    pub fn from_envelope(envelope: &SignalEnvelope) -> Self {
        let from = envelope.from.to_string();
        let to = envelope.to.to_string();
        match &envelope.payload {
            SignalPayload::Offer(desc) => SignalingMessage::Offer(DescriptionParams {
                from,
                to,
                sdp: desc.sdp.clone(),
            }),
            SignalPayload::Answer(desc) => SignalingMessage::Answer(DescriptionParams {
                from,
                to,
                sdp: desc.sdp.clone(),
            }),
            SignalPayload::IceCandidate(candidate) => {
                SignalingMessage::IceCandidate(IceCandidateParams {
                    from,
                    to,
                    candidate: candidate.candidate.clone(),
                    sdp_mid: candidate.sdp_mid.clone(),
                    sdp_m_line_index: candidate.sdp_mline_index,
                })
            }
            SignalPayload::Hangup => SignalingMessage::Hangup(HangupParams { from, to }),
        }
    }

    /// Decode a routed message; `None` for relay control messages
    pub fn into_envelope(self) -> Option<SignalEnvelope> {
        let (from, to, payload) = match self {
            SignalingMessage::Offer(p) => (p.from, p.to, SignalPayload::Offer(SessionDescription::offer(p.sdp))),
            SignalingMessage::Answer(p) => {
                (p.from, p.to, SignalPayload::Answer(SessionDescription::answer(p.sdp)))
            }
            SignalingMessage::IceCandidate(p) => (
                p.from,
                p.to,
                SignalPayload::IceCandidate(IceCandidate {
                    candidate: p.candidate,
                    sdp_mid: p.sdp_mid,
                    sdp_mline_index: p.sdp_m_line_index,
                }),
            ),
            SignalingMessage::Hangup(p) => (p.from, p.to, SignalPayload::Hangup),
            _ => return None,
        };
        Some(SignalEnvelope::new(PeerId::from(from), PeerId::from(to), payload))
    }

    /// Target of a routed message
    pub fn target(&self) -> Option<&str> {
        match self {
            SignalingMessage::Offer(p) | SignalingMessage::Answer(p) => Some(&p.to),
            SignalingMessage::IceCandidate(p) => Some(&p.to),
            SignalingMessage::Hangup(p) => Some(&p.to),
            _ => None,
        }
    }

    /// Overwrite the sender of a routed message
    pub fn stamp_sender(&mut self, sender: &str) {
        match self {
            SignalingMessage::Offer(p) | SignalingMessage::Answer(p) => p.from = sender.to_string(),
            SignalingMessage::IceCandidate(p) => p.from = sender.to_string(),
            SignalingMessage::Hangup(p) => p.from = sender.to_string(),
            _ => {}
        }
    }
}

/// One parsed text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl Frame {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::SerializationError(format!("Invalid JSON: {}", e)))?;

        let frame = if value.get("method").is_some() {
            serde_json::from_value(value).map(Frame::Request)
        } else if value.get("error").is_some() {
            serde_json::from_value(value).map(Frame::Error)
        } else {
            serde_json::from_value(value).map(Frame::Response)
        };

        frame.map_err(|e| Error::ProtocolError(format!("Invalid JSON-RPC frame: {}", e)))
    }
}

/// Serialize any frame to its JSON text
pub fn to_json<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame)
        .map_err(|e| Error::SerializationError(format!("Failed to serialize frame: {}", e)))
}
