//! Error types for call negotiation

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while placing, answering or relaying calls
///
/// Session outcomes (timeouts, lost transport, a declined call) are not
/// errors: they end the session with an
/// [`EndReason`](crate::negotiation::EndReason) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A call with this peer is already active (local intent)
    #[error("Already in a call with peer {0}")]
    AlreadyInCall(String),

    /// A call with this peer is already active (incoming offer)
    #[error("Busy: offer from peer {0} rejected")]
    Busy(String),

    /// The configured number of simultaneous calls is in use
    #[error("Call limit reached: {0} active call(s)")]
    CallLimitReached(usize),

    /// The presence directory does not list the peer
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    /// The peer transport refused a remote candidate
    #[error("Candidate rejected: {0}")]
    CandidateRejected(String),

    /// Local media could not be acquired
    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    /// Credential missing or refused
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// An operation was attempted in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Signaling connection error
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// Peer not found on the signaling relay
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// Malformed signaling message
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    OperationTimeout(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SignalingError(_)
                | Error::OperationTimeout(_)
                | Error::WebSocketError(_)
                | Error::MediaUnavailable(_)
                | Error::IoError(_)
        )
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error was raised by call policy (no session was created)
    pub fn is_policy_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyInCall(_)
                | Error::Busy(_)
                | Error::CallLimitReached(_)
                | Error::PeerUnreachable(_)
        )
    }

    /// Check if this error is a peer negotiation error
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            Error::CandidateRejected(_)
                | Error::SdpError(_)
                | Error::PeerConnectionError(_)
                | Error::InvalidState(_)
        )
    }
}
