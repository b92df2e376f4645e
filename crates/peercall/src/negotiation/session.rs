//! Call session record and its state machine

use super::description::{SdpType, SessionDescription};
use crate::identity::PeerIdentity;
use crate::media::{LocalTrack, RemoteTrack};
use crate::{Error, Result};
use std::fmt;
use std::time::SystemTime;
use tokio::time::Instant;
use uuid::Uuid;

/// Which side initiated the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Callee,
}

/// Negotiation state of one call
///
/// Transitions only move forward:
///
/// ```text
/// Caller: Idle -> Offering -> AwaitingAnswer -> Connecting -> Connected
/// Callee: Idle -> Answering -> Connecting -> Connected
/// any non-terminal state -> Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Offering,
    AwaitingAnswer,
    Answering,
    Connecting,
    Connected,
    Ended,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended)
    }

    /// Negotiation has started and not yet ended
    pub fn is_active(&self) -> bool {
        !matches!(self, CallState::Idle | CallState::Ended)
    }

    fn allows(&self, role: Role, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Ended, _) => false,
            (_, Ended) => true,
            (Idle, Offering) => role == Role::Caller,
            (Idle, Answering) => role == Role::Callee,
            (Offering, AwaitingAnswer) => true,
            (AwaitingAnswer, Connecting) | (Answering, Connecting) => true,
            (Connecting, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Hung up by either side after or during a normal call
    Completed,
    /// The remote peer hung up before the call connected
    PeerDeclined,
    /// No answer or no connectivity within the configured bound
    Timeout,
    /// Signaling or media transport failed
    TransportLost,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One peer's view of one call
#[derive(Debug)]
pub struct CallSession {
    id: Uuid,
    role: Role,
    remote_peer: PeerIdentity,
    state: CallState,
    state_entered_at: Instant,
    created_at: SystemTime,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    local_tracks: Vec<LocalTrack>,
    remote_tracks: Vec<RemoteTrack>,
    end_reason: Option<EndReason>,
}

impl CallSession {
    pub fn new(role: Role, remote_peer: PeerIdentity) -> Self {
        Self::with_id(Uuid::new_v4(), role, remote_peer)
    }

    pub(crate) fn with_id(id: Uuid, role: Role, remote_peer: PeerIdentity) -> Self {
        Self {
            id,
            role,
            remote_peer,
            state: CallState::Idle,
            state_entered_at: Instant::now(),
            created_at: SystemTime::now(),
            local_description: None,
            remote_description: None,
            local_tracks: Vec::new(),
            remote_tracks: Vec::new(),
            end_reason: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote_peer(&self) -> &PeerIdentity {
        &self.remote_peer
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn state_entered_at(&self) -> Instant {
        self.state_entered_at
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn local_tracks(&self) -> &[LocalTrack] {
        &self.local_tracks
    }

    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    /// Move to `next`, rejecting anything but a forward step
    pub fn transition(&mut self, next: CallState) -> Result<()> {
        if !self.state.allows(self.role, next) {
            return Err(Error::InvalidState(format!(
                "{:?} cannot move from {} to {}",
                self.role, self.state, next
            )));
        }
        self.state = next;
        self.state_entered_at = Instant::now();
        Ok(())
    }

    /// Terminal transition; a no-op once already ended
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = CallState::Ended;
        self.state_entered_at = Instant::now();
        self.end_reason = Some(reason);
        true
    }

    /// Record the description this side produced
    ///
    /// Callers register their offer while Offering, callees their answer
    /// while Answering. Set at most once.
    pub fn set_local_description(&mut self, description: SessionDescription) -> Result<()> {
        if self.local_description.is_some() {
            return Err(Error::InvalidState(
                "local description already set".to_string(),
            ));
        }
        let expected = match self.role {
            Role::Caller => (CallState::Offering, SdpType::Offer),
            Role::Callee => (CallState::Answering, SdpType::Answer),
        };
        if (self.state, description.sdp_type) != expected {
            return Err(Error::InvalidState(format!(
                "cannot set local {:?} in state {}",
                description.sdp_type, self.state
            )));
        }
        self.local_description = Some(description);
        Ok(())
    }

    /// Record the description received from the remote peer
    ///
    /// Callers accept the answer while AwaitingAnswer, callees the offer
    /// while Answering. Set at most once.
    pub fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        if self.remote_description.is_some() {
            return Err(Error::InvalidState(
                "remote description already set".to_string(),
            ));
        }
        let expected = match self.role {
            Role::Caller => (CallState::AwaitingAnswer, SdpType::Answer),
            Role::Callee => (CallState::Answering, SdpType::Offer),
        };
        if (self.state, description.sdp_type) != expected {
            return Err(Error::InvalidState(format!(
                "cannot set remote {:?} in state {}",
                description.sdp_type, self.state
            )));
        }
        self.remote_description = Some(description);
        Ok(())
    }

    pub(crate) fn set_local_tracks(&mut self, tracks: Vec<LocalTrack>) {
        self.local_tracks = tracks;
    }

    pub(crate) fn add_remote_track(&mut self, track: RemoteTrack) {
        self.remote_tracks.push(track);
    }

    pub(crate) fn release_tracks(&mut self) {
        self.local_tracks.clear();
        self.remote_tracks.clear();
    }
}
