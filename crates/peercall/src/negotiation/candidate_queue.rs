//! Candidate buffering for trickle ICE
//!
//! Candidates on both sides may be discovered before they are usable. Local
//! candidates can only be sent once the local description has been
//! registered; remote candidates can only be applied once the local
//! description is registered and the remote description has been applied.
//! The queue holds them until then and hands them back in arrival order.
//!
//! The queue performs no I/O: it returns what should be flushed or applied
//! and the negotiator does the sending and applying.

use super::description::IceCandidate;
use crate::{Error, Result};
use std::collections::VecDeque;

/// What to do with a local candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDisposition {
    /// Send it to the remote peer now
    Flush(IceCandidate),
    /// Held until the local description is registered
    Held,
}

/// What to do with a remote candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDisposition {
    /// Apply it to the peer transport now
    Apply(IceCandidate),
    /// Held until both descriptions are in place
    Held,
}

/// Candidates released by a readiness change, in arrival order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    pub local: Vec<IceCandidate>,
    pub remote: Vec<IceCandidate>,
}

#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending_local: VecDeque<IceCandidate>,
    pending_remote: VecDeque<IceCandidate>,
    local_ready: bool,
    remote_ready: bool,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_local(&mut self, candidate: IceCandidate) -> LocalDisposition {
        if self.local_ready {
            LocalDisposition::Flush(candidate)
        } else {
            self.pending_local.push_back(candidate);
            LocalDisposition::Held
        }
    }

    pub fn enqueue_remote(&mut self, candidate: IceCandidate) -> RemoteDisposition {
        if self.local_ready && self.remote_ready {
            RemoteDisposition::Apply(candidate)
        } else {
            self.pending_remote.push_back(candidate);
            RemoteDisposition::Held
        }
    }

    /// Mark the local description as registered
    ///
    /// Fires once per session. Releases every held local candidate, and every
    /// held remote candidate if the remote description is already applied.
    pub fn drain_on_description_ready(&mut self) -> Result<Drained> {
        if self.local_ready {
            return Err(Error::InvalidState(
                "local description already registered".to_string(),
            ));
        }
        self.local_ready = true;

        let local = self.pending_local.drain(..).collect();
        let remote = if self.remote_ready {
            self.pending_remote.drain(..).collect()
        } else {
            Vec::new()
        };

        Ok(Drained { local, remote })
    }

    /// Mark the remote description as applied
    ///
    /// Returns the held remote candidates that became applicable.
    pub fn remote_description_applied(&mut self) -> Result<Vec<IceCandidate>> {
        if self.remote_ready {
            return Err(Error::InvalidState(
                "remote description already applied".to_string(),
            ));
        }
        self.remote_ready = true;

        if self.local_ready {
            Ok(self.pending_remote.drain(..).collect())
        } else {
            Ok(Vec::new())
        }
    }

    pub fn clear(&mut self) {
        self.pending_local.clear();
        self.pending_remote.clear();
    }

    pub fn pending_local(&self) -> usize {
        self.pending_local.len()
    }

    pub fn pending_remote(&self) -> usize {
        self.pending_remote.len()
    }

    pub fn is_local_ready(&self) -> bool {
        self.local_ready
    }
}
