//! Peer identities and the session credential
//!
//! Authentication itself happens outside this crate. The coordinator only
//! needs the [`Credential`] an [`AuthService`] handed out: its identity labels
//! every outgoing signaling message and its token is presented to the relay.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of a peer on the signaling relay
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A reachable user: stable id plus a display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub id: PeerId,
    pub display_name: String,
}

impl PeerIdentity {
    pub fn new(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Identity whose display name is its id (used when nothing better is known)
    pub fn anonymous(id: PeerId) -> Self {
        let display_name = id.to_string();
        Self { id, display_name }
    }
}

/// Session credential issued by the authentication service
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identity: PeerIdentity,
    token: String,
}

impl Credential {
    pub fn new(identity: PeerIdentity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: token.into(),
        }
    }

    /// Resolve a bearer token into a credential through the auth service
    pub async fn from_session(auth: &dyn AuthService, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::Unauthenticated("empty session token".to_string()));
        }
        let identity = auth.current_user(token).await?;
        Ok(Self::new(identity, token))
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.identity.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Account operations provided by the application's authentication backend
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange username and password for a credential
    async fn login(&self, username: &str, password: &str) -> Result<Credential>;

    /// Create an account and return its credential
    async fn register(&self, username: &str, password: &str) -> Result<Credential>;

    /// Invalidate a credential
    async fn logout(&self, credential: &Credential) -> Result<()>;

    /// Identity behind a session token
    async fn current_user(&self, token: &str) -> Result<PeerIdentity>;
}
