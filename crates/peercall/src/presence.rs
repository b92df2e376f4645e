//! Presence directory: which peers can currently be called

use crate::identity::{PeerId, PeerIdentity};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Source of reachable peer identities
pub trait PresenceDirectory: Send + Sync {
    /// Snapshot of every reachable peer
    fn reachable_peers(&self) -> Vec<PeerIdentity>;

    /// Whether `peer` can be targeted by a call
    fn is_reachable(&self, peer: &PeerId) -> bool {
        self.reachable_peers().iter().any(|p| &p.id == peer)
    }

    /// Identity details for `peer`, if listed
    fn lookup(&self, peer: &PeerId) -> Option<PeerIdentity> {
        self.reachable_peers().into_iter().find(|p| &p.id == peer)
    }
}

/// In-memory roster kept up to date from join/leave notifications
#[derive(Debug, Default)]
pub struct PresenceRoster {
    peers: RwLock<BTreeMap<PeerId, PeerIdentity>>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a peer; returns true if it was not listed before
    pub fn insert(&self, identity: PeerIdentity) -> bool {
        self.peers
            .write()
            .insert(identity.id.clone(), identity)
            .is_none()
    }

    pub fn remove(&self, peer: &PeerId) -> Option<PeerIdentity> {
        self.peers.write().remove(peer)
    }

    /// Replace the whole roster
    pub fn replace(&self, identities: impl IntoIterator<Item = PeerIdentity>) {
        let mut peers = self.peers.write();
        peers.clear();
        peers.extend(identities.into_iter().map(|p| (p.id.clone(), p)));
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl PresenceDirectory for PresenceRoster {
    fn reachable_peers(&self) -> Vec<PeerIdentity> {
        self.peers.read().values().cloned().collect()
    }

    fn is_reachable(&self, peer: &PeerId) -> bool {
        self.peers.read().contains_key(peer)
    }

    fn lookup(&self, peer: &PeerId) -> Option<PeerIdentity> {
        self.peers.read().get(peer).cloned()
    }
}
