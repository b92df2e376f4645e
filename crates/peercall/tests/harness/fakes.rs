//! Scripted collaborators for coordinator tests

use async_trait::async_trait;
use parking_lot::Mutex;
use peercall::{
    EndReason, Error, IceCandidate, LocalTrack, MediaDevice, PeerId, PeerTransport,
    PeerTransportFactory, RemoteStream, RemoteTrack, RenderSurface, Result, SessionDescription,
    TrackKind, TransportEvent, TransportEventSink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Peer transport that records what the negotiator asked of it
pub struct FakeTransport {
    peer: PeerId,
    sink: TransportEventSink,
    /// Candidates emitted while the local description is being created
    gathered: Vec<IceCandidate>,
    pub applied: Mutex<Vec<String>>,
    pub remote_descriptions: Mutex<Vec<SessionDescription>>,
    pub attached_tracks: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeTransport {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Inject a transport event into the owning session
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sink.emit(event)
    }

    pub fn deliver_track(&self, id: &str, kind: TrackKind) -> bool {
        self.emit(TransportEvent::TrackReceived(RemoteTrack::new(id, kind, "remote")))
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn gather(&self) {
        for candidate in &self.gathered {
            self.sink
                .emit(TransportEvent::LocalCandidate(candidate.clone()));
        }
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn attach_local_tracks(&self, tracks: &[LocalTrack]) -> Result<()> {
        self.attached_tracks.fetch_add(tracks.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.gather();
        Ok(SessionDescription::offer(format!("v=0 offer to {}", self.peer)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.gather();
        Ok(SessionDescription::answer(format!("v=0 answer to {}", self.peer)))
    }

    async fn apply_remote_description(&self, description: &SessionDescription) -> Result<()> {
        self.remote_descriptions.lock().push(description.clone());
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        if candidate.candidate.contains("bogus") {
            return Err(Error::CandidateRejected(candidate.candidate.clone()));
        }
        self.applied.lock().push(candidate.candidate.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`FakeTransport`]s and keeps the latest one per peer
#[derive(Default)]
pub struct FakeTransportFactory {
    gathered: Mutex<Vec<IceCandidate>>,
    transports: Mutex<HashMap<PeerId, Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    /// Every transport created afterwards gathers these candidates
    pub fn gather(&self, candidates: &[&str]) {
        *self.gathered.lock() = candidates
            .iter()
            .enumerate()
            .map(|(n, c)| IceCandidate::new(*c).with_mid("0", n as u16))
            .collect();
    }

    pub fn transport(&self, peer: &str) -> Option<Arc<FakeTransport>> {
        self.transports.lock().get(&PeerId::from(peer)).cloned()
    }

    pub fn created(&self) -> usize {
        self.transports.lock().len()
    }
}

#[async_trait]
impl PeerTransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        peer: &PeerId,
        events: TransportEventSink,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = Arc::new(FakeTransport {
            peer: peer.clone(),
            sink: events,
            gathered: self.gathered.lock().clone(),
            applied: Mutex::new(Vec::new()),
            remote_descriptions: Mutex::new(Vec::new()),
            attached_tracks: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.transports
            .lock()
            .insert(peer.clone(), Arc::clone(&transport));
        Ok(transport)
    }
}

/// How [`FakeMedia`] answers a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Grant,
    /// Grant after the user takes this long to answer the prompt
    GrantAfter(Duration),
    Deny,
    /// Never answer
    Hang,
}

pub struct FakeMedia {
    permission: Mutex<Permission>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            permission: Mutex::new(Permission::Grant),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }
}

impl FakeMedia {
    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock() = permission;
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevice for FakeMedia {
    async fn acquire(&self) -> Result<Vec<LocalTrack>> {
        let permission = *self.permission.lock();
        match permission {
            Permission::Grant | Permission::GrantAfter(_) => {
                if let Permission::GrantAfter(delay) = permission {
                    tokio::time::sleep(delay).await;
                }
                self.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(vec![
                    LocalTrack::new("mic", TrackKind::Audio, "local"),
                    LocalTrack::new("cam", TrackKind::Video, "local"),
                ])
            }
            Permission::Deny => Err(Error::MediaUnavailable("permission denied".to_string())),
            Permission::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::MediaUnavailable("never answered".to_string()))
            }
        }
    }

    fn release(&self, _tracks: &[LocalTrack]) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Render surface that remembers attach/detach calls
#[derive(Default)]
pub struct RecordingRenderer {
    pub attached: Mutex<Vec<RemoteStream>>,
    pub detached: Mutex<Vec<(PeerId, EndReason)>>,
}

impl RecordingRenderer {
    pub fn attached_peers(&self) -> Vec<PeerId> {
        self.attached
            .lock()
            .iter()
            .map(|stream| stream.peer().clone())
            .collect()
    }

    pub fn detached(&self) -> Vec<(PeerId, EndReason)> {
        self.detached.lock().clone()
    }
}

impl RenderSurface for RecordingRenderer {
    fn attach(&self, stream: RemoteStream) {
        self.attached.lock().push(stream);
    }

    fn detach(&self, stream: RemoteStream, reason: EndReason) {
        self.detached.lock().push((stream.peer().clone(), reason));
    }
}
