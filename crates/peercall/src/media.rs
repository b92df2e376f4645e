//! Local media acquisition and remote stream handles
//!
//! Capture devices and rendering surfaces live outside the crate. A
//! [`MediaDevice`] hands out local tracks; a [`MediaLease`] keeps them for the
//! lifetime of one call and gives them back on every exit path. Remote tracks
//! are collected in a [`RemoteStream`] that a [`RenderSurface`] receives once
//! the call connects.

use crate::identity::PeerId;
use crate::negotiation::EndReason;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// A captured local track
///
/// `source` carries the sample writer when the device feeds a WebRTC track
/// directly; without it the peer transport creates one for the track.
#[derive(Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
    pub source: Option<Arc<TrackLocalStaticSample>>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: stream_id.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<TrackLocalStaticSample>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// A capture device (microphone, camera, screen)
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Request access and start capture
    ///
    /// Denied permission must be reported as [`Error::MediaUnavailable`].
    async fn acquire(&self) -> Result<Vec<LocalTrack>>;

    /// Stop capture of tracks previously returned by `acquire`
    fn release(&self, tracks: &[LocalTrack]);
}

/// Scoped ownership of acquired local media
///
/// Released exactly once, either explicitly or when dropped.
pub struct MediaLease {
    device: Arc<dyn MediaDevice>,
    tracks: Vec<LocalTrack>,
    released: bool,
}

impl MediaLease {
    /// Acquire local media, waiting at most `timeout` for permission
    pub async fn acquire(device: Arc<dyn MediaDevice>, timeout: Duration) -> Result<Self> {
        let tracks = match tokio::time::timeout(timeout, device.acquire()).await {
            Ok(Ok(tracks)) => tracks,
            Ok(Err(Error::MediaUnavailable(reason))) => {
                return Err(Error::MediaUnavailable(reason))
            }
            Ok(Err(e)) => return Err(Error::MediaUnavailable(e.to_string())),
            Err(_) => {
                return Err(Error::MediaUnavailable(format!(
                    "permission not granted within {}ms",
                    timeout.as_millis()
                )))
            }
        };

        if tracks.is_empty() {
            return Err(Error::MediaUnavailable(
                "device produced no tracks".to_string(),
            ));
        }

        debug!("Acquired {} local track(s)", tracks.len());

        Ok(Self {
            device,
            tracks,
            released: false,
        })
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Give the tracks back to the device
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!("Releasing {} local track(s)", self.tracks.len());
        self.device.release(&self.tracks);
    }
}

impl Drop for MediaLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("Media lease dropped without explicit release");
            self.release();
        }
    }
}

/// A track received from the remote peer
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
    pub track: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: stream_id.into(),
            track: None,
        }
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

/// Live handle to the media arriving from one peer
///
/// Clones share state. Tracks arriving after the call connected are added to
/// the same handle; once the call ends the handle is emptied and stops being
/// live.
#[derive(Clone)]
pub struct RemoteStream {
    inner: Arc<RemoteStreamInner>,
}

struct RemoteStreamInner {
    peer: PeerId,
    tracks: RwLock<Vec<RemoteTrack>>,
    live: AtomicBool,
}

impl RemoteStream {
    pub(crate) fn new(peer: PeerId) -> Self {
        Self {
            inner: Arc::new(RemoteStreamInner {
                peer,
                tracks: RwLock::new(Vec::new()),
                live: AtomicBool::new(true),
            }),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.inner.peer
    }

    pub fn tracks(&self) -> Vec<RemoteTrack> {
        self.inner.tracks.read().clone()
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    pub(crate) fn push(&self, track: RemoteTrack) {
        if self.is_live() {
            self.inner.tracks.write().push(track);
        }
    }

    pub(crate) fn end(&self) {
        self.inner.live.store(false, Ordering::Release);
        self.inner.tracks.write().clear();
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("peer", &self.inner.peer)
            .field("tracks", &self.inner.tracks.read().len())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Consumer of negotiated remote media
pub trait RenderSurface: Send + Sync {
    /// The call with `stream.peer()` connected
    fn attach(&self, stream: RemoteStream);

    /// A previously attached call ended; the stream handle is already torn down
    fn detach(&self, stream: RemoteStream, reason: EndReason);
}
