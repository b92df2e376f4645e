//! WebRTC peer transport built on `webrtc`

use super::{PeerTransport, PeerTransportFactory, TransportEvent, TransportEventSink};
use crate::config::CallConfig;
use crate::identity::PeerId;
use crate::media::{LocalTrack, RemoteTrack, TrackKind};
use crate::negotiation::{IceCandidate, SdpType, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds [`WebRtcPeerTransport`]s with the configured ICE servers
#[derive(Debug, Clone)]
pub struct WebRtcTransportFactory {
    config: CallConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: CallConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn ice_servers(&self) -> Vec<RTCIceServer> {
        self.config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(self.config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect()
    }
}

#[async_trait]
impl PeerTransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        peer: &PeerId,
        events: TransportEventSink,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = WebRtcPeerTransport::new(peer.clone(), self.ice_servers(), events).await?;
        Ok(Arc::new(transport))
    }
}

/// One `RTCPeerConnection` to a remote peer
pub struct WebRtcPeerTransport {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,

    /// Local tracks and their RTP senders, retained for the call's lifetime
    local_tracks: Mutex<Vec<Arc<TrackLocalStaticSample>>>,
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

impl WebRtcPeerTransport {
    #[instrument(skip(ice_servers, events), fields(peer_id = %peer_id))]
    pub async fn new(
        peer_id: PeerId,
        ice_servers: Vec<RTCIceServer>,
        events: TransportEventSink,
    ) -> Result<Self> {
        info!("Creating peer connection for {}", peer_id);

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::WebRtcError(format!("Failed to create peer connection: {}", e))
            })?);

        Self::install_handlers(&peer_connection, &peer_id, events);

        Ok(Self {
            peer_id,
            peer_connection,
            local_tracks: Mutex::new(Vec::new()),
            senders: Mutex::new(Vec::new()),
        })
    }

    fn install_handlers(pc: &RTCPeerConnection, peer_id: &PeerId, events: TransportEventSink) {
        let sink = events.clone();
        let peer = peer_id.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            let peer = peer.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("ICE gathering complete for {}", peer);
                    sink.emit(TransportEvent::GatheringComplete);
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        sink.emit(TransportEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!("Failed to serialize local candidate for {}: {}", peer, e),
                }
            })
        }));

        let sink = events.clone();
        let peer = peer_id.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let sink = sink.clone();
                let peer = peer.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Video => TrackKind::Video,
                        _ => TrackKind::Audio,
                    };
                    info!("Remote {} track {} from {}", kind, track.id(), peer);
                    sink.emit(TransportEvent::TrackReceived(RemoteTrack {
                        id: track.id(),
                        kind,
                        stream_id: track.stream_id(),
                        track: Some(track),
                    }));
                })
            },
        ));

        let sink = events;
        let peer = peer_id.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let sink = sink.clone();
            let peer = peer.clone();
            Box::pin(async move {
                debug!("Peer {} connection state: {}", peer, state);
                match state {
                    RTCPeerConnectionState::Connected => {
                        sink.emit(TransportEvent::Connected);
                    }
                    RTCPeerConnectionState::Failed => {
                        sink.emit(TransportEvent::Failed("ICE connectivity failed".to_string()));
                    }
                    RTCPeerConnectionState::Disconnected => {
                        warn!("Peer {} disconnected, waiting for recovery or failure", peer);
                    }
                    _ => {}
                }
            })
        }));
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Sample writers for the attached local tracks
    pub fn local_tracks(&self) -> Vec<Arc<TrackLocalStaticSample>> {
        self.local_tracks.lock().clone()
    }

    fn codec_for(kind: TrackKind) -> RTCRtpCodecCapability {
        match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
        }
    }

    async fn local_description_sdp(&self) -> Result<String> {
        self.peer_connection
            .local_description()
            .await
            .map(|desc| desc.sdp)
            .ok_or_else(|| Error::SdpError("No local description after setting it".to_string()))
    }
}

#[async_trait]
impl PeerTransport for WebRtcPeerTransport {
    async fn attach_local_tracks(&self, tracks: &[LocalTrack]) -> Result<()> {
        for local in tracks {
            let track = match &local.source {
                Some(source) => Arc::clone(source),
                None => Arc::new(TrackLocalStaticSample::new(
                    Self::codec_for(local.kind),
                    local.id.clone(),
                    local.stream_id.clone(),
                )),
            };

            let sender = self
                .peer_connection
                .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| {
                    Error::MediaTrackError(format!("Failed to add {} track: {}", local.kind, e))
                })?;

            debug!("Attached {} track {} for {}", local.kind, local.id, self.peer_id);
            self.local_tracks.lock().push(track);
            self.senders.lock().push(sender);
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        debug!("Created SDP offer for peer {}", self.peer_id);
        Ok(SessionDescription::offer(self.local_description_sdp().await?))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        self.peer_connection
            .set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        debug!("Created SDP answer for peer {}", self.peer_id);
        Ok(SessionDescription::answer(self.local_description_sdp().await?))
    }

    async fn apply_remote_description(&self, description: &SessionDescription) -> Result<()> {
        let sdp = description.sdp.clone();
        let remote = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(sdp),
            SdpType::Answer => RTCSessionDescription::answer(sdp),
        }
        .map_err(|e| Error::SdpError(format!("Failed to parse remote description: {}", e)))?;

        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::CandidateRejected(format!("{}: {}", candidate.candidate, e)))
    }

    async fn close(&self) -> Result<()> {
        info!("Closing peer connection for peer {}", self.peer_id);
        self.senders.lock().clear();
        self.local_tracks.lock().clear();
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::PeerConnectionError(format!("Failed to close connection: {}", e)))
    }
}
