//! Call coordinator
//!
//! Owns every call of the local user. It decides the role of each session
//! (caller for local intents, callee for unsolicited offers), enforces one
//! active call per remote peer, demultiplexes the shared signaling channel
//! into per-session queues and reports outcomes to the rendering surface and
//! to [`CallEvent`] subscribers.

use crate::config::CallConfig;
use crate::identity::{Credential, PeerId, PeerIdentity};
use crate::media::{MediaDevice, MediaLease, RemoteStream, RenderSurface};
use crate::negotiation::{
    CallSession, CallState, EndReason, Role, SessionContext, SessionEvent, SessionNegotiator,
    SessionObserver,
};
use crate::peer::{PeerTransportFactory, TransportEventSink};
use crate::presence::PresenceDirectory;
use crate::signaling::{SignalEnvelope, SignalPayload, SignalingTransport};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Observable call milestones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    StateChanged {
        peer: PeerId,
        session_id: Uuid,
        state: CallState,
    },
    Connected {
        peer: PeerId,
        session_id: Uuid,
    },
    CandidateRejected {
        peer: PeerId,
        session_id: Uuid,
        reason: String,
    },
    Ended {
        peer: PeerId,
        session_id: Uuid,
        reason: EndReason,
    },
}

/// External collaborators a coordinator works with
#[derive(Clone)]
pub struct Collaborators {
    pub signaling: Arc<dyn SignalingTransport>,
    pub transports: Arc<dyn PeerTransportFactory>,
    pub media: Arc<dyn MediaDevice>,
    pub presence: Arc<dyn PresenceDirectory>,
    pub renderer: Arc<dyn RenderSurface>,
}

/// Entry point for placing, answering and ending calls
///
/// Cheap to clone; clones share all sessions.
#[derive(Clone)]
pub struct CallCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    credential: Credential,
    config: CallConfig,
    transports: Arc<dyn PeerTransportFactory>,
    media: Arc<dyn MediaDevice>,
    presence: Arc<dyn PresenceDirectory>,
    registry: Arc<SessionRegistry>,
    ctx: SessionContext,
}

struct SessionHandle {
    session_id: Uuid,
    role: Role,
    state: watch::Receiver<CallState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// A claimed peer slot whose negotiator has not started yet
struct Reservation {
    session_id: Uuid,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state_tx: watch::Sender<CallState>,
}

struct SessionRegistry {
    sessions: Mutex<HashMap<PeerId, SessionHandle>>,
    outcomes: Mutex<HashMap<PeerId, EndReason>>,
    events: broadcast::Sender<CallEvent>,
    renderer: Arc<dyn RenderSurface>,
}

impl SessionRegistry {
    fn remove(&self, peer: &PeerId, session_id: Uuid) {
        let mut sessions = self.sessions.lock();
        if sessions.get(peer).map(|h| h.session_id) == Some(session_id) {
            sessions.remove(peer);
        }
    }

    fn publish(&self, event: CallEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl SessionObserver for SessionRegistry {
    fn state_changed(&self, session: &CallSession) {
        self.publish(CallEvent::StateChanged {
            peer: session.remote_peer().id.clone(),
            session_id: session.id(),
            state: session.state(),
        });
    }

    fn connected(&self, session: &CallSession, stream: RemoteStream) {
        self.renderer.attach(stream);
        self.publish(CallEvent::Connected {
            peer: session.remote_peer().id.clone(),
            session_id: session.id(),
        });
    }

    fn candidate_rejected(&self, session: &CallSession, reason: String) {
        self.publish(CallEvent::CandidateRejected {
            peer: session.remote_peer().id.clone(),
            session_id: session.id(),
            reason,
        });
    }

    fn ended(&self, session: &CallSession, stream: Option<RemoteStream>) {
        let peer = session.remote_peer().id.clone();
        let reason = session.end_reason().unwrap_or(EndReason::Completed);

        self.remove(&peer, session.id());
        self.outcomes.lock().insert(peer.clone(), reason);

        if let Some(stream) = stream {
            self.renderer.detach(stream, reason);
        }
        self.publish(CallEvent::Ended {
            peer,
            session_id: session.id(),
            reason,
        });
    }
}

impl CallCoordinator {
    /// Create a coordinator acting as `credential`'s identity
    pub fn new(credential: Credential, config: CallConfig, deps: Collaborators) -> Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let registry = Arc::new(SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(HashMap::new()),
            events,
            renderer: deps.renderer,
        });

        let ctx = SessionContext {
            local_peer: credential.peer_id().clone(),
            signaling: deps.signaling,
            observer: registry.clone(),
            answer_timeout: config.answer_timeout(),
            connect_timeout: config.connect_timeout(),
            send_timeout: config.send_timeout(),
        };

        info!(
            "Call coordinator ready for {} (max {} call(s))",
            credential.peer_id(),
            config.max_active_calls
        );

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                credential,
                config,
                transports: deps.transports,
                media: deps.media,
                presence: deps.presence,
                registry,
                ctx,
            }),
        })
    }

    pub fn local_peer(&self) -> &PeerId {
        self.inner.credential.peer_id()
    }

    pub fn config(&self) -> &CallConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.registry.events.subscribe()
    }

    /// Current state of the call with `peer`, if one is in progress
    pub fn call_state(&self, peer: &PeerId) -> Option<CallState> {
        self.inner
            .registry
            .sessions
            .lock()
            .get(peer)
            .map(|h| *h.state.borrow())
    }

    /// State updates of the call with `peer`, if one is in progress
    pub fn watch_state(&self, peer: &PeerId) -> Option<watch::Receiver<CallState>> {
        self.inner
            .registry
            .sessions
            .lock()
            .get(peer)
            .map(|h| h.state.clone())
    }

    /// Role of the call with `peer`, if one is in progress
    pub fn call_role(&self, peer: &PeerId) -> Option<Role> {
        self.inner.registry.sessions.lock().get(peer).map(|h| h.role)
    }

    /// How the most recent call with `peer` ended
    pub fn last_end_reason(&self, peer: &PeerId) -> Option<EndReason> {
        self.inner.registry.outcomes.lock().get(peer).copied()
    }

    pub fn active_calls(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.inner.registry.sessions.lock().keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Start a call to `peer`
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInCall`] if a call with `peer` is in progress
    /// - [`Error::PeerUnreachable`] if the presence directory does not list `peer`
    /// - [`Error::CallLimitReached`] if `max_active_calls` are in progress
    /// - [`Error::MediaUnavailable`] if local media cannot be acquired
    pub async fn place_call(&self, peer: &PeerId) -> Result<Uuid> {
        if peer == self.local_peer() {
            return Err(Error::InvalidState("cannot call yourself".to_string()));
        }
        if self.inner.registry.sessions.lock().contains_key(peer) {
            return Err(Error::AlreadyInCall(peer.to_string()));
        }
        let identity = self
            .inner
            .presence
            .lookup(peer)
            .ok_or_else(|| Error::PeerUnreachable(peer.to_string()))?;

        let reservation = self.reserve(peer, Role::Caller)?;
        info!("Placing call to {} ({})", peer, identity.display_name);
        self.start_session(identity, Role::Caller, reservation).await
    }

    /// Accept an unsolicited offer and start answering it
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolError`] if the offer is addressed to another peer
    /// - [`Error::Busy`] if a call with the sender is in progress (the offer
    ///   is dropped and the sender is not notified)
    /// - [`Error::MediaUnavailable`] if local media cannot be acquired (the
    ///   sender receives a hang-up)
    pub async fn handle_incoming(&self, envelope: SignalEnvelope) -> Result<Uuid> {
        if &envelope.to != self.local_peer() {
            return Err(Error::ProtocolError(format!(
                "{} from {} is addressed to {}, not {}",
                envelope.payload.kind(),
                envelope.from,
                envelope.to,
                self.local_peer()
            )));
        }
        let (identity, reservation) = self.admit_offer(envelope)?;
        self.start_callee(identity, reservation).await
    }

    /// End the call with `peer`
    ///
    /// Returns once local media has been released, with the reason the call
    /// ended. When no call with `peer` is in progress this is the reason the
    /// last one ended, so repeated calls agree; `None` if there never was one.
    pub async fn hang_up(&self, peer: &PeerId) -> Option<EndReason> {
        let events = self
            .inner
            .registry
            .sessions
            .lock()
            .get(peer)
            .map(|h| h.events.clone());

        let Some(events) = events else {
            debug!("No call with {} to hang up", peer);
            return self.last_end_reason(peer);
        };

        let (done_tx, done_rx) = oneshot::channel();
        if events.send(SessionEvent::HangUp(done_tx)).is_err() {
            return self.last_end_reason(peer);
        }
        match done_rx.await {
            Ok(reason) => Some(reason),
            // The session never started, e.g. media was refused
            Err(_) => self.last_end_reason(peer),
        }
    }

    /// Route one inbound signaling message
    ///
    /// Offers start a callee session in the background; everything else is
    /// queued on the session for the sender.
    pub fn dispatch(&self, envelope: SignalEnvelope) {
        if &envelope.to != self.local_peer() {
            debug!(
                "Dropping {} from {} addressed to {}",
                envelope.payload.kind(),
                envelope.from,
                envelope.to
            );
            return;
        }

        if let SignalPayload::Offer(_) = envelope.payload {
            match self.admit_offer(envelope) {
                Ok((identity, reservation)) => {
                    let coordinator = self.clone();
                    tokio::spawn(async move {
                        let peer = identity.id.clone();
                        if let Err(e) = coordinator.start_callee(identity, reservation).await {
                            warn!("Could not answer call from {}: {}", peer, e);
                        }
                    });
                }
                Err(e) => info!("{}", e),
            }
            return;
        }

        let events = self
            .inner
            .registry
            .sessions
            .lock()
            .get(&envelope.from)
            .map(|h| h.events.clone());

        match events {
            Some(events) => {
                let kind = envelope.payload.kind();
                if events.send(SessionEvent::Signal(envelope.payload)).is_err() {
                    debug!("Session with {} already finished, dropping {}", envelope.from, kind);
                }
            }
            None => debug!(
                "No call with {}, dropping {}",
                envelope.from,
                envelope.payload.kind()
            ),
        }
    }

    /// Run [`dispatch`](Self::dispatch) for every inbound message
    ///
    /// When the channel closes the signaling transport is gone and every
    /// call ends with [`EndReason::TransportLost`].
    pub fn spawn_dispatcher(&self, mut inbound: mpsc::Receiver<SignalEnvelope>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                coordinator.dispatch(envelope);
            }
            warn!("Signaling channel closed, ending all calls");
            coordinator.signaling_lost();
        })
    }

    /// End every call because the signaling transport is gone
    pub fn signaling_lost(&self) {
        let sessions = self.inner.registry.sessions.lock();
        for (peer, handle) in sessions.iter() {
            if handle.events.send(SessionEvent::SignalingLost).is_err() {
                debug!("Session with {} already finished", peer);
            }
        }
    }

    fn reserve(&self, peer: &PeerId, role: Role) -> Result<Reservation> {
        let mut sessions = self.inner.registry.sessions.lock();

        if sessions.contains_key(peer) {
            return Err(match role {
                Role::Caller => Error::AlreadyInCall(peer.to_string()),
                Role::Callee => Error::Busy(peer.to_string()),
            });
        }
        if sessions.len() >= self.inner.config.max_active_calls {
            return Err(match role {
                Role::Caller => Error::CallLimitReached(sessions.len()),
                Role::Callee => Error::Busy(peer.to_string()),
            });
        }

        let session_id = Uuid::new_v4();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CallState::Idle);

        sessions.insert(
            peer.clone(),
            SessionHandle {
                session_id,
                role,
                state: state_rx,
                events: events_tx.clone(),
            },
        );

        Ok(Reservation {
            session_id,
            events_tx,
            events_rx,
            state_tx,
        })
    }

    /// Claim the sender's slot and queue the offer as the session's first event
    fn admit_offer(&self, envelope: SignalEnvelope) -> Result<(PeerIdentity, Reservation)> {
        if !matches!(envelope.payload, SignalPayload::Offer(_)) {
            return Err(Error::ProtocolError(format!(
                "expected an offer from {}, got {}",
                envelope.from,
                envelope.payload.kind()
            )));
        }

        let peer = envelope.from;
        let reservation = self.reserve(&peer, Role::Callee)?;
        let _ = reservation
            .events_tx
            .send(SessionEvent::Signal(envelope.payload));

        let identity = self
            .inner
            .presence
            .lookup(&peer)
            .unwrap_or_else(|| PeerIdentity::anonymous(peer.clone()));

        info!("Incoming call from {} ({})", peer, identity.display_name);
        Ok((identity, reservation))
    }

    async fn start_callee(&self, identity: PeerIdentity, reservation: Reservation) -> Result<Uuid> {
        let peer = identity.id.clone();
        match self.start_session(identity, Role::Callee, reservation).await {
            Ok(session_id) => Ok(session_id),
            Err(e) => {
                let decline = SignalEnvelope::new(
                    self.local_peer().clone(),
                    peer.clone(),
                    SignalPayload::Hangup,
                );
                let sending = self.inner.ctx.signaling.send(decline);
                match tokio::time::timeout(self.inner.ctx.send_timeout, sending).await {
                    Ok(Ok(())) => {}
                    Ok(Err(send_err)) => {
                        debug!("Could not decline call from {}: {}", peer, send_err)
                    }
                    Err(_) => debug!("Declining call from {} timed out", peer),
                }
                Err(e)
            }
        }
    }

    async fn start_session(
        &self,
        identity: PeerIdentity,
        role: Role,
        reservation: Reservation,
    ) -> Result<Uuid> {
        let peer = identity.id.clone();
        let Reservation {
            session_id,
            events_tx,
            events_rx,
            state_tx,
        } = reservation;

        let mut media =
            match MediaLease::acquire(self.inner.media.clone(), self.inner.config.media_timeout())
                .await
            {
                Ok(media) => media,
                Err(e) => {
                    warn!("No local media for call with {}: {}", peer, e);
                    self.inner.registry.remove(&peer, session_id);
                    return Err(e);
                }
            };

        let transport = match self
            .inner
            .transports
            .create(&peer, TransportEventSink::new(events_tx.clone()))
            .await
        {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Could not create transport to {}: {}", peer, e);
                media.release();
                self.inner.registry.remove(&peer, session_id);
                return Err(e);
            }
        };

        let session = CallSession::with_id(session_id, role, identity);
        let negotiator = SessionNegotiator::new(
            session,
            transport,
            media,
            self.inner.ctx.clone(),
            state_tx,
            events_tx,
        );

        let span = info_span!("call", peer = %peer, session = %session_id);
        tokio::spawn(
            async move {
                let reason = negotiator.run(events_rx).await;
                debug!("Session task finished: {}", reason);
            }
            .instrument(span),
        );

        Ok(session_id)
    }
}
