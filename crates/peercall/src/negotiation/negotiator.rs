//! Session negotiator
//!
//! Each call runs one negotiator task that owns the [`CallSession`], its
//! [`CandidateQueue`], the peer transport and the media lease. Signaling
//! messages, transport events and hang-up requests all arrive on the same
//! queue and are handled one at a time, so a hang-up can never interleave
//! with a half-finished transition. Outbound signaling goes through an
//! [`Outbox`] so a slow peer never stalls the loop.

use super::candidate_queue::{CandidateQueue, LocalDisposition, RemoteDisposition};
use super::description::{IceCandidate, SessionDescription};
use super::outbox::Outbox;
use super::session::{CallSession, CallState, EndReason, Role};
use crate::identity::PeerId;
use crate::media::{MediaLease, RemoteStream};
use crate::peer::{PeerTransport, TransportEvent};
use crate::signaling::{SignalPayload, SignalingTransport};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Input to a session's serialized event queue
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Signal(SignalPayload),
    Transport(TransportEvent),
    HangUp(oneshot::Sender<EndReason>),
    SignalingLost,
    /// A description could not be delivered or the channel stalled
    SignalingFailed(String),
}

/// Receives session milestones (implemented by the coordinator's registry)
pub(crate) trait SessionObserver: Send + Sync {
    fn state_changed(&self, session: &CallSession);
    fn connected(&self, session: &CallSession, stream: RemoteStream);
    fn candidate_rejected(&self, session: &CallSession, reason: String);
    /// `stream` is set when the call had been handed to the renderer
    fn ended(&self, session: &CallSession, stream: Option<RemoteStream>);
}

/// Shared dependencies of every negotiator started by one coordinator
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub local_peer: PeerId,
    pub signaling: Arc<dyn SignalingTransport>,
    pub observer: Arc<dyn SessionObserver>,
    pub answer_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

pub(crate) struct SessionNegotiator {
    session: CallSession,
    queue: CandidateQueue,
    transport: Arc<dyn PeerTransport>,
    media: MediaLease,
    outbox: Outbox,
    ctx: SessionContext,
    state_tx: watch::Sender<CallState>,
    stream: RemoteStream,
    /// A description went out, so the remote side knows about the call
    signalled: bool,
    /// Track or connectivity observed, possibly before Connecting
    media_flowing: bool,
    rendered: bool,
}

impl SessionNegotiator {
    pub(crate) fn new(
        session: CallSession,
        transport: Arc<dyn PeerTransport>,
        media: MediaLease,
        ctx: SessionContext,
        state_tx: watch::Sender<CallState>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let remote = session.remote_peer().id.clone();
        let outbox = Outbox::spawn(
            ctx.local_peer.clone(),
            remote.clone(),
            ctx.signaling.clone(),
            ctx.send_timeout,
            events,
        );
        Self {
            session,
            queue: CandidateQueue::new(),
            transport,
            media,
            outbox,
            ctx,
            state_tx,
            stream: RemoteStream::new(remote),
            signalled: false,
            media_flowing: false,
            rendered: false,
        }
    }

    /// Process events until the session ends
    pub(crate) async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) -> EndReason {
        info!(
            "Starting {:?} session {} with {}",
            self.session.role(),
            self.session.id(),
            self.remote()
        );

        if self.session.role() == Role::Caller {
            // A hang-up queued while media was being acquired wins over the offer
            while let Ok(event) = events.try_recv() {
                self.handle_event(event).await;
            }
        }

        if self.session.role() == Role::Caller && !self.session.state().is_terminal() {
            if let Err(e) = self.start_offer().await {
                warn!("Failed to offer a call to {}: {}", self.remote(), e);
                self.finish(EndReason::TransportLost, true).await;
            }
        }

        while !self.session.state().is_terminal() {
            let deadline = self.deadline();
            let timer = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => self.finish(EndReason::TransportLost, true).await,
                },
                _ = timer => {
                    warn!(
                        "Session with {} timed out in {}",
                        self.remote(),
                        self.session.state()
                    );
                    self.finish(EndReason::Timeout, true).await;
                }
            }
        }

        let reason = self.session.end_reason().unwrap_or(EndReason::Completed);

        // Acknowledge hang-ups that raced with the end
        events.close();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::HangUp(done) = event {
                let _ = done.send(reason);
            }
        }

        self.outbox.drained().await;
        reason
    }

    fn remote(&self) -> &PeerId {
        &self.session.remote_peer().id
    }

    fn deadline(&self) -> Option<Instant> {
        let bound = match self.session.state() {
            CallState::AwaitingAnswer => self.ctx.answer_timeout,
            CallState::Connecting => self.ctx.connect_timeout,
            _ => return None,
        };
        Some(self.session.state_entered_at() + bound)
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Signal(payload) => self.handle_signal(payload).await,
            SessionEvent::Transport(event) => self.handle_transport(event).await,
            SessionEvent::HangUp(done) => {
                self.finish(EndReason::Completed, true).await;
                let _ = done.send(self.session.end_reason().unwrap_or(EndReason::Completed));
            }
            SessionEvent::SignalingLost => self.finish(EndReason::TransportLost, false).await,
            SessionEvent::SignalingFailed(reason) => {
                warn!("Lost signaling to {}: {}", self.remote(), reason);
                self.finish(EndReason::TransportLost, false).await;
            }
        }
    }

    async fn handle_signal(&mut self, payload: SignalPayload) {
        match payload {
            SignalPayload::Offer(offer) => {
                if self.session.role() != Role::Callee || self.session.state() != CallState::Idle {
                    warn!(
                        "Ignoring offer from {} in state {}",
                        self.remote(),
                        self.session.state()
                    );
                    return;
                }
                if let Err(e) = self.accept_offer(offer).await {
                    warn!("Failed to answer {}: {}", self.remote(), e);
                    self.finish(EndReason::TransportLost, true).await;
                }
            }
            SignalPayload::Answer(answer) => {
                if self.session.state() != CallState::AwaitingAnswer {
                    warn!(
                        "Ignoring answer from {} in state {}",
                        self.remote(),
                        self.session.state()
                    );
                    return;
                }
                if let Err(e) = self.accept_answer(answer).await {
                    warn!("Failed to apply answer from {}: {}", self.remote(), e);
                    self.finish(EndReason::TransportLost, true).await;
                }
            }
            SignalPayload::IceCandidate(candidate) => match self.queue.enqueue_remote(candidate) {
                RemoteDisposition::Apply(candidate) => self.apply_remote(vec![candidate]).await,
                RemoteDisposition::Held => {
                    debug!("Holding remote candidate from {}", self.remote());
                }
            },
            SignalPayload::Hangup => {
                let reason = if self.session.state() == CallState::Connected {
                    EndReason::Completed
                } else {
                    EndReason::PeerDeclined
                };
                info!("Peer {} hung up", self.remote());
                self.finish(reason, false).await;
            }
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalCandidate(candidate) => match self.queue.enqueue_local(candidate) {
                LocalDisposition::Flush(candidate) => self.flush_local(vec![candidate]),
                LocalDisposition::Held => {
                    debug!("Holding local candidate for {}", self.remote());
                }
            },
            TransportEvent::GatheringComplete => {
                debug!("Candidate gathering complete for {}", self.remote());
            }
            TransportEvent::TrackReceived(track) => {
                debug!("Received {} track {} from {}", track.kind, track.id, self.remote());
                self.session.add_remote_track(track.clone());
                self.stream.push(track);
                self.media_flowing = true;
                self.maybe_connected();
            }
            TransportEvent::Connected => {
                self.media_flowing = true;
                self.maybe_connected();
            }
            TransportEvent::Failed(reason) => {
                warn!("Transport to {} failed: {}", self.remote(), reason);
                self.finish(EndReason::TransportLost, true).await;
            }
        }
    }

    /// Caller: Idle -> Offering -> AwaitingAnswer
    async fn start_offer(&mut self) -> Result<()> {
        self.advance(CallState::Offering)?;
        self.attach_media().await?;

        let offer = self.transport.create_offer().await?;
        self.session.set_local_description(offer.clone())?;
        let drained = self.queue.drain_on_description_ready()?;

        // The offer must reach the peer before any candidate does
        self.send(SignalPayload::Offer(offer));
        self.signalled = true;
        self.flush_local(drained.local);
        self.apply_remote(drained.remote).await;

        self.advance(CallState::AwaitingAnswer)
    }

    /// Callee: Idle -> Answering -> Connecting
    async fn accept_offer(&mut self, offer: SessionDescription) -> Result<()> {
        self.advance(CallState::Answering)?;
        self.session.set_remote_description(offer.clone())?;
        self.transport.apply_remote_description(&offer).await?;
        let released = self.queue.remote_description_applied()?;

        self.attach_media().await?;
        let answer = self.transport.create_answer().await?;
        self.session.set_local_description(answer.clone())?;
        let drained = self.queue.drain_on_description_ready()?;

        self.send(SignalPayload::Answer(answer));
        self.signalled = true;
        self.flush_local(drained.local);
        self.apply_remote(released).await;
        self.apply_remote(drained.remote).await;

        self.advance(CallState::Connecting)?;
        self.maybe_connected();
        Ok(())
    }

    /// Caller: AwaitingAnswer -> Connecting
    async fn accept_answer(&mut self, answer: SessionDescription) -> Result<()> {
        self.session.set_remote_description(answer.clone())?;
        self.transport.apply_remote_description(&answer).await?;
        let released = self.queue.remote_description_applied()?;

        self.advance(CallState::Connecting)?;
        self.apply_remote(released).await;
        self.maybe_connected();
        Ok(())
    }

    async fn attach_media(&mut self) -> Result<()> {
        let tracks = self.media.tracks().to_vec();
        self.transport.attach_local_tracks(&tracks).await?;
        self.session.set_local_tracks(tracks);
        Ok(())
    }

    fn maybe_connected(&mut self) {
        if !self.media_flowing || self.session.state() != CallState::Connecting {
            return;
        }
        if let Err(e) = self.advance(CallState::Connected) {
            warn!("Could not mark call with {} connected: {}", self.remote(), e);
            return;
        }
        info!("Call with {} connected", self.remote());
        self.rendered = true;
        self.ctx.observer.connected(&self.session, self.stream.clone());
    }

    fn flush_local(&self, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            self.send(SignalPayload::IceCandidate(candidate));
        }
    }

    async fn apply_remote(&self, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            if let Err(e) = self.transport.add_remote_candidate(&candidate).await {
                warn!("Rejected candidate from {}: {}", self.remote(), e);
                self.ctx.observer.candidate_rejected(&self.session, e.to_string());
            }
        }
    }

    fn send(&self, payload: SignalPayload) {
        debug!("Queueing {} for {}", payload.kind(), self.remote());
        self.outbox.push(payload);
    }

    fn advance(&mut self, next: CallState) -> Result<()> {
        let previous = self.session.state();
        self.session.transition(next)?;
        debug!("Session with {}: {} -> {}", self.remote(), previous, next);
        self.state_tx.send_replace(next);
        self.ctx.observer.state_changed(&self.session);
        Ok(())
    }

    /// Any state -> Ended; releases everything the session holds
    async fn finish(&mut self, reason: EndReason, notify_peer: bool) {
        if self.session.state().is_terminal() {
            return;
        }
        let previous = self.session.state();

        self.media.release();
        self.queue.clear();
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport to {}: {}", self.remote(), e);
        }

        if notify_peer && self.signalled {
            self.send(SignalPayload::Hangup);
        }
        self.outbox.close();
        self.stream.end();
        self.session.release_tracks();
        self.session.end(reason);
        self.state_tx.send_replace(CallState::Ended);

        info!(
            "Call with {} ended from {}: {}",
            self.remote(),
            previous,
            reason
        );
        let stream = self.rendered.then(|| self.stream.clone());
        self.ctx.observer.ended(&self.session, stream);
    }
}
