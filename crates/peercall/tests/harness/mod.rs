//! Call test harness
//!
//! Builds coordinators wired to an in-memory relay with scripted peer
//! transports, media and renderers. A test can also join the relay as a raw
//! endpoint to play the remote side by hand.
//!
//! Basic usage pattern:
//!
//! 1. Create a `CallHarness`
//! 2. Add coordinated peers with `harness.peer()` and raw ones with `harness.endpoint()`
//! 3. Drive the call and inject transport events through `TestPeer::transports`
//! 4. Wait on states and events with the helpers below

#![allow(dead_code)]

pub mod fakes;

use peercall::{
    CallConfig, CallCoordinator, CallEvent, CallState, Collaborators, Credential, MemoryRelay,
    MemorySignaling, PeerId, PeerIdentity, SignalEnvelope,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

pub use fakes::{FakeMedia, FakeTransportFactory, Permission, RecordingRenderer};

/// How long helpers wait before failing a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Initialize test logging (safe to call from every test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,peercall=debug")
        .with_test_writer()
        .try_init();
}

/// Timeouts short enough for tests
pub fn fast_config() -> CallConfig {
    CallConfig {
        stun_servers: Vec::new(),
        answer_timeout_ms: 5_000,
        connect_timeout_ms: 5_000,
        media_timeout_ms: 1_000,
        ..Default::default()
    }
}

/// A coordinator plus handles on all of its collaborators
pub struct TestPeer {
    pub id: PeerId,
    pub coordinator: CallCoordinator,
    pub transports: Arc<FakeTransportFactory>,
    pub media: Arc<FakeMedia>,
    pub renderer: Arc<RecordingRenderer>,
    pub events: broadcast::Receiver<CallEvent>,
    pub dispatcher: JoinHandle<()>,
}

/// A bare relay connection for playing the remote side
pub struct Endpoint {
    pub id: PeerId,
    pub signaling: MemorySignaling,
    pub inbox: mpsc::Receiver<SignalEnvelope>,
}

impl Endpoint {
    pub async fn send_to(&self, to: &PeerId, payload: peercall::SignalPayload) {
        use peercall::SignalingTransport;
        self.signaling
            .send(SignalEnvelope::new(self.id.clone(), to.clone(), payload))
            .await
            .expect("relay delivery");
    }

    /// Next message, failing the test after [`WAIT`]
    pub async fn recv(&mut self) -> SignalEnvelope {
        tokio::time::timeout(WAIT, self.inbox.recv())
            .await
            .expect("timed out waiting for a signal")
            .expect("relay inbox closed")
    }

    /// Next message if one arrives within `within`
    pub async fn try_recv(&mut self, within: Duration) -> Option<SignalEnvelope> {
        tokio::time::timeout(within, self.inbox.recv())
            .await
            .ok()
            .flatten()
    }
}

#[derive(Default)]
pub struct CallHarness {
    pub relay: MemoryRelay,
}

impl CallHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer(&self, id: &str) -> TestPeer {
        self.peer_with_config(id, fast_config())
    }

    pub fn peer_with_config(&self, id: &str, config: CallConfig) -> TestPeer {
        let identity = PeerIdentity::new(id, id.to_uppercase());
        let (signaling, inbox) = self
            .relay
            .connect(identity.clone(), config.signaling_capacity);

        let transports = Arc::new(FakeTransportFactory::default());
        let media = Arc::new(FakeMedia::default());
        let renderer = Arc::new(RecordingRenderer::default());

        let coordinator = CallCoordinator::new(
            Credential::new(identity, format!("token-{}", id)),
            config,
            Collaborators {
                signaling: Arc::new(signaling),
                transports: transports.clone(),
                media: media.clone(),
                presence: Arc::new(self.relay.clone()),
                renderer: renderer.clone(),
            },
        )
        .expect("valid test config");

        let events = coordinator.subscribe();
        let dispatcher = coordinator.spawn_dispatcher(inbox);

        TestPeer {
            id: PeerId::from(id),
            coordinator,
            transports,
            media,
            renderer,
            events,
            dispatcher,
        }
    }

    pub fn endpoint(&self, id: &str) -> Endpoint {
        self.endpoint_with_capacity(id, 64)
    }

    /// Endpoint whose inbox holds at most `capacity` unread messages
    pub fn endpoint_with_capacity(&self, id: &str, capacity: usize) -> Endpoint {
        let (signaling, inbox) = self
            .relay
            .connect(PeerIdentity::new(id, id.to_uppercase()), capacity);
        Endpoint {
            id: PeerId::from(id),
            signaling,
            inbox,
        }
    }
}

/// Wait until `coordinator` reports `state` for the call with `peer`
pub async fn wait_for_state(coordinator: &CallCoordinator, peer: &PeerId, state: CallState) {
    let mut watch = coordinator
        .watch_state(peer)
        .unwrap_or_else(|| panic!("no call with {}", peer));
    tokio::time::timeout(WAIT, watch.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} with {}", state, peer))
        .expect("session dropped its state");
}

/// Wait for the first event matching `pred`
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<CallEvent>, mut pred: F) -> CallEvent
where
    F: FnMut(&CallEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a call event")
}

/// Poll `cond` until it holds
pub async fn eventually<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
