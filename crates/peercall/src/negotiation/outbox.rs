//! Outbound signaling for one session
//!
//! Messages leave in the order they were queued, from a task of their own, so
//! the session loop never waits on the signaling channel. Every send is bounded
//! by a timeout. A failed description or a stalled channel stops the outbox and
//! is reported back to the session as [`SessionEvent::SignalingFailed`].

use super::negotiator::SessionEvent;
use crate::identity::PeerId;
use crate::signaling::{SignalEnvelope, SignalPayload, SignalingTransport};
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn, Instrument};

pub(crate) struct Outbox {
    tx: Option<mpsc::UnboundedSender<SignalPayload>>,
    task: Option<JoinHandle<()>>,
}

impl Outbox {
    /// Start the sender task for messages from `local` to `remote`
    pub(crate) fn spawn(
        local: PeerId,
        remote: PeerId,
        signaling: Arc<dyn SignalingTransport>,
        send_timeout: Duration,
        session_events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SignalPayload>();

        let task = tokio::spawn(
            async move {
                while let Some(payload) = rx.recv().await {
                    let kind = payload.kind();
                    let fatal = matches!(
                        payload,
                        SignalPayload::Offer(_) | SignalPayload::Answer(_)
                    );
                    let envelope = SignalEnvelope::new(local.clone(), remote.clone(), payload);

                    let error = match time::timeout(send_timeout, signaling.send(envelope)).await {
                        Ok(Ok(())) => {
                            debug!("Sent {} to {}", kind, remote);
                            continue;
                        }
                        Ok(Err(e)) => e,
                        Err(_) => Error::OperationTimeout(format!(
                            "sending {} to {} took longer than {:?}",
                            kind, remote, send_timeout
                        )),
                    };

                    let stalled = matches!(error, Error::OperationTimeout(_));
                    if !fatal && !stalled {
                        warn!("Failed to send {} to {}: {}", kind, remote, error);
                        continue;
                    }

                    warn!(
                        "Signaling to {} failed, dropping queued messages: {}",
                        remote, error
                    );
                    // The session may already be gone
                    let _ = session_events.send(SessionEvent::SignalingFailed(error.to_string()));
                    break;
                }
            }
            .in_current_span(),
        );

        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    /// Queue a message; ignored once the outbox is closed or has failed
    pub(crate) fn push(&self, payload: SignalPayload) {
        let Some(tx) = &self.tx else {
            debug!("Outbox closed, dropping {}", payload.kind());
            return;
        };
        if let Err(e) = tx.send(payload) {
            debug!("Outbox stopped, dropping {}", e.0.kind());
        }
    }

    /// Stop accepting messages; already queued ones are still sent
    pub(crate) fn close(&mut self) {
        self.tx.take();
    }

    /// Wait until everything queued before [`close`](Self::close) has been sent
    pub(crate) async fn drained(&mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Outbox task failed: {}", e);
            }
        }
    }
}
