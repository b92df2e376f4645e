//! Offer/answer negotiation for one-to-one calls

mod candidate_queue;
mod description;
mod negotiator;
mod outbox;
mod session;

pub use candidate_queue::{CandidateQueue, Drained, LocalDisposition, RemoteDisposition};
pub use description::{IceCandidate, SdpType, SessionDescription};
pub use session::{CallSession, CallState, EndReason, Role};

pub(crate) use negotiator::{SessionContext, SessionEvent, SessionNegotiator, SessionObserver};
