//! Call flow integration tests
//!
//! Coordinators run against an in-memory relay with scripted transports.
//! The remote side is either a raw relay endpoint driven by the test or a
//! second coordinator.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p peercall --test call_flow_test
//!
//! # With negotiation logs
//! cargo test -p peercall --test call_flow_test -- --nocapture
//! ```

mod harness;

use harness::{
    eventually, fast_config, init_logging, wait_for_event, wait_for_state, CallHarness,
    Permission,
};
use peercall::{
    CallEvent, CallState, EndReason, Error, IceCandidate, PeerId, Role, SessionDescription,
    SignalEnvelope, SignalPayload, TrackKind, TransportEvent,
};
use std::time::Duration;

fn offer() -> SignalPayload {
    SignalPayload::Offer(SessionDescription::offer("v=0 remote offer"))
}

fn answer() -> SignalPayload {
    SignalPayload::Answer(SessionDescription::answer("v=0 remote answer"))
}

fn candidate(text: &str) -> SignalPayload {
    SignalPayload::IceCandidate(IceCandidate::new(text).with_mid("0", 0))
}

fn is_ended(event: &CallEvent) -> bool {
    matches!(event, CallEvent::Ended { .. })
}

fn ended_reason(event: CallEvent) -> EndReason {
    match event {
        CallEvent::Ended { reason, .. } => reason,
        other => panic!("expected an end event, got {:?}", other),
    }
}

// ============================================================================
// Caller
// ============================================================================

#[tokio::test]
async fn test_caller_offer_precedes_candidates_and_call_connects() {
    init_logging();
    let harness = CallHarness::new();
    let mut alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");
    alice.transports.gather(&["candidate:a1"]);

    let session_id = alice.coordinator.place_call(&bob.id).await.unwrap();
    assert_eq!(alice.coordinator.call_role(&bob.id), Some(Role::Caller));

    // The candidate gathered while the offer was created follows the offer
    let first = bob.recv().await;
    assert!(matches!(first.payload, SignalPayload::Offer(_)));
    assert_eq!(first.from, alice.id);
    let second = bob.recv().await;
    assert_eq!(second.payload, candidate("candidate:a1"));

    wait_for_state(&alice.coordinator, &bob.id, CallState::AwaitingAnswer).await;

    // A remote candidate before the answer is held
    bob.send_to(&alice.id, candidate("candidate:b1")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let transport = alice.transports.transport("bob").unwrap();
    assert!(transport.applied().is_empty());

    bob.send_to(&alice.id, answer()).await;
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connecting).await;
    eventually("held candidate applied", || {
        transport.applied() == vec!["candidate:b1".to_string()]
    })
    .await;
    assert_eq!(transport.remote_descriptions.lock().len(), 1);

    transport.deliver_track("remote-audio", TrackKind::Audio);
    let connected = wait_for_event(&mut alice.events, |e| {
        matches!(e, CallEvent::Connected { .. })
    })
    .await;
    assert_eq!(
        connected,
        CallEvent::Connected {
            peer: bob.id.clone(),
            session_id
        }
    );
    assert_eq!(alice.coordinator.call_state(&bob.id), Some(CallState::Connected));
    assert_eq!(alice.renderer.attached_peers(), vec![bob.id.clone()]);
    assert_eq!(alice.renderer.attached.lock()[0].tracks().len(), 1);

    assert_eq!(
        alice.coordinator.hang_up(&bob.id).await,
        Some(EndReason::Completed)
    );
    assert_eq!(bob.recv().await.payload, SignalPayload::Hangup);
    assert_eq!(alice.media.released(), 1);
    assert!(transport.is_closed());
    assert_eq!(
        alice.renderer.detached(),
        vec![(bob.id.clone(), EndReason::Completed)]
    );
    assert!(!alice.renderer.attached.lock()[0].is_live());
    assert_eq!(alice.coordinator.call_state(&bob.id), None);
    assert_eq!(
        alice.coordinator.last_end_reason(&bob.id),
        Some(EndReason::Completed)
    );
}

#[tokio::test]
async fn test_unanswered_offer_times_out() {
    init_logging();
    let harness = CallHarness::new();
    let config = peercall::CallConfig {
        answer_timeout_ms: 100,
        ..fast_config()
    };
    let mut alice = harness.peer_with_config("alice", config);
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    assert!(matches!(bob.recv().await.payload, SignalPayload::Offer(_)));

    let reason = ended_reason(wait_for_event(&mut alice.events, is_ended).await);
    assert_eq!(reason, EndReason::Timeout);
    assert_eq!(bob.recv().await.payload, SignalPayload::Hangup);
    assert_eq!(alice.media.released(), 1);
    assert_eq!(
        alice.coordinator.last_end_reason(&bob.id),
        Some(EndReason::Timeout)
    );
    // Never connected, so never rendered
    assert!(alice.renderer.attached_peers().is_empty());
    assert!(alice.renderer.detached().is_empty());
}

#[tokio::test]
async fn test_remote_decline_before_answer() {
    init_logging();
    let harness = CallHarness::new();
    let mut alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;
    bob.send_to(&alice.id, SignalPayload::Hangup).await;

    let reason = ended_reason(wait_for_event(&mut alice.events, is_ended).await);
    assert_eq!(reason, EndReason::PeerDeclined);

    // A remote hang-up is not echoed back
    assert!(bob.try_recv(Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn test_transport_failure_ends_call() {
    init_logging();
    let harness = CallHarness::new();
    let mut alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;
    bob.send_to(&alice.id, answer()).await;
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connecting).await;

    let transport = alice.transports.transport("bob").unwrap();
    transport.emit(TransportEvent::Connected);
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connected).await;

    transport.emit(TransportEvent::Failed("ice failed".to_string()));
    let reason = ended_reason(wait_for_event(&mut alice.events, is_ended).await);
    assert_eq!(reason, EndReason::TransportLost);
    assert_eq!(bob.recv().await.payload, SignalPayload::Hangup);
    assert_eq!(
        alice.renderer.detached(),
        vec![(bob.id.clone(), EndReason::TransportLost)]
    );
}

#[tokio::test]
async fn test_duplicate_answer_is_ignored() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;
    bob.send_to(&alice.id, answer()).await;
    bob.send_to(&alice.id, answer()).await;
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connecting).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let transport = alice.transports.transport("bob").unwrap();
    assert_eq!(transport.remote_descriptions.lock().len(), 1);
    assert_eq!(
        alice.coordinator.call_state(&bob.id),
        Some(CallState::Connecting)
    );
}

#[tokio::test]
async fn test_hang_up_while_media_pending_sends_nothing() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");
    alice
        .media
        .set_permission(Permission::GrantAfter(Duration::from_millis(200)));

    let coordinator = alice.coordinator.clone();
    let target = bob.id.clone();
    let placing = tokio::spawn(async move { coordinator.place_call(&target).await });

    eventually("slot reserved", || {
        alice.coordinator.call_state(&bob.id).is_some()
    })
    .await;
    assert_eq!(
        alice.coordinator.hang_up(&bob.id).await,
        Some(EndReason::Completed)
    );

    assert!(placing.await.unwrap().is_ok());
    assert_eq!(alice.media.released(), 1);
    assert_eq!(alice.coordinator.call_state(&bob.id), None);
    // Bob never saw the call
    assert!(bob.try_recv(Duration::from_millis(100)).await.is_none());
}

// ============================================================================
// Callee
// ============================================================================

#[tokio::test]
async fn test_callee_applies_early_candidates_in_order() {
    init_logging();
    let harness = CallHarness::new();
    let mut bob = harness.peer("bob");
    let mut alice = harness.endpoint("alice");

    alice.send_to(&bob.id, offer()).await;
    for n in 1..=3 {
        alice
            .send_to(&bob.id, candidate(&format!("candidate:c{}", n)))
            .await;
    }

    let reply = alice.recv().await;
    assert!(matches!(reply.payload, SignalPayload::Answer(_)));
    assert_eq!(bob.coordinator.call_role(&alice.id), Some(Role::Callee));

    let transport = bob.transports.transport("alice").unwrap();
    eventually("early candidates applied", || transport.applied().len() == 3).await;
    assert_eq!(
        transport.applied(),
        vec!["candidate:c1", "candidate:c2", "candidate:c3"]
    );
    assert_eq!(
        transport.remote_descriptions.lock()[0],
        SessionDescription::offer("v=0 remote offer")
    );
    wait_for_state(&bob.coordinator, &alice.id, CallState::Connecting).await;

    alice.send_to(&bob.id, SignalPayload::Hangup).await;
    let reason = ended_reason(wait_for_event(&mut bob.events, is_ended).await);
    assert_eq!(reason, EndReason::PeerDeclined);
    assert_eq!(bob.media.released(), 1);
}

#[tokio::test]
async fn test_callee_sends_gathered_candidates_after_answer() {
    init_logging();
    let harness = CallHarness::new();
    let bob = harness.peer("bob");
    let mut alice = harness.endpoint("alice");
    bob.transports.gather(&["candidate:b1", "candidate:b2"]);

    alice.send_to(&bob.id, offer()).await;

    assert!(matches!(alice.recv().await.payload, SignalPayload::Answer(_)));
    assert_eq!(alice.recv().await.payload, candidate("candidate:b1"));
    let b2 = alice.recv().await;
    assert!(matches!(
        b2.payload,
        SignalPayload::IceCandidate(ref c) if c.candidate == "candidate:b2"
    ));
}

#[tokio::test]
async fn test_rejected_candidate_does_not_end_call() {
    init_logging();
    let harness = CallHarness::new();
    let mut bob = harness.peer("bob");
    let mut alice = harness.endpoint("alice");

    alice.send_to(&bob.id, offer()).await;
    alice.send_to(&bob.id, candidate("candidate:bogus")).await;
    alice.send_to(&bob.id, candidate("candidate:good")).await;
    alice.recv().await;

    let rejected = wait_for_event(&mut bob.events, |e| {
        matches!(e, CallEvent::CandidateRejected { .. })
    })
    .await;
    assert!(matches!(
        rejected,
        CallEvent::CandidateRejected { ref reason, .. } if reason.contains("bogus")
    ));

    let transport = bob.transports.transport("alice").unwrap();
    eventually("good candidate applied", || {
        transport.applied() == vec!["candidate:good".to_string()]
    })
    .await;
    assert_eq!(
        bob.coordinator.call_state(&alice.id),
        Some(CallState::Connecting)
    );
}

#[tokio::test]
async fn test_callee_connect_timeout() {
    init_logging();
    let harness = CallHarness::new();
    let config = peercall::CallConfig {
        connect_timeout_ms: 100,
        ..fast_config()
    };
    let mut bob = harness.peer_with_config("bob", config);
    let mut alice = harness.endpoint("alice");

    alice.send_to(&bob.id, offer()).await;
    assert!(matches!(alice.recv().await.payload, SignalPayload::Answer(_)));

    let reason = ended_reason(wait_for_event(&mut bob.events, is_ended).await);
    assert_eq!(reason, EndReason::Timeout);
    assert_eq!(alice.recv().await.payload, SignalPayload::Hangup);
}

#[tokio::test]
async fn test_remote_hangup_after_connect_completes_call() {
    init_logging();
    let harness = CallHarness::new();
    let mut bob = harness.peer("bob");
    let mut alice = harness.endpoint("alice");

    alice.send_to(&bob.id, offer()).await;
    alice.recv().await;
    wait_for_state(&bob.coordinator, &alice.id, CallState::Connecting).await;

    let transport = bob.transports.transport("alice").unwrap();
    transport.deliver_track("remote-video", TrackKind::Video);
    wait_for_state(&bob.coordinator, &alice.id, CallState::Connected).await;

    alice.send_to(&bob.id, SignalPayload::Hangup).await;
    let reason = ended_reason(wait_for_event(&mut bob.events, is_ended).await);
    assert_eq!(reason, EndReason::Completed);
    assert_eq!(
        bob.renderer.detached(),
        vec![(alice.id.clone(), EndReason::Completed)]
    );
    assert!(alice.try_recv(Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn test_callee_without_media_declines() {
    init_logging();
    let harness = CallHarness::new();
    let bob = harness.peer("bob");
    let mut alice = harness.endpoint("alice");
    bob.media.set_permission(Permission::Deny);

    alice.send_to(&bob.id, offer()).await;

    assert_eq!(alice.recv().await.payload, SignalPayload::Hangup);
    eventually("slot released", || bob.coordinator.call_state(&alice.id).is_none()).await;
    assert_eq!(bob.transports.created(), 0);
}

// ============================================================================
// Admission rules
// ============================================================================

#[tokio::test]
async fn test_second_call_to_same_peer_rejected() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    let err = alice.coordinator.place_call(&bob.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInCall(ref p) if p == "bob"));
    assert_eq!(alice.transports.created(), 1);
}

#[tokio::test]
async fn test_call_limit() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let bob = harness.endpoint("bob");
    let carol = harness.endpoint("carol");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    let err = alice.coordinator.place_call(&carol.id).await.unwrap_err();
    assert!(matches!(err, Error::CallLimitReached(1)));
    assert_eq!(alice.coordinator.active_calls(), vec![bob.id.clone()]);
}

#[tokio::test]
async fn test_offer_during_call_is_busy() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");
    let mut carol = harness.endpoint("carol");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;
    wait_for_state(&alice.coordinator, &bob.id, CallState::AwaitingAnswer).await;

    // Same peer: the existing call is untouched
    bob.send_to(&alice.id, offer()).await;
    // Another peer over the limit: dropped without a reply
    carol.send_to(&alice.id, offer()).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        alice.coordinator.call_state(&bob.id),
        Some(CallState::AwaitingAnswer)
    );
    assert_eq!(alice.coordinator.call_role(&bob.id), Some(Role::Caller));
    assert_eq!(alice.coordinator.call_state(&carol.id), None);
    assert_eq!(alice.transports.created(), 1);
    assert!(carol.try_recv(Duration::from_millis(50)).await.is_none());

    let direct = alice
        .coordinator
        .handle_incoming(SignalEnvelope::new(bob.id.clone(), alice.id.clone(), offer()))
        .await
        .unwrap_err();
    assert!(matches!(direct, Error::Busy(_)));
}

#[tokio::test]
async fn test_misaddressed_offer_is_refused() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");

    let err = alice
        .coordinator
        .handle_incoming(SignalEnvelope::new(
            PeerId::from("bob"),
            PeerId::from("carol"),
            offer(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProtocolError(_)));
    assert!(alice.coordinator.active_calls().is_empty());
    assert_eq!(alice.media.acquired(), 0);
}

#[tokio::test]
async fn test_unreachable_peer() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");

    let err = alice
        .coordinator
        .place_call(&PeerId::from("nobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PeerUnreachable(_)));
    assert_eq!(alice.media.acquired(), 0);

    let err = alice.coordinator.place_call(&alice.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_media_denied_then_granted() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.media.set_permission(Permission::Deny);
    let err = alice.coordinator.place_call(&bob.id).await.unwrap_err();
    assert!(matches!(err, Error::MediaUnavailable(_)));
    assert_eq!(alice.coordinator.call_state(&bob.id), None);
    assert_eq!(alice.transports.created(), 0);
    assert!(bob.try_recv(Duration::from_millis(50)).await.is_none());

    alice.media.set_permission(Permission::Grant);
    alice.coordinator.place_call(&bob.id).await.unwrap();
    assert!(matches!(bob.recv().await.payload, SignalPayload::Offer(_)));
}

#[tokio::test]
async fn test_media_permission_timeout() {
    init_logging();
    let harness = CallHarness::new();
    let config = peercall::CallConfig {
        media_timeout_ms: 50,
        ..fast_config()
    };
    let alice = harness.peer_with_config("alice", config);
    let bob = harness.endpoint("bob");
    alice.media.set_permission(Permission::Hang);

    let err = alice.coordinator.place_call(&bob.id).await.unwrap_err();
    assert!(matches!(err, Error::MediaUnavailable(_)));
    assert!(alice.coordinator.active_calls().is_empty());
}

// ============================================================================
// Hang-up and teardown
// ============================================================================

#[tokio::test]
async fn test_hang_up_is_idempotent() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    assert_eq!(alice.coordinator.hang_up(&bob.id).await, None);

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;

    assert_eq!(
        alice.coordinator.hang_up(&bob.id).await,
        Some(EndReason::Completed)
    );
    // Repeating reports the same outcome and changes nothing
    assert_eq!(
        alice.coordinator.hang_up(&bob.id).await,
        Some(EndReason::Completed)
    );
    assert_eq!(alice.media.released(), 1);
    assert_eq!(bob.recv().await.payload, SignalPayload::Hangup);
    assert!(bob.try_recv(Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn test_concurrent_hang_ups_release_once() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;

    let (first, second) = tokio::join!(
        alice.coordinator.hang_up(&bob.id),
        alice.coordinator.hang_up(&bob.id)
    );
    assert_eq!(first, Some(EndReason::Completed));
    assert_eq!(second, Some(EndReason::Completed));
    assert_eq!(alice.media.released(), 1);
}

#[tokio::test]
async fn test_hang_up_does_not_wait_for_backed_up_peer() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.endpoint_with_capacity("bob", 4);

    let gathered: Vec<String> = (0..20).map(|n| format!("candidate:a{}", n)).collect();
    let gathered: Vec<&str> = gathered.iter().map(String::as_str).collect();
    alice.transports.gather(&gathered);

    alice.coordinator.place_call(&bob.id).await.unwrap();
    wait_for_state(&alice.coordinator, &bob.id, CallState::AwaitingAnswer).await;

    // Bob is not reading, so his inbox fills long before the last candidate
    let reason = tokio::time::timeout(Duration::from_secs(1), alice.coordinator.hang_up(&bob.id))
        .await
        .expect("hang-up waited on a full inbox");
    assert_eq!(reason, Some(EndReason::Completed));
    assert_eq!(alice.media.released(), 1);
    assert!(alice.transports.transport("bob").unwrap().is_closed());

    // Once Bob reads, everything arrives in order with the hang-up last
    let mut received = Vec::new();
    loop {
        let payload = bob.recv().await.payload;
        let last = payload == SignalPayload::Hangup;
        received.push(payload);
        if last {
            break;
        }
    }
    assert!(matches!(received[0], SignalPayload::Offer(_)));
    assert_eq!(received[1], candidate("candidate:a0"));
    assert_eq!(received.len(), 22);
}

#[tokio::test]
async fn test_signaling_loss_ends_calls() {
    init_logging();
    let harness = CallHarness::new();
    let mut alice = harness.peer("alice");
    let mut bob = harness.endpoint("bob");

    alice.coordinator.place_call(&bob.id).await.unwrap();
    bob.recv().await;

    harness.relay.disconnect(&alice.id);
    let reason = ended_reason(wait_for_event(&mut alice.events, is_ended).await);
    assert_eq!(reason, EndReason::TransportLost);
    assert_eq!(alice.media.released(), 1);
    // The relay is gone, so no hang-up is attempted
    assert!(bob.try_recv(Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn test_messages_for_other_peers_are_dropped() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");

    alice.coordinator.dispatch(SignalEnvelope::new(
        PeerId::from("bob"),
        PeerId::from("carol"),
        offer(),
    ));
    alice.coordinator.dispatch(SignalEnvelope::new(
        PeerId::from("bob"),
        alice.id.clone(),
        answer(),
    ));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(alice.coordinator.active_calls().is_empty());
    assert_eq!(alice.media.acquired(), 0);
}

// ============================================================================
// Two coordinators
// ============================================================================

#[tokio::test]
async fn test_two_coordinators_full_call() {
    init_logging();
    let harness = CallHarness::new();
    let alice = harness.peer("alice");
    let mut bob = harness.peer("bob");
    alice.transports.gather(&["candidate:alice-host", "candidate:alice-srflx"]);
    bob.transports.gather(&["candidate:bob-host"]);

    alice.coordinator.place_call(&bob.id).await.unwrap();

    wait_for_event(&mut bob.events, |e| {
        matches!(e, CallEvent::StateChanged { state: CallState::Connecting, .. })
    })
    .await;
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connecting).await;
    assert_eq!(bob.coordinator.call_role(&alice.id), Some(Role::Callee));

    let alice_side = alice.transports.transport("bob").unwrap();
    let bob_side = bob.transports.transport("alice").unwrap();
    eventually("candidates exchanged", || {
        alice_side.applied() == vec!["candidate:bob-host".to_string()]
            && bob_side.applied()
                == vec![
                    "candidate:alice-host".to_string(),
                    "candidate:alice-srflx".to_string(),
                ]
    })
    .await;

    alice_side.emit(TransportEvent::Connected);
    bob_side.emit(TransportEvent::Connected);
    wait_for_state(&alice.coordinator, &bob.id, CallState::Connected).await;
    wait_for_state(&bob.coordinator, &alice.id, CallState::Connected).await;

    assert_eq!(
        alice.coordinator.hang_up(&bob.id).await,
        Some(EndReason::Completed)
    );
    let reason = ended_reason(wait_for_event(&mut bob.events, is_ended).await);
    assert_eq!(reason, EndReason::Completed);
    assert_eq!(
        bob.renderer.detached(),
        vec![(alice.id.clone(), EndReason::Completed)]
    );
    assert_eq!(alice.media.released(), 1);
    assert_eq!(bob.media.released(), 1);
}
