// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-client call flows through an in-process relay hub.

use std::time::Duration;

use chitter_call::{DriverState, Notice, Timings};
use chitter_core::{CallState, RoomId};
use chitter_signal::{CallStateUpdate, Envelope, ParticipantStatus};
use chitter_test_utils::{CallHarness, TestClient};

const WAIT: Duration = Duration::from_secs(2);

fn in_call(s: &DriverState) -> bool {
    s.active.as_ref().is_some_and(|c| c.state == CallState::InCall)
}

fn ringing(s: &DriverState) -> bool {
    s.active.as_ref().is_some_and(|c| c.ringing)
}

fn idle(s: &DriverState) -> bool {
    s.active.is_none()
}

fn dm() -> RoomId {
    "dm".into()
}

async fn connect(alice: &TestClient, bob: &TestClient) {
    alice
        .handle
        .start_call(dm(), vec!["bob".into()])
        .await
        .unwrap();
    bob.wait_for(WAIT, ringing).await.unwrap();
    bob.handle.accept().await.unwrap();
    alice.wait_for(WAIT, in_call).await.unwrap();
    bob.wait_for(WAIT, in_call).await.unwrap();
}

#[tokio::test]
async fn alice_calls_bob_and_hangs_up() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    let mut alice_notices = alice.handle.notices();

    connect(alice, bob).await;

    let call = alice.state().active.unwrap();
    assert_eq!(call.initiator, Some("alice".into()));
    assert!(
        call.participants
            .iter()
            .all(|p| p.status == ParticipantStatus::Connected)
    );

    alice.handle.hang_up().await.unwrap();
    alice.wait_for(WAIT, idle).await.unwrap();
    bob.wait_for(WAIT, idle).await.unwrap();

    assert!(alice.media.outstanding().is_empty());
    assert!(bob.media.outstanding().is_empty());
    assert_eq!(alice.transport.closes(), 1);
    assert_eq!(bob.transport.closes(), 1);

    loop {
        match alice_notices.recv().await.unwrap() {
            Notice::Ended { room, duration_secs } => {
                assert_eq!(room, dm());
                assert!(duration_secs.is_some());
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test]
async fn summary_is_written_once_by_the_caller() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    connect(alice, bob).await;

    // Both sides hang up at once.
    alice.handle.hang_up().await.unwrap();
    bob.handle.hang_up().await.unwrap();
    alice.wait_for(WAIT, idle).await.unwrap();
    bob.wait_for(WAIT, idle).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let summaries = harness.history.summaries(&dm()).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].user, "alice".into());
}

#[tokio::test]
async fn callee_decline_leaves_caller_ringing_others() {
    let harness = CallHarness::builder()
        .with_users(["alice", "bob", "carol"])
        .with_room("group")
        .build()
        .unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    let carol = harness.client("carol");
    let mut notices = alice.handle.notices();

    alice
        .handle
        .start_call("group".into(), vec!["bob".into(), "carol".into()])
        .await
        .unwrap();
    bob.wait_for(WAIT, ringing).await.unwrap();
    carol.wait_for(WAIT, ringing).await.unwrap();

    bob.handle.decline().await.unwrap();
    loop {
        if let Notice::Declined { user, .. } = notices.recv().await.unwrap() {
            assert_eq!(user, "bob".into());
            break;
        }
    }
    let call = alice.state().active.unwrap();
    assert_eq!(call.state, CallState::Calling);
    assert!(call.participants.iter().all(|p| p.user != "bob".into()));

    carol.handle.accept().await.unwrap();
    alice.wait_for(WAIT, in_call).await.unwrap();
}

#[tokio::test]
async fn caller_cancel_becomes_a_missed_call() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    let mut notices = bob.handle.notices();

    alice
        .handle
        .start_call(dm(), vec!["bob".into()])
        .await
        .unwrap();
    bob.wait_for(WAIT, ringing).await.unwrap();
    alice.handle.hang_up().await.unwrap();
    bob.wait_for(WAIT, idle).await.unwrap();

    loop {
        if let Notice::Missed { from, .. } = notices.recv().await.unwrap() {
            assert_eq!(from, "alice".into());
            break;
        }
    }
    assert!(harness.history.summaries(&dm()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn nobody_answers() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    let mut alice_notices = alice.handle.notices();
    let mut bob_notices = bob.handle.notices();

    alice
        .handle
        .start_call(dm(), vec!["bob".into()])
        .await
        .unwrap();
    bob.wait_for(WAIT, ringing).await.unwrap();

    let timeout = Timings::default().ring_timeout + Duration::from_secs(5);
    alice.wait_for(timeout, idle).await.unwrap();
    bob.wait_for(timeout, idle).await.unwrap();

    loop {
        if let Notice::Unanswered { room } = alice_notices.recv().await.unwrap() {
            assert_eq!(room, dm());
            break;
        }
    }
    loop {
        if let Notice::Missed { .. } = bob_notices.recv().await.unwrap() {
            break;
        }
    }
    assert!(alice.media.outstanding().is_empty());
}

#[tokio::test(start_paused = true)]
async fn crashed_peer_leaves_the_other_in_call() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    connect(alice, bob).await;

    harness.crash("alice");
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(in_call(&bob.state()));
}

#[tokio::test(start_paused = true)]
async fn contradicted_idle_is_absorbed() {
    let harness = CallHarness::pair().unwrap();
    let alice = harness.client("alice");
    let bob = harness.client("bob");
    connect(alice, bob).await;

    let report = |state| {
        Envelope::CallState(CallStateUpdate {
            room: dm(),
            from: "alice".into(),
            state,
            started_at: None,
            participants: None,
        })
    };
    bob.handle.inbound(report(CallState::Idle)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    bob.handle.inbound(report(CallState::InCall)).await.unwrap();

    tokio::time::sleep(Timings::default().idle_grace * 3).await;
    assert!(in_call(&bob.state()));

    bob.handle.inbound(report(CallState::Idle)).await.unwrap();
    bob.wait_for(Timings::default().idle_grace * 2, idle)
        .await
        .unwrap();
    alice.wait_for(WAIT, idle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hang_up_during_media_acquisition_releases_late_handle() {
    let harness = CallHarness::builder()
        .with_users(["alice", "bob"])
        .with_room("dm")
        .with_media_delay(Duration::from_secs(3))
        .build()
        .unwrap();
    let alice = harness.client("alice");

    alice
        .handle
        .start_call(dm(), vec!["bob".into()])
        .await
        .unwrap();
    alice
        .wait_for(WAIT, |s| s.active.is_some())
        .await
        .unwrap();
    alice.handle.hang_up().await.unwrap();
    alice.wait_for(WAIT, idle).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(alice.media.acquired().len(), 1);
    assert!(alice.media.outstanding().is_empty());
    assert!(alice.transport.ops().is_empty());
}
