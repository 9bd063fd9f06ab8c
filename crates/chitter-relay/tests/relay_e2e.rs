// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end relay tests over real sockets.

use std::time::Duration;

use chitter_core::{CallState, UserId};
use chitter_relay::{RelayState, TokenVerifier, serve};
use chitter_signal::{CallStateUpdate, ClientFrame, Envelope, Offer, Participant, ServerFrame};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(verifier: TokenVerifier) -> (String, RelayState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = RelayState::new(verifier, 16, None, CancellationToken::new());
    tokio::spawn(serve(listener, state.clone()));
    (format!("ws://{addr}/ws"), state)
}

async fn open(url: &str, user: &str) -> Socket {
    let (socket, _) = connect_async(format!("{url}?user={user}")).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, frame: ClientFrame) {
    let text = frame.to_json().unwrap();
    socket.send(Message::Text(text.into())).await.unwrap();
}

async fn recv(socket: &mut Socket) -> ServerFrame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return ServerFrame::from_json(text.as_str()).unwrap();
        }
    }
}

async fn recv_signal(socket: &mut Socket) -> Envelope {
    loop {
        if let ServerFrame::Signal { envelope } = recv(socket).await {
            return envelope;
        }
    }
}

async fn wait_until(state: &RelayState, check: impl Fn(&RelayState) -> bool) {
    for _ in 0..100 {
        if check(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never reached expected state");
}

#[tokio::test]
async fn offer_travels_through_room_and_mailbox() {
    let (url, state) = start(TokenVerifier::open()).await;
    let mut alice = open(&url, "alice").await;
    let mut bob = open(&url, "bob").await;
    let mut carol = open(&url, "carol").await;

    assert!(matches!(recv(&mut alice).await, ServerFrame::Welcome { online: 1, .. }));

    send(&mut alice, ClientFrame::Join { room: "group".into() }).await;
    send(&mut bob, ClientFrame::Join { room: "group".into() }).await;
    wait_until(&state, |s| s.hub.room_size(&"group".into()) == 2).await;

    send(
        &mut alice,
        ClientFrame::Signal {
            envelope: Envelope::Offer(Offer {
                room: "group".into(),
                from: "someone-else".into(),
                offer: serde_json::json!({"sdp": "v=0"}),
                targets: vec!["bob".into(), "carol".into()],
            }),
        },
    )
    .await;

    let at_bob = recv_signal(&mut bob).await;
    let at_carol = recv_signal(&mut carol).await;
    assert_eq!(at_bob, at_carol);
    assert_eq!(at_bob.from(), &UserId::from("alice"));
}

#[tokio::test]
async fn call_state_reaches_roster_members_outside_the_room() {
    let (url, state) = start(TokenVerifier::open()).await;
    let mut alice = open(&url, "alice").await;
    let mut dave = open(&url, "dave").await;
    wait_until(&state, |s| s.hub.presence_count() == 2).await;

    send(
        &mut alice,
        ClientFrame::Signal {
            envelope: Envelope::CallState(CallStateUpdate {
                room: "group".into(),
                from: "alice".into(),
                state: CallState::Calling,
                started_at: None,
                participants: Some(vec![Participant::connected("alice"), Participant::ringing("dave")]),
            }),
        },
    )
    .await;

    let envelope = recv_signal(&mut dave).await;
    assert!(matches!(envelope, Envelope::CallState(ref u) if u.state == CallState::Calling));
}

#[tokio::test]
async fn invalid_frame_keeps_connection_open() {
    let (url, state) = start(TokenVerifier::open()).await;
    let mut alice = open(&url, "alice").await;
    let mut bob = open(&url, "bob").await;

    alice.send(Message::Text("{\"type\":\"bogus\"}".into())).await.unwrap();
    loop {
        if let ServerFrame::Error { message } = recv(&mut alice).await {
            assert!(message.contains("invalid frame"));
            break;
        }
    }

    send(&mut alice, ClientFrame::Join { room: "dm".into() }).await;
    send(&mut bob, ClientFrame::Join { room: "dm".into() }).await;
    wait_until(&state, |s| s.hub.room_size(&"dm".into()) == 2).await;
    send(
        &mut alice,
        ClientFrame::Signal {
            envelope: Envelope::Decline(chitter_signal::Decline {
                room: "dm".into(),
                from: "alice".into(),
            }),
        },
    )
    .await;
    assert!(matches!(recv_signal(&mut bob).await, Envelope::Decline(_)));
}

#[tokio::test]
async fn closing_a_socket_updates_presence() {
    let (url, state) = start(TokenVerifier::open()).await;
    let mut alice = open(&url, "alice").await;
    let bob = open(&url, "bob").await;
    wait_until(&state, |s| s.hub.presence_count() == 2).await;

    drop(bob);
    wait_until(&state, |s| !s.hub.is_online(&"bob".into())).await;
    loop {
        if let ServerFrame::OnlineCount { count } = recv(&mut alice).await {
            if count == 1 {
                break;
            }
        }
    }
}

#[tokio::test]
async fn bad_token_is_rejected_before_upgrade() {
    let verifier = TokenVerifier::new(Some("s3cret".to_string()));
    let token = verifier.issue(&"alice".into()).unwrap();
    let (url, _state) = start(verifier).await;

    let err = connect_async(format!("{url}?user=alice&token=deadbeef")).await.unwrap_err();
    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 401),
        other => panic!("unexpected error: {other}"),
    }

    let ok = connect_async(format!("{url}?user=alice&token={token}")).await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn shutdown_closes_sockets() {
    let (url, state) = start(TokenVerifier::open()).await;
    let mut alice = open(&url, "alice").await;
    wait_until(&state, |s| s.hub.connection_count() == 1).await;

    state.cancel.cancel();
    wait_until(&state, |s| s.hub.connection_count() == 0).await;
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(_)) = alice.next().await {}
    })
    .await;
    assert!(closed.is_ok());
}
