// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket endpoint: `GET /ws?user=<id>&token=<hex>`.
//!
//! Credentials are checked before the upgrade. After that the socket speaks
//! [`ClientFrame`]s in and [`ServerFrame`]s out, one JSON object per text
//! message.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chitter_core::UserId;
use chitter_signal::{ClientFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::hub::ConnId;
use crate::server::RelayState;

/// Query parameters on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Verify credentials, then upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<RelayState>,
) -> Response {
    let user = UserId::new(params.user.unwrap_or_default());
    if !state.verifier.verify(&user, params.token.as_deref()) {
        warn!(user = %user, "rejected relay connection: bad credentials");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Drive one socket until either side closes or the relay shuts down.
async fn handle_socket(socket: WebSocket, state: RelayState, user: UserId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(state.outbound_queue);
    let conn = state.hub.connect(user.clone(), tx);
    info!(conn = %conn, user = %user, "relay connection opened");

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode server frame");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        let msg = tokio::select! {
            _ = state.cancel.cancelled() => break,
            msg = ws_receiver.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => handle_frame(&state, conn, text.as_str()),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(conn = %conn, error = %e, "relay socket read failed");
                break;
            }
        }
    }

    state.hub.disconnect(conn);
    sender_task.abort();
    info!(conn = %conn, user = %user, "relay connection closed");
}

fn handle_frame(state: &RelayState, conn: ConnId, text: &str) {
    let frame = match ClientFrame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(conn = %conn, error = %e, "skipping invalid client frame");
            state.hub.send_to(
                conn,
                ServerFrame::Error {
                    message: format!("invalid frame: {e}"),
                },
            );
            return;
        }
    };

    let result = match frame {
        ClientFrame::Join { room } => state.hub.join(conn, room),
        ClientFrame::Leave { room } => state.hub.leave(conn, &room),
        ClientFrame::Signal { envelope } => state.hub.forward(conn, envelope).map(|_| ()),
    };
    if let Err(e) = result {
        warn!(conn = %conn, error = %e, "client frame rejected");
    }
}
