// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connection from a call client to the relay.
//!
//! Inbound `signal` frames become [`DriverEvent::Inbound`]; connection loss
//! becomes [`DriverEvent::Relay`]. Outbound envelopes go through the
//! [`SignalSink`] impl, which refuses to queue anything while disconnected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chitter_core::{ChitterError, RoomId, UserId};
use chitter_signal::{ClientFrame, Envelope, ServerFrame};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{DriverEvent, RelayStatus, SignalSink};

const OUTBOUND_QUEUE: usize = 64;

/// A live relay connection.
pub struct RelayClient {
    user: UserId,
    outbound: mpsc::Sender<ClientFrame>,
    online: Arc<AtomicBool>,
    presence: watch::Receiver<usize>,
}

/// Build `ws://host/ws?user=..&token=..` from the relay base URL.
pub fn relay_url(base: &str, user: &UserId, token: Option<&str>) -> Result<url::Url, ChitterError> {
    let mut url = url::Url::parse(base)
        .and_then(|u| u.join("ws"))
        .map_err(|e| ChitterError::Config(format!("invalid relay url `{base}`: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("user", user.as_str());
        if let Some(token) = token {
            query.append_pair("token", token);
        }
    }
    Ok(url)
}

impl RelayClient {
    /// Connect and start the reader and writer tasks. Both stop on `cancel`.
    pub async fn connect(
        base: &str,
        user: UserId,
        token: Option<&str>,
        events: mpsc::Sender<DriverEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, ChitterError> {
        let url = relay_url(base, &user, token)?;
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChitterError::Relay {
                message: format!("connect to {base} failed"),
                source: Some(Box::new(e)),
            })?;
        info!(user = %user, relay = %base, "connected to relay");

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<ClientFrame>(OUTBOUND_QUEUE);
        let online = Arc::new(AtomicBool::new(true));
        let (presence_tx, presence) = watch::channel(0usize);

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    frame = outbound_rx.recv() => match frame {
                        Some(frame) => frame,
                        None => break,
                    },
                };
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode frame");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let reader_online = online.clone();
        let reader_user = user.clone();
        tokio::spawn(async move {
            let _ = events.send(DriverEvent::Relay(RelayStatus::Connected)).await;
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = ws_rx.next() => msg,
                };
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "relay read failed");
                        break;
                    }
                };
                match ServerFrame::from_json(text.as_str()) {
                    Ok(ServerFrame::Signal { envelope }) => {
                        if events.send(DriverEvent::Inbound(envelope)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerFrame::Welcome { user, online }) => {
                        debug!(user = %user, online, "relay welcome");
                        presence_tx.send_replace(online);
                    }
                    Ok(ServerFrame::OnlineCount { count }) => {
                        presence_tx.send_replace(count);
                    }
                    Ok(ServerFrame::Error { message }) => {
                        warn!(error = %message, "relay reported an error");
                    }
                    Err(e) => warn!(error = %e, "unreadable frame from relay"),
                }
            }
            reader_online.store(false, Ordering::SeqCst);
            info!(user = %reader_user, "relay connection closed");
            let _ = events.send(DriverEvent::Relay(RelayStatus::Disconnected)).await;
        });

        Ok(Self {
            user,
            outbound,
            online,
            presence,
        })
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Users currently online, as last reported by the relay.
    pub fn presence(&self) -> watch::Receiver<usize> {
        self.presence.clone()
    }

    pub async fn join(&self, room: RoomId) -> Result<(), ChitterError> {
        self.frame(ClientFrame::Join { room }).await
    }

    pub async fn leave(&self, room: RoomId) -> Result<(), ChitterError> {
        self.frame(ClientFrame::Leave { room }).await
    }

    async fn frame(&self, frame: ClientFrame) -> Result<(), ChitterError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ChitterError::relay("relay connection closed"))
    }
}

impl SignalSink for RelayClient {
    fn send(&self, envelope: Envelope) -> Result<(), ChitterError> {
        if !self.is_online() {
            return Err(ChitterError::relay("relay offline"));
        }
        self.outbound
            .try_send(ClientFrame::Signal { envelope })
            .map_err(|e| ChitterError::relay(format!("outbound queue: {e}")))
    }
}
