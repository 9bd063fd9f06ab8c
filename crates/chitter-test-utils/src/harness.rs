// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-client call harness.
//!
//! `CallHarness` runs one [`CallDriver`] per user, each with its own mock
//! media and transport, all wired through a single in-process relay [`Hub`].
//! History is shared, as it would be for a real room.

use std::sync::Arc;
use std::time::Duration;

use chitter_call::{
    CallDriver, Collaborators, DriverConfig, DriverEvent, DriverHandle, DriverState,
    MemoryHistory, SignalSink, Timings,
};
use chitter_core::{ChitterError, RoomId, UserId};
use chitter_relay::{ConnId, Hub};
use chitter_signal::{Envelope, ServerFrame};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::mock_media::MockMedia;
use crate::mock_transport::MockTransport;

const CLIENT_QUEUE: usize = 64;

/// Sends envelopes straight into the hub as connection `conn`.
#[derive(Debug, Clone)]
pub struct HubSink {
    hub: Arc<Hub>,
    conn: ConnId,
}

impl HubSink {
    pub fn new(hub: Arc<Hub>, conn: ConnId) -> Self {
        Self { hub, conn }
    }
}

impl SignalSink for HubSink {
    fn send(&self, envelope: Envelope) -> Result<(), ChitterError> {
        self.hub.forward(self.conn, envelope).map(|_| ())
    }
}

/// One simulated user.
pub struct TestClient {
    pub user: UserId,
    pub handle: DriverHandle,
    pub media: Arc<MockMedia>,
    pub transport: Arc<MockTransport>,
    pub conn: ConnId,
    cancel: CancellationToken,
}

impl TestClient {
    pub fn state(&self) -> DriverState {
        self.handle.state()
    }

    pub async fn wait_for(
        &self,
        timeout: Duration,
        pred: impl FnMut(&DriverState) -> bool,
    ) -> Result<DriverState, ChitterError> {
        self.handle.wait_for(timeout, pred).await
    }
}

/// Builder for [`CallHarness`].
pub struct CallHarnessBuilder {
    users: Vec<UserId>,
    rooms: Vec<RoomId>,
    config: DriverConfig,
    media_delay: Option<Duration>,
}

impl CallHarnessBuilder {
    fn new() -> Self {
        Self {
            users: Vec::new(),
            rooms: Vec::new(),
            config: DriverConfig::default(),
            media_delay: None,
        }
    }

    pub fn with_users<I, U>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    /// Every client joins this room on connect.
    pub fn with_room(mut self, room: &str) -> Self {
        self.rooms.push(room.into());
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.config.timings = timings;
        self
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Audio acquisition takes this long on every client.
    pub fn with_media_delay(mut self, delay: Duration) -> Self {
        self.media_delay = Some(delay);
        self
    }

    pub fn build(self) -> Result<CallHarness, ChitterError> {
        let hub = Arc::new(Hub::new());
        let history = Arc::new(MemoryHistory::new());
        let cancel = CancellationToken::new();
        let mut clients = Vec::with_capacity(self.users.len());

        for user in self.users {
            let (frames_tx, frames_rx) = mpsc::channel::<ServerFrame>(CLIENT_QUEUE);
            let conn = hub.connect(user.clone(), frames_tx);
            for room in &self.rooms {
                hub.join(conn, room.clone())?;
            }

            let media = Arc::new(match self.media_delay {
                Some(delay) => MockMedia::with_delay(delay),
                None => MockMedia::new(),
            });
            let transport = Arc::new(MockTransport::new());
            let collab = Collaborators {
                media: media.clone(),
                transport: transport.clone(),
                history: history.clone(),
                sink: Arc::new(HubSink::new(hub.clone(), conn)),
            };
            let (driver, handle) = CallDriver::new(user.clone(), self.config.clone(), collab);
            let client_cancel = cancel.child_token();
            tokio::spawn(driver.run(client_cancel.clone()));
            tokio::spawn(pump(frames_rx, handle.events(), client_cancel.clone()));

            clients.push(TestClient {
                user,
                handle,
                media,
                transport,
                conn,
                cancel: client_cancel,
            });
        }

        Ok(CallHarness {
            hub,
            history,
            clients,
            cancel,
        })
    }
}

/// Delivers relay frames to a driver, the way the relay client would.
async fn pump(
    mut frames: mpsc::Receiver<ServerFrame>,
    events: mpsc::Sender<DriverEvent>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        match frame {
            ServerFrame::Signal { envelope } => {
                if events.send(DriverEvent::Inbound(envelope)).await.is_err() {
                    break;
                }
            }
            other => trace!(?other, "control frame"),
        }
    }
}

pub struct CallHarness {
    pub hub: Arc<Hub>,
    pub history: Arc<MemoryHistory>,
    clients: Vec<TestClient>,
    cancel: CancellationToken,
}

impl CallHarness {
    pub fn builder() -> CallHarnessBuilder {
        CallHarnessBuilder::new()
    }

    /// Two users, `alice` and `bob`, sharing room `dm`.
    pub fn pair() -> Result<CallHarness, ChitterError> {
        Self::builder()
            .with_users(["alice", "bob"])
            .with_room("dm")
            .build()
    }

    /// Look up a client by user id.
    ///
    /// # Panics
    ///
    /// Panics if no client has that id.
    pub fn client(&self, user: &str) -> &TestClient {
        self.clients
            .iter()
            .find(|c| c.user.as_str() == user)
            .unwrap_or_else(|| panic!("no test client named {user}"))
    }

    pub fn clients(&self) -> &[TestClient] {
        &self.clients
    }

    /// Kill a client without letting it say goodbye: its relay connection
    /// disappears first, so nothing it sends while stopping gets out.
    pub fn crash(&self, user: &str) {
        let client = self.client(user);
        self.hub.disconnect(client.conn);
        client.cancel.cancel();
    }

    /// Stop a client normally. An active call is hung up first.
    pub fn stop(&self, user: &str) {
        self.client(user).cancel.cancel();
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CallHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
