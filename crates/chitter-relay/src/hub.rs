// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry and envelope fan-out.
//!
//! The hub owns three maps:
//! - `conn -> (user, sender, rooms)`
//! - `room -> {conn}`
//! - `user -> {conn}` (presence, behind a mutex so the online count moves
//!   atomically with connect/disconnect)
//!
//! Guards from one map are never held while touching another.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use chitter_core::{ChitterError, RoomId, UserId};
use chitter_signal::{Envelope, ServerFrame};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::metrics;

/// Identifies one live socket. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Connection {
    user: UserId,
    sender: mpsc::Sender<ServerFrame>,
    rooms: HashSet<RoomId>,
}

/// Where one forwarded envelope went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Connections reached through room membership.
    pub room: usize,
    /// Connections reached only through a user mailbox.
    pub mailbox: usize,
    /// Connections whose queue was full or closed.
    pub dropped: usize,
}

impl Delivery {
    pub fn delivered(&self) -> usize {
        self.room + self.mailbox
    }
}

#[derive(Default)]
pub struct Hub {
    conns: DashMap<ConnId, Connection>,
    rooms: DashMap<RoomId, HashSet<ConnId>>,
    presence: Mutex<HashMap<UserId, HashSet<ConnId>>>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.conns.len())
            .field("rooms", &self.rooms.len())
            .field("online", &self.presence_count())
            .finish()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket for `user`. The new connection is greeted with
    /// `welcome`; everyone else hears `online-count` if the user just came
    /// online. The caller owns the id and must [`disconnect`](Self::disconnect) it.
    pub fn connect(&self, user: UserId, sender: mpsc::Sender<ServerFrame>) -> ConnId {
        let conn = ConnId::new();
        let greeting = sender.clone();
        self.conns.insert(
            conn,
            Connection {
                user: user.clone(),
                sender,
                rooms: HashSet::new(),
            },
        );

        let (online, came_online) = {
            let mut presence = self.lock_presence();
            let conns = presence.entry(user.clone()).or_default();
            let came_online = conns.is_empty();
            conns.insert(conn);
            (presence.len(), came_online)
        };

        metrics::record_connection_opened();
        debug!(conn = %conn, user = %user, online, "connection registered");
        let _ = greeting.try_send(ServerFrame::Welcome {
            user: user.clone(),
            online,
        });
        if came_online {
            metrics::set_online_users(online);
            self.broadcast(ServerFrame::OnlineCount { count: online }, Some(conn));
        }
        conn
    }

    /// Remove a socket from every room and from its user's presence set.
    /// Unknown ids are ignored, so calling twice is harmless.
    pub fn disconnect(&self, conn: ConnId) {
        let Some((_, connection)) = self.conns.remove(&conn) else {
            return;
        };
        for room in &connection.rooms {
            self.detach(conn, room);
        }

        let (online, went_offline) = {
            let mut presence = self.lock_presence();
            let went_offline = match presence.get_mut(&connection.user) {
                Some(conns) => {
                    conns.remove(&conn);
                    conns.is_empty()
                }
                None => false,
            };
            if went_offline {
                presence.remove(&connection.user);
            }
            (presence.len(), went_offline)
        };

        metrics::record_connection_closed();
        debug!(conn = %conn, user = %connection.user, online, "connection removed");
        if went_offline {
            metrics::set_online_users(online);
            self.broadcast(ServerFrame::OnlineCount { count: online }, None);
        }
    }

    /// Add a connection to a room's fan-out set. Idempotent.
    pub fn join(&self, conn: ConnId, room: RoomId) -> Result<(), ChitterError> {
        match self.conns.get_mut(&conn) {
            Some(mut connection) => {
                connection.rooms.insert(room.clone());
            }
            None => return Err(unknown(conn)),
        }
        self.rooms.entry(room.clone()).or_default().insert(conn);
        trace!(conn = %conn, room = %room, "joined room");
        Ok(())
    }

    /// Remove a connection from a room. Idempotent.
    pub fn leave(&self, conn: ConnId, room: &RoomId) -> Result<(), ChitterError> {
        match self.conns.get_mut(&conn) {
            Some(mut connection) => {
                connection.rooms.remove(room);
            }
            None => return Err(unknown(conn)),
        }
        self.detach(conn, room);
        trace!(conn = %conn, room = %room, "left room");
        Ok(())
    }

    /// Relay an envelope from `conn`.
    ///
    /// `from` is overwritten with the connection's user. Every other
    /// connection in the envelope's room gets it, and so does every
    /// connection of each mailbox target (offer targets, or the roster of
    /// `call-state`/`ended`). No connection gets it twice, and the sending
    /// connection never gets it back.
    pub fn forward(&self, conn: ConnId, mut envelope: Envelope) -> Result<Delivery, ChitterError> {
        let user = self
            .conns
            .get(&conn)
            .map(|c| c.user.clone())
            .ok_or_else(|| unknown(conn))?;
        envelope.set_from(user);

        let room_conns: Vec<ConnId> = self
            .rooms
            .get(envelope.room())
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();

        let targets = envelope.mailbox_targets();
        let mailbox_conns: Vec<ConnId> = if targets.is_empty() {
            Vec::new()
        } else {
            let presence = self.lock_presence();
            targets
                .iter()
                .filter_map(|user| presence.get(user))
                .flat_map(|conns| conns.iter().copied())
                .collect()
        };

        let mut seen = HashSet::from([conn]);
        let mut delivery = Delivery::default();
        for target in room_conns {
            if seen.insert(target) {
                match self.send_to(target, ServerFrame::Signal { envelope: envelope.clone() }) {
                    true => delivery.room += 1,
                    false => delivery.dropped += 1,
                }
            }
        }
        for target in mailbox_conns {
            if seen.insert(target) {
                match self.send_to(target, ServerFrame::Signal { envelope: envelope.clone() }) {
                    true => delivery.mailbox += 1,
                    false => delivery.dropped += 1,
                }
            }
        }

        metrics::record_forward(envelope.kind(), &delivery);
        debug!(
            conn = %conn,
            kind = %envelope.kind(),
            room = %envelope.room(),
            from = %envelope.from(),
            room_deliveries = delivery.room,
            mailbox_deliveries = delivery.mailbox,
            dropped = delivery.dropped,
            "envelope forwarded"
        );
        Ok(delivery)
    }

    /// Queue a frame for one connection. False if the connection is gone or
    /// its queue is full.
    pub fn send_to(&self, conn: ConnId, frame: ServerFrame) -> bool {
        let Some(sender) = self.conns.get(&conn).map(|c| c.sender.clone()) else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                trace!(conn = %conn, error = %e, "dropped frame");
                false
            }
        }
    }

    /// Number of users with at least one live connection.
    pub fn presence_count(&self) -> usize {
        self.lock_presence().len()
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.lock_presence().contains_key(user)
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Connections currently joined to `room`.
    pub fn room_size(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    fn detach(&self, conn: ConnId, room: &RoomId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&conn);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    fn broadcast(&self, frame: ServerFrame, except: Option<ConnId>) {
        let senders: Vec<mpsc::Sender<ServerFrame>> = self
            .conns
            .iter()
            .filter(|entry| Some(*entry.key()) != except)
            .map(|entry| entry.value().sender.clone())
            .collect();
        for sender in senders {
            let _ = sender.try_send(frame.clone());
        }
    }

    fn lock_presence(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, HashSet<ConnId>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.presence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unknown(conn: ConnId) -> ChitterError {
    ChitterError::relay(format!("unknown connection {conn}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chitter_core::CallState;
    use chitter_signal::{CallStateUpdate, Decline, Offer, Participant};
    use serde_json::json;
    use tracing_test::traced_test;

    fn client(hub: &Hub, user: &str) -> (ConnId, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(16);
        (hub.connect(user.into(), tx), rx)
    }

    fn signals(rx: &mut mpsc::Receiver<ServerFrame>) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let ServerFrame::Signal { envelope } = frame {
                out.push(envelope);
            }
        }
        out
    }

    fn drain(rx: &mut mpsc::Receiver<ServerFrame>) {
        while rx.try_recv().is_ok() {}
    }

    fn decline(room: &str, from: &str) -> Envelope {
        Envelope::Decline(Decline {
            room: room.into(),
            from: from.into(),
        })
    }

    #[test]
    fn welcome_carries_online_count() {
        let hub = Hub::new();
        let (_a, _rx_a) = client(&hub, "alice");
        let (_b, mut rx_b) = client(&hub, "bob");
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerFrame::Welcome {
                user: "bob".into(),
                online: 2
            }
        );
    }

    #[test]
    fn presence_counts_users_not_sockets() {
        let hub = Hub::new();
        let (a1, _r1) = client(&hub, "alice");
        let (a2, _r2) = client(&hub, "alice");
        let (_b, mut rx_b) = client(&hub, "bob");
        assert_eq!(hub.presence_count(), 2);
        assert_eq!(hub.connection_count(), 3);
        drain(&mut rx_b);

        hub.disconnect(a1);
        assert!(hub.is_online(&"alice".into()));
        assert!(rx_b.try_recv().is_err());

        hub.disconnect(a2);
        assert!(!hub.is_online(&"alice".into()));
        assert_eq!(rx_b.try_recv().unwrap(), ServerFrame::OnlineCount { count: 1 });

        hub.disconnect(a2);
        assert_eq!(hub.presence_count(), 1);
    }

    #[test]
    #[traced_test]
    fn room_broadcast_skips_sender_and_stamps_from() {
        let hub = Hub::new();
        let (a, mut rx_a) = client(&hub, "alice");
        let (b, mut rx_b) = client(&hub, "bob");
        let (_c, mut rx_c) = client(&hub, "carol");
        hub.join(a, "dm".into()).unwrap();
        hub.join(b, "dm".into()).unwrap();
        hub.join(b, "dm".into()).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        let delivery = hub.forward(a, decline("dm", "mallory")).unwrap();
        assert_eq!(
            delivery,
            Delivery {
                room: 1,
                mailbox: 0,
                dropped: 0
            }
        );
        assert_eq!(signals(&mut rx_b), vec![decline("dm", "alice")]);
        assert!(signals(&mut rx_a).is_empty());
        assert!(signals(&mut rx_c).is_empty());
        assert!(logs_contain("envelope forwarded"));
    }

    #[test]
    fn offer_reaches_targets_outside_the_room_once() {
        let hub = Hub::new();
        let (a, _rx_a) = client(&hub, "alice");
        let (b1, mut rx_b1) = client(&hub, "bob");
        let (_b2, mut rx_b2) = client(&hub, "bob");
        hub.join(a, "dm".into()).unwrap();
        hub.join(b1, "dm".into()).unwrap();
        drain(&mut rx_b1);
        drain(&mut rx_b2);

        let offer = Envelope::Offer(Offer {
            room: "dm".into(),
            from: "alice".into(),
            offer: json!({"sdp": "v=0"}),
            targets: vec!["bob".into(), "bob".into()],
        });
        let delivery = hub.forward(a, offer).unwrap();
        assert_eq!(delivery.room, 1);
        assert_eq!(delivery.mailbox, 1);
        assert_eq!(signals(&mut rx_b1).len(), 1);
        assert_eq!(signals(&mut rx_b2).len(), 1);
    }

    #[test]
    fn call_state_roster_is_a_mailbox() {
        let hub = Hub::new();
        let (a, _rx_a) = client(&hub, "alice");
        let (_c, mut rx_c) = client(&hub, "carol");
        drain(&mut rx_c);

        let update = Envelope::CallState(CallStateUpdate {
            room: "group".into(),
            from: "alice".into(),
            state: CallState::InCall,
            started_at: Some(10),
            participants: Some(vec![Participant::connected("alice"), Participant::ringing("carol")]),
        });
        let delivery = hub.forward(a, update).unwrap();
        assert_eq!(delivery.mailbox, 1);
        assert_eq!(signals(&mut rx_c).len(), 1);
    }

    #[test]
    fn full_queue_counts_as_dropped() {
        let hub = Hub::new();
        let (a, _rx_a) = client(&hub, "alice");
        let (tx, _rx) = mpsc::channel(1);
        let b = hub.connect("bob".into(), tx);
        hub.join(a, "dm".into()).unwrap();
        hub.join(b, "dm".into()).unwrap();

        let delivery = hub.forward(a, decline("dm", "alice")).unwrap();
        assert_eq!(delivery.dropped, 1);
        assert_eq!(delivery.delivered(), 0);
    }

    #[test]
    fn leave_and_disconnect_clean_up_rooms() {
        let hub = Hub::new();
        let (a, _rx_a) = client(&hub, "alice");
        let (b, _rx_b) = client(&hub, "bob");
        hub.join(a, "dm".into()).unwrap();
        hub.join(b, "dm".into()).unwrap();
        assert_eq!(hub.room_size(&"dm".into()), 2);

        hub.leave(a, &"dm".into()).unwrap();
        hub.leave(a, &"dm".into()).unwrap();
        assert_eq!(hub.room_size(&"dm".into()), 1);

        hub.disconnect(b);
        assert_eq!(hub.room_size(&"dm".into()), 0);
        assert!(hub.join(b, "dm".into()).is_err());
        assert!(hub.forward(b, decline("dm", "bob")).is_err());
    }
}
