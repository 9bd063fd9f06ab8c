// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Participant roster and its reconciliation rules.
//!
//! A roster is keyed by user. Status only ever improves: once a participant
//! is `Connected`, merging any update (in any order, any number of times)
//! keeps them `Connected`. Only an explicit reset starts from an empty map.

use std::collections::BTreeMap;

use chitter_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection status of one participant. Ordered so that `max` picks the
/// dominating status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Ringing,
    Connected,
}

/// One roster entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user: UserId,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn ringing(user: impl Into<UserId>) -> Self {
        Participant {
            user: user.into(),
            status: ParticipantStatus::Ringing,
        }
    }

    pub fn connected(user: impl Into<UserId>) -> Self {
        Participant {
            user: user.into(),
            status: ParticipantStatus::Connected,
        }
    }

    /// Lenient decoding used for remote payloads.
    ///
    /// A bare string is a ringing user. An object needs a non-empty `user`
    /// string; any status other than `"connected"` reads as ringing.
    /// Everything else is dropped.
    pub fn from_value(value: &Value) -> Option<Participant> {
        match value {
            Value::String(user) if !user.is_empty() => Some(Participant::ringing(user.as_str())),
            Value::Object(map) => {
                let user = map.get("user")?.as_str().filter(|u| !u.is_empty())?;
                let status = match map.get("status").and_then(Value::as_str) {
                    Some("connected") => ParticipantStatus::Connected,
                    _ => ParticipantStatus::Ringing,
                };
                Some(Participant {
                    user: UserId::new(user),
                    status,
                })
            }
            _ => None,
        }
    }
}

impl From<&str> for Participant {
    fn from(user: &str) -> Self {
        Participant::ringing(user)
    }
}

/// The set of known call participants, at most one entry per user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: BTreeMap<UserId, ParticipantStatus>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or improve one entry. `Connected` always wins over `Ringing`.
    pub fn upsert(&mut self, user: UserId, status: ParticipantStatus) {
        self.entries
            .entry(user)
            .and_modify(|s| *s = (*s).max(status))
            .or_insert(status);
    }

    pub fn mark_connected(&mut self, user: &UserId) {
        self.upsert(user.clone(), ParticipantStatus::Connected);
    }

    /// Fold every entry of `updates` into this roster.
    pub fn absorb(&mut self, updates: &Roster) {
        for (user, status) in &updates.entries {
            self.upsert(user.clone(), *status);
        }
    }

    /// Drop a participant entirely. Returns whether they were present.
    pub fn remove(&mut self, user: &UserId) -> bool {
        self.entries.remove(user).is_some()
    }

    pub fn status(&self, user: &UserId) -> Option<ParticipantStatus> {
        self.entries.get(user).copied()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.entries.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| **s == ParticipantStatus::Connected)
            .count()
    }

    /// Connected participants other than `me`.
    pub fn connected_peers(&self, me: &UserId) -> usize {
        self.entries
            .iter()
            .filter(|(user, status)| *user != me && **status == ParticipantStatus::Connected)
            .count()
    }

    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.entries.keys()
    }

    /// Entries sorted by user id, ready to go on the wire.
    pub fn participants(&self) -> Vec<Participant> {
        self.entries
            .iter()
            .map(|(user, status)| Participant {
                user: user.clone(),
                status: *status,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<Participant> for Roster {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for p in iter {
            roster.upsert(p.user, p.status);
        }
        roster
    }
}

/// Reconcile a locally known roster with remotely reported updates.
///
/// With `reset` the base is ignored entirely; this is only used when a fresh
/// call begins. The result does not depend on argument order.
pub fn merge(base: &Roster, updates: &Roster, reset: bool) -> Roster {
    let mut merged = if reset { Roster::new() } else { base.clone() };
    merged.absorb(updates);
    merged
}
