// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal envelopes exchanged through the relay.
//!
//! Wire format is JSON with an internal `type` tag:
//!
//! ```json
//! {"type": "offer", "room": "dm-42", "from": "alice", "offer": {...}, "targets": ["bob"]}
//! {"type": "answer", "room": "dm-42", "from": "bob", "answer": {...}}
//! {"type": "ice-candidate", "room": "dm-42", "from": "bob", "candidate": {...}}
//! {"type": "call-state", "room": "dm-42", "from": "bob", "state": "in-call",
//!  "startedAt": 1700000000000, "participants": [{"user": "bob", "status": "connected"}]}
//! {"type": "decline", "room": "dm-42", "from": "bob"}
//! {"type": "ended", "room": "dm-42", "from": "alice", "startedAt": 1, "endedAt": 2}
//! ```
//!
//! Session descriptions and candidates are opaque JSON values.

use chitter_core::{CallState, ChitterError, RoomId, Timestamp, UserId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::Display;

use crate::roster::{Participant, Roster};

/// One signaling message. Adding a kind here forces every consumer's match
/// to be revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    Offer(Offer),
    Answer(Answer),
    IceCandidate(IceCandidate),
    CallState(CallStateUpdate),
    Decline(Decline),
    Ended(Ended),
}

/// Envelope discriminant, used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EnvelopeKind {
    Offer,
    Answer,
    IceCandidate,
    CallState,
    Decline,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
    pub offer: Value,
    /// Users to ring through their mailbox even if they are not in the room.
    #[serde(default)]
    pub targets: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStateUpdate {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
    pub state: CallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_participants"
    )]
    pub participants: Option<Vec<Participant>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decline {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ended {
    pub room: RoomId,
    #[serde(default)]
    pub from: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// Roster at hang-up time, so the relay can reach participants' mailboxes.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_participants"
    )]
    pub participants: Option<Vec<Participant>>,
}

fn lenient_participants<'de, D>(deserializer: D) -> Result<Option<Vec<Participant>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => Some(items.iter().filter_map(Participant::from_value).collect()),
        _ => None,
    })
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Offer(_) => EnvelopeKind::Offer,
            Envelope::Answer(_) => EnvelopeKind::Answer,
            Envelope::IceCandidate(_) => EnvelopeKind::IceCandidate,
            Envelope::CallState(_) => EnvelopeKind::CallState,
            Envelope::Decline(_) => EnvelopeKind::Decline,
            Envelope::Ended(_) => EnvelopeKind::Ended,
        }
    }

    pub fn room(&self) -> &RoomId {
        match self {
            Envelope::Offer(e) => &e.room,
            Envelope::Answer(e) => &e.room,
            Envelope::IceCandidate(e) => &e.room,
            Envelope::CallState(e) => &e.room,
            Envelope::Decline(e) => &e.room,
            Envelope::Ended(e) => &e.room,
        }
    }

    pub fn from(&self) -> &UserId {
        match self {
            Envelope::Offer(e) => &e.from,
            Envelope::Answer(e) => &e.from,
            Envelope::IceCandidate(e) => &e.from,
            Envelope::CallState(e) => &e.from,
            Envelope::Decline(e) => &e.from,
            Envelope::Ended(e) => &e.from,
        }
    }

    /// Stamp the sender. The relay calls this with the authenticated identity.
    pub fn set_from(&mut self, user: UserId) {
        let slot = match self {
            Envelope::Offer(e) => &mut e.from,
            Envelope::Answer(e) => &mut e.from,
            Envelope::IceCandidate(e) => &mut e.from,
            Envelope::CallState(e) => &mut e.from,
            Envelope::Decline(e) => &mut e.from,
            Envelope::Ended(e) => &mut e.from,
        };
        *slot = user;
    }

    /// Identities the relay must reach directly, independent of room
    /// membership: explicit offer targets, and the roster carried by
    /// `call-state` and `ended`.
    pub fn mailbox_targets(&self) -> Vec<UserId> {
        match self {
            Envelope::Offer(e) => e.targets.clone(),
            Envelope::CallState(CallStateUpdate { participants, .. })
            | Envelope::Ended(Ended { participants, .. }) => participants
                .iter()
                .flatten()
                .map(|p| p.user.clone())
                .collect(),
            Envelope::Answer(_) | Envelope::IceCandidate(_) | Envelope::Decline(_) => Vec::new(),
        }
    }

    /// The roster carried by the envelope, if any entries survived decoding.
    pub fn roster(&self) -> Option<Roster> {
        let participants = match self {
            Envelope::CallState(e) => e.participants.as_ref(),
            Envelope::Ended(e) => e.participants.as_ref(),
            _ => None,
        }?;
        if participants.is_empty() {
            None
        } else {
            Some(participants.iter().cloned().collect())
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ChitterError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ChitterError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::ParticipantStatus;
    use serde_json::json;

    #[test]
    fn offer_wire_shape() {
        let env = Envelope::Offer(Offer {
            room: "dm-42".into(),
            from: "alice".into(),
            offer: json!({"sdp": "v=0"}),
            targets: vec!["bob".into()],
        });
        let value: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": "offer", "room": "dm-42", "from": "alice",
                   "offer": {"sdp": "v=0"}, "targets": ["bob"]})
        );
        assert_eq!(env.kind().to_string(), "offer");
        assert_eq!(env.mailbox_targets(), vec![UserId::new("bob")]);
    }

    #[test]
    fn call_state_uses_camel_case_and_kebab_state() {
        let text = r#"{"type":"call-state","room":"dm-42","from":"bob","state":"in-call",
                       "startedAt":1700,"participants":[{"user":"bob","status":"connected"},"alice"]}"#;
        let env = Envelope::from_json(text).unwrap();
        let Envelope::CallState(update) = &env else {
            panic!("expected call-state, got {env:?}");
        };
        assert_eq!(update.state, CallState::InCall);
        assert_eq!(update.started_at, Some(1700));
        let roster = env.roster().unwrap();
        assert_eq!(roster.status(&"bob".into()), Some(ParticipantStatus::Connected));
        assert_eq!(roster.status(&"alice".into()), Some(ParticipantStatus::Ringing));
        let mut targets = env.mailbox_targets();
        targets.sort();
        assert_eq!(targets, vec![UserId::new("alice"), UserId::new("bob")]);
    }

    #[test]
    fn malformed_participants_are_dropped_not_fatal() {
        let text = r#"{"type":"call-state","room":"r","state":"idle","participants":[1, {"nope":true}]}"#;
        let env = Envelope::from_json(text).unwrap();
        assert!(env.roster().is_none());
        assert!(env.mailbox_targets().is_empty());

        let text = r#"{"type":"call-state","room":"r","state":"idle","participants":"garbage"}"#;
        let env = Envelope::from_json(text).unwrap();
        assert!(env.roster().is_none());
    }

    #[test]
    fn missing_from_defaults_and_can_be_stamped() {
        let mut env = Envelope::from_json(r#"{"type":"decline","room":"dm-1"}"#).unwrap();
        assert!(env.from().is_empty());
        env.set_from("carol".into());
        assert_eq!(env.from().as_str(), "carol");
        assert_eq!(env.room().as_str(), "dm-1");
    }

    #[test]
    fn ended_skips_absent_fields() {
        let env = Envelope::Ended(Ended {
            room: "dm-42".into(),
            from: "alice".into(),
            started_at: Some(10),
            ended_at: Some(20),
            participants: None,
        });
        let value: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": "ended", "room": "dm-42", "from": "alice", "startedAt": 10, "endedAt": 20})
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Envelope::from_json(r#"{"type":"video-offer","room":"r"}"#).unwrap_err();
        assert!(matches!(err, ChitterError::Protocol { .. }));
    }

    #[test]
    fn ice_candidate_tag() {
        let env = Envelope::IceCandidate(IceCandidate {
            room: "r".into(),
            from: "a".into(),
            candidate: json!({"candidate": "candidate:1 1 udp"}),
        });
        let text = env.to_json().unwrap();
        assert!(text.contains("\"type\":\"ice-candidate\""));
        assert_eq!(Envelope::from_json(&text).unwrap(), env);
    }
}
