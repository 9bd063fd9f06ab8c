// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client call session state machine.
//!
//! States: Idle -> Calling -> InCall -> Idle.
//!
//! The machine is synchronous. Every input returns the [`Effect`]s the
//! driver must carry out: send an envelope, touch the audio device or the
//! peer transport, arm or cancel a timer, persist a summary, notify the UI.
//! Async completions come back tagged with the [`CallId`] that requested
//! them; completions for a call that no longer exists are discarded, and any
//! audio handle they carry is released.
//!
//! Protocol anomalies (reordering, duplicates, unknown rooms, echoes of our
//! own envelopes) are absorbed here and only logged at `debug`.

use std::fmt;

use chitter_core::types::format_call_duration;
use chitter_core::{CallSettings, CallState, MediaFailure, MediaHandle, RoomId, Timestamp, UserId};
use chitter_signal::{
    Answer, CallStateUpdate, Decline, Ended, Envelope, IceCandidate, Offer, Participant,
    ParticipantStatus, Roster, merge,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::timers::TimerKind;

/// Remote candidates buffered before the transport exists. Extra ones are dropped.
const MAX_PENDING_CANDIDATES: usize = 128;

/// Identifies one call instance on this client. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Which side of the negotiation this client plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Caller,
    Callee,
}

/// A failure surfaced to the user. Dismissible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallFailure {
    #[error("could not start audio: {0}")]
    Media(MediaFailure),

    #[error("call connection failed: {0}")]
    Transport(String),

    #[error("lost connection to the relay")]
    RelayLost,
}

/// UI-facing events.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    IncomingCall { room: RoomId, from: UserId },
    Connected { room: RoomId, started_at: Timestamp },
    Declined { room: RoomId, user: UserId },
    Missed { room: RoomId, from: UserId },
    Unanswered { room: RoomId },
    Ended { room: RoomId, duration_secs: Option<u64> },
    Failed(CallFailure),
}

/// Work the driver performs on behalf of the machine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Envelope),
    AcquireMedia { call: CallId },
    ReleaseMedia(MediaHandle),
    OpenTransport { call: CallId, media: MediaHandle },
    CreateOffer { call: CallId },
    CreateAnswer { call: CallId, offer: Value },
    ApplyAnswer { call: CallId, answer: Value },
    AddCandidate { call: CallId, candidate: Value },
    CloseTransport,
    ArmTimer(TimerKind),
    CancelTimer(TimerKind),
    PersistSummary {
        room: RoomId,
        author: UserId,
        duration_text: String,
    },
    Notify(Notice),
}

/// Read-only view of the active call, published to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCall {
    pub call: CallId,
    pub room: RoomId,
    pub state: CallState,
    pub role: Role,
    pub initiator: Option<UserId>,
    pub started_at: Option<Timestamp>,
    pub participants: Vec<Participant>,
    /// An incoming offer is waiting to be accepted or declined.
    pub ringing: bool,
    pub has_joined_media: bool,
}

#[derive(Debug)]
struct CallSession {
    call: CallId,
    room: RoomId,
    role: Role,
    state: CallState,
    initiator: Option<UserId>,
    started_at: Option<Timestamp>,
    roster: Roster,
    /// Identities the caller's offer is addressed to.
    targets: Vec<UserId>,
    /// Callee: the offer blob until it has been answered.
    remote_offer: Option<Value>,
    accepted: bool,
    wants_media: bool,
    media: Option<MediaHandle>,
    has_joined_media: bool,
    transport_open: bool,
    answer_applied: bool,
    local_offer: Option<Value>,
    pending_candidates: Vec<Value>,
}

impl CallSession {
    fn new(call: CallId, room: RoomId, role: Role, state: CallState) -> Self {
        Self {
            call,
            room,
            role,
            state,
            initiator: None,
            started_at: None,
            roster: Roster::new(),
            targets: Vec::new(),
            remote_offer: None,
            accepted: false,
            wants_media: false,
            media: None,
            has_joined_media: false,
            transport_open: false,
            answer_applied: false,
            local_offer: None,
            pending_candidates: Vec::new(),
        }
    }

    /// Callee that has not accepted yet.
    fn is_ringing(&self) -> bool {
        self.role == Role::Callee && !self.accepted
    }
}

/// The call state machine for one local user. At most one call at a time.
#[derive(Debug)]
pub struct CallMachine {
    me: UserId,
    settings: CallSettings,
    session: Option<CallSession>,
    next_call: u64,
    error: Option<CallFailure>,
}

impl CallMachine {
    pub fn new(me: UserId, settings: CallSettings) -> Self {
        Self {
            me,
            settings,
            session: None,
            next_call: 1,
            error: None,
        }
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    pub fn settings(&self) -> &CallSettings {
        &self.settings
    }

    /// Replace user preferences. Affects future calls only.
    pub fn set_settings(&mut self, settings: CallSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> CallState {
        self.session.as_ref().map(|s| s.state).unwrap_or_default()
    }

    /// The call that async completions must carry to be accepted.
    pub fn active_call(&self) -> Option<CallId> {
        self.session.as_ref().map(|s| s.call)
    }

    pub fn error(&self) -> Option<&CallFailure> {
        self.error.as_ref()
    }

    pub fn snapshot(&self) -> Option<ActiveCall> {
        self.session.as_ref().map(|s| ActiveCall {
            call: s.call,
            room: s.room.clone(),
            state: s.state,
            role: s.role,
            initiator: s.initiator.clone(),
            started_at: s.started_at,
            participants: s.roster.participants(),
            ringing: s.is_ringing(),
            has_joined_media: s.has_joined_media,
        })
    }

    // --- local commands ---

    /// Place a call to the other members of `room`.
    pub fn start_call(&mut self, room: RoomId, members: Vec<UserId>) -> Vec<Effect> {
        if let Some(s) = &self.session {
            debug!(room = %room, active = %s.room, "start_call ignored, already in a call");
            return Vec::new();
        }
        if !self.settings.calls_enabled {
            debug!(room = %room, "start_call ignored, calls disabled");
            return Vec::new();
        }

        self.error = None;
        let call = self.allocate_call();
        let mut session = CallSession::new(call, room, Role::Caller, CallState::Calling);
        session.initiator = Some(self.me.clone());
        session.roster.upsert(self.me.clone(), ParticipantStatus::Connected);
        for member in members {
            if member != self.me && !session.targets.contains(&member) {
                session.roster.upsert(member.clone(), ParticipantStatus::Ringing);
                session.targets.push(member);
            }
        }
        session.wants_media = true;

        info!(room = %session.room, call = %call, targets = session.targets.len(), "starting call");
        let effects = vec![
            Effect::AcquireMedia { call },
            Effect::Send(call_state_envelope(&self.me, &session, CallState::Calling)),
            Effect::ArmTimer(TimerKind::RingFallback),
        ];
        self.session = Some(session);
        effects
    }

    /// Accept the pending incoming offer.
    pub fn accept_offer(&mut self) -> Vec<Effect> {
        let Some(s) = self.session.as_mut() else {
            return Vec::new();
        };
        if !s.is_ringing() || s.remote_offer.is_none() {
            debug!(room = %s.room, "accept ignored, no pending offer");
            return Vec::new();
        }
        s.accepted = true;
        s.wants_media = true;
        s.state = CallState::Calling;
        info!(room = %s.room, call = %s.call, "accepting call");
        vec![Effect::AcquireMedia { call: s.call }]
    }

    /// Reject the pending offer. Same as hanging up.
    pub fn decline_offer(&mut self, now: Timestamp) -> Vec<Effect> {
        self.hang_up(now)
    }

    /// Leave the call. Sends `decline` if audio never joined, else `ended`.
    pub fn hang_up(&mut self, now: Timestamp) -> Vec<Effect> {
        let Some(s) = &self.session else {
            return Vec::new();
        };
        let farewell = if s.has_joined_media {
            ended_envelope(&self.me, s, now)
        } else {
            Envelope::Decline(Decline {
                room: s.room.clone(),
                from: self.me.clone(),
            })
        };
        info!(room = %s.room, call = %s.call, kind = %farewell.kind(), "hanging up");
        let mut effects = vec![Effect::Send(farewell)];
        self.teardown(now, &mut effects);
        effects
    }

    /// Re-send the cached offer while still ringing out.
    pub fn ring_again(&mut self) -> Vec<Effect> {
        let Some(s) = &self.session else {
            return Vec::new();
        };
        let Some(blob) = s.local_offer.clone() else {
            return Vec::new();
        };
        if s.role != Role::Caller || s.state != CallState::Calling {
            return Vec::new();
        }
        debug!(room = %s.room, "ringing again");
        vec![
            Effect::Send(Envelope::Offer(Offer {
                room: s.room.clone(),
                from: self.me.clone(),
                offer: blob,
                targets: s.targets.clone(),
            })),
            Effect::Send(call_state_envelope(&self.me, s, CallState::Calling)),
            Effect::ArmTimer(TimerKind::RingFallback),
        ]
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    // --- async completions ---

    pub fn media_acquired(&mut self, call: CallId, handle: MediaHandle) -> Vec<Effect> {
        let Some(s) = self
            .session
            .as_mut()
            .filter(|s| s.call == call && s.wants_media)
        else {
            debug!(call = %call, "late media handle, releasing");
            return vec![Effect::ReleaseMedia(handle)];
        };

        s.media = Some(handle);
        s.has_joined_media = true;
        s.wants_media = false;
        s.transport_open = true;

        let mut effects = vec![Effect::OpenTransport {
            call,
            media: handle,
        }];
        match s.role {
            Role::Caller => effects.push(Effect::CreateOffer { call }),
            Role::Callee => match s.remote_offer.clone() {
                Some(offer) => effects.push(Effect::CreateAnswer { call, offer }),
                None => debug!(call = %call, "no remote offer to answer"),
            },
        }
        effects.extend(
            s.pending_candidates
                .drain(..)
                .map(|candidate| Effect::AddCandidate { call, candidate }),
        );
        effects
    }

    pub fn media_failed(&mut self, call: CallId, reason: MediaFailure, now: Timestamp) -> Vec<Effect> {
        if self.active_call() != Some(call) {
            return Vec::new();
        }
        info!(call = %call, error = %reason, "media acquisition failed");
        let failure = CallFailure::Media(reason);
        self.error = Some(failure.clone());
        let mut effects = Vec::new();
        self.teardown(now, &mut effects);
        effects.push(Effect::Notify(Notice::Failed(failure)));
        effects
    }

    /// The transport produced the local offer (caller) or answer (callee).
    pub fn local_description_ready(&mut self, call: CallId, blob: Value, now: Timestamp) -> Vec<Effect> {
        let me = self.me.clone();
        let Some(s) = self.session.as_mut().filter(|s| s.call == call) else {
            return Vec::new();
        };

        match s.role {
            Role::Caller => {
                s.local_offer = Some(blob.clone());
                vec![Effect::Send(Envelope::Offer(Offer {
                    room: s.room.clone(),
                    from: me,
                    offer: blob,
                    targets: s.targets.clone(),
                }))]
            }
            Role::Callee => {
                if !s.accepted || s.state == CallState::InCall {
                    return Vec::new();
                }
                s.remote_offer = None;
                s.state = CallState::InCall;
                let started_at = *s.started_at.get_or_insert(now);
                s.roster.mark_connected(&me);
                if let Some(initiator) = &s.initiator {
                    s.roster.mark_connected(initiator);
                }
                info!(room = %s.room, call = %call, "call connected");

                let answer = Envelope::Answer(Answer {
                    room: s.room.clone(),
                    from: me.clone(),
                    answer: blob,
                });
                vec![
                    Effect::Send(answer),
                    Effect::CancelTimer(TimerKind::RingFallback),
                    Effect::CancelTimer(TimerKind::IdleGrace),
                    Effect::Send(call_state_envelope(&me, s, CallState::InCall)),
                    Effect::Notify(Notice::Connected {
                        room: s.room.clone(),
                        started_at,
                    }),
                ]
            }
        }
    }

    /// A candidate gathered by the local transport, to be relayed to peers.
    pub fn local_candidate(&self, call: CallId, candidate: Value) -> Vec<Effect> {
        match &self.session {
            Some(s) if s.call == call => vec![Effect::Send(Envelope::IceCandidate(IceCandidate {
                room: s.room.clone(),
                from: self.me.clone(),
                candidate,
            }))],
            _ => Vec::new(),
        }
    }

    /// Negotiation failed. Treated as a local hang-up with a surfaced error.
    pub fn transport_failed(&mut self, call: CallId, reason: String, now: Timestamp) -> Vec<Effect> {
        let Some(s) = self.session.as_ref().filter(|s| s.call == call) else {
            return Vec::new();
        };
        info!(call = %call, error = %reason, "transport failed");
        let mut effects = Vec::new();
        if s.has_joined_media {
            effects.push(Effect::Send(ended_envelope(&self.me, s, now)));
        }
        let failure = CallFailure::Transport(reason);
        self.error = Some(failure.clone());
        self.teardown(now, &mut effects);
        effects.push(Effect::Notify(Notice::Failed(failure)));
        effects
    }

    /// The relay connection dropped. Local state is kept.
    pub fn relay_lost(&mut self) -> Vec<Effect> {
        self.error = Some(CallFailure::RelayLost);
        vec![Effect::Notify(Notice::Failed(CallFailure::RelayLost))]
    }

    pub fn relay_restored(&mut self) {
        if self.error == Some(CallFailure::RelayLost) {
            self.error = None;
        }
    }

    pub fn timer_fired(&mut self, kind: TimerKind, now: Timestamp) -> Vec<Effect> {
        let Some(s) = &self.session else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        match kind {
            TimerKind::RingFallback => {
                if s.is_ringing() {
                    let missed = Notice::Missed {
                        room: s.room.clone(),
                        from: s.initiator.clone().unwrap_or_default(),
                    };
                    info!(room = %s.room, "incoming call timed out");
                    self.teardown(now, &mut effects);
                    effects.push(Effect::Notify(missed));
                } else if s.state == CallState::Calling && s.roster.connected_peers(&self.me) == 0 {
                    info!(room = %s.room, "call unanswered, giving up");
                    let room = s.room.clone();
                    effects.push(Effect::Send(call_state_envelope(&self.me, s, CallState::Idle)));
                    self.teardown(now, &mut effects);
                    effects.push(Effect::Notify(Notice::Unanswered { room }));
                } else {
                    debug!(room = %s.room, state = %s.state, "ring fallback fired, nothing to do");
                }
            }
            TimerKind::IdleGrace => {
                info!(room = %s.room, "peer reported idle, ending call");
                let missed = self.missed_notice(s);
                if s.has_joined_media {
                    effects.push(Effect::Send(ended_envelope(&self.me, s, now)));
                }
                self.teardown(now, &mut effects);
                effects.extend(missed.map(Effect::Notify));
            }
        }
        effects
    }

    // --- inbound envelopes ---

    /// Dispatch an envelope from the relay.
    pub fn handle_envelope(&mut self, envelope: Envelope, now: Timestamp) -> Vec<Effect> {
        if envelope.from() == &self.me {
            debug!(kind = %envelope.kind(), "ignoring own envelope");
            return Vec::new();
        }
        match envelope {
            Envelope::Offer(offer) => self.receive_offer(offer),
            Envelope::Answer(answer) => self.on_remote_answer(answer, now),
            Envelope::IceCandidate(candidate) => self.on_remote_candidate(candidate),
            Envelope::CallState(update) => self.on_remote_call_state(update, now),
            Envelope::Decline(decline) => self.on_remote_decline(decline, now),
            Envelope::Ended(ended) => self.on_remote_ended(ended, now),
        }
    }

    pub fn receive_offer(&mut self, offer: Offer) -> Vec<Effect> {
        if offer.from.is_empty() || offer.from == self.me {
            return Vec::new();
        }
        if !self.settings.calls_enabled {
            debug!(room = %offer.room, "offer ignored, calls disabled");
            return Vec::new();
        }
        if let Some(s) = self.session.as_mut() {
            if s.room == offer.room && s.is_ringing() {
                debug!(room = %s.room, "duplicate offer, refreshing");
                s.remote_offer = Some(offer.offer);
            } else {
                debug!(room = %offer.room, active = %s.room, "offer ignored, busy");
            }
            return Vec::new();
        }

        let call = self.allocate_call();
        let mut session = CallSession::new(call, offer.room, Role::Callee, CallState::Idle);
        let mut fresh = Roster::new();
        fresh.upsert(offer.from.clone(), ParticipantStatus::Connected);
        for target in &offer.targets {
            fresh.upsert(target.clone(), ParticipantStatus::Ringing);
        }
        fresh.upsert(self.me.clone(), ParticipantStatus::Ringing);
        session.roster = merge(&session.roster, &fresh, true);
        session.initiator = Some(offer.from.clone());
        session.remote_offer = Some(offer.offer);

        info!(room = %session.room, from = %offer.from, call = %call, "incoming call");
        let effects = vec![
            Effect::ArmTimer(TimerKind::RingFallback),
            Effect::Notify(Notice::IncomingCall {
                room: session.room.clone(),
                from: offer.from,
            }),
        ];
        self.session = Some(session);
        effects
    }

    pub fn on_remote_answer(&mut self, answer: Answer, now: Timestamp) -> Vec<Effect> {
        let me = self.me.clone();
        let Some(s) = self.tracked(&answer.room) else {
            return Vec::new();
        };
        if s.role != Role::Caller {
            debug!(room = %s.room, "answer ignored, not the caller");
            return Vec::new();
        }
        s.roster.mark_connected(&answer.from);
        if s.answer_applied {
            debug!(room = %s.room, from = %answer.from, "extra answer ignored");
            return Vec::new();
        }
        s.answer_applied = true;

        let mut effects = vec![Effect::ApplyAnswer {
            call: s.call,
            answer: answer.answer,
        }];
        if s.state != CallState::InCall {
            s.state = CallState::InCall;
            let started_at = *s.started_at.get_or_insert(now);
            info!(room = %s.room, from = %answer.from, "call answered");
            effects.push(Effect::Notify(Notice::Connected {
                room: s.room.clone(),
                started_at,
            }));
        }
        effects.push(Effect::CancelTimer(TimerKind::RingFallback));
        effects.push(Effect::CancelTimer(TimerKind::IdleGrace));
        effects.push(Effect::Send(call_state_envelope(&me, s, CallState::InCall)));
        effects
    }

    pub fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Vec<Effect> {
        let Some(s) = self.tracked(&candidate.room) else {
            return Vec::new();
        };
        if s.transport_open {
            return vec![Effect::AddCandidate {
                call: s.call,
                candidate: candidate.candidate,
            }];
        }
        if s.pending_candidates.len() < MAX_PENDING_CANDIDATES {
            s.pending_candidates.push(candidate.candidate);
        } else {
            debug!(room = %s.room, "candidate buffer full, dropping");
        }
        Vec::new()
    }

    pub fn on_remote_call_state(&mut self, update: CallStateUpdate, now: Timestamp) -> Vec<Effect> {
        let remote = Envelope::CallState(update.clone()).roster();
        let Some(s) = self.tracked(&update.room) else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let Some(remote) = &remote {
            s.roster = merge(&s.roster, remote, false);
            effects.push(Effect::CancelTimer(TimerKind::RingFallback));
            effects.push(Effect::CancelTimer(TimerKind::IdleGrace));
        }

        match update.state {
            CallState::InCall => {
                effects.push(Effect::CancelTimer(TimerKind::IdleGrace));
                // A callee stays Calling until its own answer has gone out.
                let answered = s.role == Role::Caller || s.remote_offer.is_none();
                if s.state == CallState::Calling && !s.is_ringing() && answered {
                    s.state = CallState::InCall;
                    let remote_start = update.started_at.filter(|t| (0..=now).contains(t));
                    let started_at = *s.started_at.get_or_insert(remote_start.unwrap_or(now));
                    effects.push(Effect::CancelTimer(TimerKind::RingFallback));
                    effects.push(Effect::Notify(Notice::Connected {
                        room: s.room.clone(),
                        started_at,
                    }));
                }
            }
            CallState::Calling => {
                effects.push(Effect::CancelTimer(TimerKind::IdleGrace));
                if s.state != CallState::InCall {
                    if !s.is_ringing() {
                        s.state = CallState::Calling;
                    }
                    effects.push(Effect::ArmTimer(TimerKind::RingFallback));
                }
            }
            CallState::Idle => {
                debug!(room = %s.room, from = %update.from, "peer reported idle, arming grace");
                effects.push(Effect::ArmTimer(TimerKind::IdleGrace));
            }
        }
        effects
    }

    pub fn on_remote_decline(&mut self, decline: Decline, now: Timestamp) -> Vec<Effect> {
        let me = self.me.clone();
        let Some(s) = self.tracked(&decline.room) else {
            return Vec::new();
        };
        let removed = s.roster.remove(&decline.from);

        // The caller gave up before we picked up.
        if s.is_ringing() && s.initiator.as_ref() == Some(&decline.from) {
            let missed = Notice::Missed {
                room: s.room.clone(),
                from: decline.from,
            };
            let mut effects = Vec::new();
            self.teardown(now, &mut effects);
            effects.push(Effect::Notify(missed));
            return effects;
        }

        if removed && s.initiator.as_ref() == Some(&me) && s.state == CallState::Calling {
            info!(room = %s.room, user = %decline.from, "call declined");
            return vec![Effect::Notify(Notice::Declined {
                room: s.room.clone(),
                user: decline.from,
            })];
        }
        Vec::new()
    }

    pub fn on_remote_ended(&mut self, ended: Ended, now: Timestamp) -> Vec<Effect> {
        let Some(s) = self.tracked(&ended.room) else {
            return Vec::new();
        };
        info!(room = %s.room, from = %ended.from, "peer ended the call");
        let missed = self
            .session
            .as_ref()
            .and_then(|s| self.missed_notice(s));
        let mut effects = Vec::new();
        self.teardown(now, &mut effects);
        effects.extend(missed.map(Effect::Notify));
        effects
    }

    // --- helpers ---

    fn allocate_call(&mut self) -> CallId {
        let call = CallId(self.next_call);
        self.next_call += 1;
        call
    }

    /// The session, if it tracks `room`.
    fn tracked(&mut self, room: &RoomId) -> Option<&mut CallSession> {
        match self.session.as_mut() {
            Some(s) if &s.room == room => Some(s),
            Some(s) => {
                debug!(room = %room, active = %s.room, "envelope for untracked room");
                None
            }
            None => {
                debug!(room = %room, "envelope with no active call");
                None
            }
        }
    }

    fn missed_notice(&self, s: &CallSession) -> Option<Notice> {
        s.is_ringing().then(|| Notice::Missed {
            room: s.room.clone(),
            from: s.initiator.clone().unwrap_or_default(),
        })
    }

    /// Drop the session: release audio, close the transport, cancel timers,
    /// and request the summary when this client placed a call that connected.
    ///
    /// The session is consumed, so a summary is requested at most once per call.
    fn teardown(&mut self, now: Timestamp, effects: &mut Vec<Effect>) {
        let Some(s) = self.session.take() else {
            return;
        };
        if let Some(handle) = s.media {
            effects.push(Effect::ReleaseMedia(handle));
        }
        if s.transport_open {
            effects.push(Effect::CloseTransport);
        }
        effects.push(Effect::CancelTimer(TimerKind::RingFallback));
        effects.push(Effect::CancelTimer(TimerKind::IdleGrace));

        let duration_secs = s
            .started_at
            .map(|started| u64::try_from(now.saturating_sub(started).max(0) / 1000).unwrap_or(0));
        if let Some(secs) = duration_secs {
            if s.initiator.as_ref() == Some(&self.me) {
                effects.push(Effect::PersistSummary {
                    room: s.room.clone(),
                    author: self.me.clone(),
                    duration_text: format_call_duration(secs),
                });
            }
        }
        debug!(room = %s.room, call = %s.call, "session torn down");
        effects.push(Effect::Notify(Notice::Ended {
            room: s.room,
            duration_secs,
        }));
    }
}

fn call_state_envelope(me: &UserId, s: &CallSession, state: CallState) -> Envelope {
    Envelope::CallState(CallStateUpdate {
        room: s.room.clone(),
        from: me.clone(),
        state,
        started_at: s.started_at,
        participants: Some(s.roster.participants()),
    })
}

fn ended_envelope(me: &UserId, s: &CallSession, now: Timestamp) -> Envelope {
    Envelope::Ended(Ended {
        room: s.room.clone(),
        from: me.clone(),
        started_at: s.started_at,
        ended_at: Some(now),
        participants: Some(s.roster.participants()),
    })
}
