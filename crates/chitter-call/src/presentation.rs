// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display data for the call dock: names, avatars, elapsed time, ringtone.
//!
//! Nothing here feeds back into signaling decisions.

use chitter_core::types::{Profile, format_elapsed};
use chitter_core::{CallSettings, CallState, ProfileAdapter, Timestamp, UserId};
use chitter_signal::ParticipantStatus;
use tracing::debug;

use crate::session::ActiveCall;

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantView {
    pub user: UserId,
    pub profile: Profile,
    pub status: ParticipantStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallView {
    /// "Incoming call", "Calling…", or "In call".
    pub headline: String,
    /// `m:ss` since the call connected.
    pub elapsed: Option<String>,
    pub participants: Vec<ParticipantView>,
}

/// Resolve every participant's profile, falling back to a placeholder.
pub async fn describe_call(
    call: &ActiveCall,
    me: &UserId,
    profiles: &dyn ProfileAdapter,
    now: Timestamp,
) -> CallView {
    let mut participants = Vec::with_capacity(call.participants.len());
    for p in call.participants.iter().filter(|p| &p.user != me) {
        let profile = match profiles.resolve_profile(&p.user).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(user = %p.user, error = %e, "profile lookup failed");
                Profile::placeholder(&p.user)
            }
        };
        participants.push(ParticipantView {
            user: p.user.clone(),
            profile,
            status: p.status,
        });
    }

    let headline = match (call.ringing, call.state) {
        (true, _) => "Incoming call",
        (false, CallState::InCall) => "In call",
        (false, _) => "Calling…",
    }
    .to_string();

    let elapsed = match call.state {
        CallState::InCall => call
            .started_at
            .map(|started| format_elapsed(u64::try_from((now - started).max(0) / 1000).unwrap_or(0))),
        _ => None,
    };

    CallView {
        headline,
        elapsed,
        participants,
    }
}

/// What to play for an incoming call.
#[derive(Debug, Clone, PartialEq)]
pub struct Ringtone {
    pub key: String,
    pub volume: f32,
}

/// `None` when the user muted the ringtone.
pub fn ringtone(settings: &CallSettings) -> Option<Ringtone> {
    settings.ring_sound.then(|| Ringtone {
        key: settings.ringtone.clone(),
        volume: settings.volume.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chitter_core::ChitterError;
    use chitter_signal::Participant;

    use crate::session::{CallId, Role};

    struct OnlyBob;

    #[async_trait]
    impl ProfileAdapter for OnlyBob {
        async fn resolve_profile(&self, user: &UserId) -> Result<Profile, ChitterError> {
            if user.as_str() == "bob" {
                Ok(Profile {
                    display_name: "Bob B.".to_string(),
                    avatar_url: "https://example.invalid/bob.png".to_string(),
                })
            } else {
                Err(ChitterError::Internal("unknown user".to_string()))
            }
        }
    }

    fn call(state: CallState, ringing: bool) -> ActiveCall {
        ActiveCall {
            call: CallId(1),
            room: "dm".into(),
            state,
            role: Role::Caller,
            initiator: Some("alice".into()),
            started_at: Some(1_000),
            participants: vec![
                Participant::connected("alice"),
                Participant::connected("bob"),
                Participant::ringing("carol"),
            ],
            ringing,
            has_joined_media: true,
        }
    }

    #[tokio::test]
    async fn describes_in_call_view() {
        let view = describe_call(&call(CallState::InCall, false), &"alice".into(), &OnlyBob, 66_000).await;
        assert_eq!(view.headline, "In call");
        assert_eq!(view.elapsed.as_deref(), Some("1:05"));
        assert_eq!(view.participants.len(), 2);
        assert_eq!(view.participants[0].profile.display_name, "Bob B.");
        assert_eq!(view.participants[1].profile, Profile::placeholder(&"carol".into()));
    }

    #[tokio::test]
    async fn ringing_view_has_no_elapsed_time() {
        let view = describe_call(&call(CallState::Idle, true), &"carol".into(), &OnlyBob, 5_000).await;
        assert_eq!(view.headline, "Incoming call");
        assert!(view.elapsed.is_none());
    }

    #[test]
    fn muted_ringtone() {
        let mut settings = CallSettings::default();
        assert_eq!(
            ringtone(&settings),
            Some(Ringtone {
                key: "classic".to_string(),
                volume: 0.6
            })
        );
        settings.ring_sound = false;
        assert_eq!(ringtone(&settings), None);
    }
}
