// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation history.

use std::collections::HashMap;

use async_trait::async_trait;
use chitter_core::types::{CALL_SUMMARY_TYPE, HistoryMessage};
use chitter_core::{ChitterError, HistoryAdapter, RoomId, UserId, now_millis};
use tokio::sync::Mutex;
use tracing::debug;

/// Text of the system message written when a call ends.
pub fn call_summary_text(duration_text: &str) -> String {
    format!("Voice call ended • {duration_text}")
}

/// History kept in process memory, per room, oldest first.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    rooms: Mutex<HashMap<RoomId, Vec<HistoryMessage>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ordinary chat message.
    pub async fn append_message(&self, room: &RoomId, user: &UserId, text: &str) -> HistoryMessage {
        let message = HistoryMessage {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.clone(),
            user: user.clone(),
            text: text.to_string(),
            system_type: None,
            timestamp: now_millis(),
        };
        self.rooms
            .lock()
            .await
            .entry(room.clone())
            .or_default()
            .push(message.clone());
        message
    }

    pub async fn messages(&self, room: &RoomId) -> Vec<HistoryMessage> {
        self.rooms.lock().await.get(room).cloned().unwrap_or_default()
    }

    /// Call summaries in a room.
    pub async fn summaries(&self, room: &RoomId) -> Vec<HistoryMessage> {
        self.messages(room)
            .await
            .into_iter()
            .filter(|m| m.system_type.as_deref() == Some(CALL_SUMMARY_TYPE))
            .collect()
    }
}

#[async_trait]
impl HistoryAdapter for MemoryHistory {
    async fn append_call_summary(
        &self,
        room: &RoomId,
        author: &UserId,
        duration_text: &str,
    ) -> Result<HistoryMessage, ChitterError> {
        if author.is_empty() {
            return Err(ChitterError::History {
                message: "call summary needs an author".to_string(),
            });
        }
        let text = call_summary_text(duration_text);
        let mut rooms = self.rooms.lock().await;
        let log = rooms.entry(room.clone()).or_default();

        if let Some(last) = log.last() {
            if last.system_type.as_deref() == Some(CALL_SUMMARY_TYPE)
                && &last.user == author
                && last.text == text
            {
                debug!(room = %room, "call summary already recorded");
                return Ok(last.clone());
            }
        }

        let message = HistoryMessage {
            id: uuid::Uuid::new_v4().to_string(),
            room: room.clone(),
            user: author.clone(),
            text,
            system_type: Some(CALL_SUMMARY_TYPE.to_string()),
            timestamp: now_millis(),
        };
        log.push(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn summary_text_and_tag() {
        let history = MemoryHistory::new();
        let msg = history
            .append_call_summary(&"dm".into(), &"alice".into(), "3m 07s")
            .await
            .unwrap();
        assert_eq!(msg.text, "Voice call ended • 3m 07s");
        assert_eq!(msg.system_type.as_deref(), Some(CALL_SUMMARY_TYPE));
    }

    #[tokio::test]
    async fn repeated_summary_is_not_duplicated() {
        let history = MemoryHistory::new();
        let room = RoomId::new("dm");
        let first = history
            .append_call_summary(&room, &"alice".into(), "42s")
            .await
            .unwrap();
        let second = history
            .append_call_summary(&room, &"alice".into(), "42s")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(history.summaries(&room).await.len(), 1);
    }

    #[tokio::test]
    async fn superseded_summary_is_appended_again() {
        let history = MemoryHistory::new();
        let room = RoomId::new("dm");
        history
            .append_call_summary(&room, &"alice".into(), "42s")
            .await
            .unwrap();
        history.append_message(&room, &"bob".into(), "again?").await;
        history
            .append_call_summary(&room, &"alice".into(), "42s")
            .await
            .unwrap();
        assert_eq!(history.summaries(&room).await.len(), 2);
        assert_eq!(history.messages(&room).await.len(), 3);
    }

    #[tokio::test]
    async fn anonymous_summary_is_rejected() {
        let history = MemoryHistory::new();
        let err = history
            .append_call_summary(&"dm".into(), &UserId::default(), "1s")
            .await
            .unwrap_err();
        assert!(matches!(err, ChitterError::History { .. }));
    }
}
