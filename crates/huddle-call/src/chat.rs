//! Room chat carried over the signaling transport.
//!
//! Messages are kept in a bounded ring buffer so memory use stays
//! predictable; nothing is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use huddle_common::{ParticipantId, RoomId, SignalingEnvelope};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHAT_CAPACITY: usize = 500;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `None` for messages sent by the local participant.
    pub from: Option<ParticipantId>,
    pub room_id: RoomId,
    pub text: String,
    /// RFC 3339, as produced by the sender.
    pub timestamp: String,
}

impl ChatMessage {
    /// A message authored locally, stamped with the current time.
    pub fn outgoing(room_id: RoomId, text: impl Into<String>) -> Self {
        Self {
            from: None,
            room_id,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn from_envelope(envelope: &SignalingEnvelope) -> Option<Self> {
        match envelope {
            SignalingEnvelope::ChatMessage {
                room_id,
                text,
                timestamp,
                from_user,
            } => Some(Self {
                from: from_user.clone(),
                room_id: room_id.clone(),
                text: text.clone(),
                timestamp: timestamp.clone(),
            }),
            _ => None,
        }
    }

    pub fn to_envelope(&self) -> SignalingEnvelope {
        SignalingEnvelope::ChatMessage {
            room_id: self.room_id.clone(),
            text: self.text.clone(),
            timestamp: self.timestamp.clone(),
            from_user: None,
        }
    }

    /// Parsed timestamp; `None` if the sender sent something unparseable.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn is_local(&self) -> bool {
        self.from.is_none()
    }
}

/// In-memory chat log for one room.
#[derive(Debug)]
pub struct ChatLog {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: VecDeque::new(),
        }
    }

    /// Append a message. The oldest one is evicted when the log is full.
    pub fn push(&mut self, msg: ChatMessage) {
        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(msg);
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn all(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_CAPACITY)
    }
}
