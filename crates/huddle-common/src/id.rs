use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Session-scoped participant identifier.
///
/// Stable for one login session and independent of the display name, so two
/// logins under the same name are still distinct participants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn generated_participants_are_distinct() {
        let a = ParticipantId::generate();
        let b = ParticipantId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn participant_id_display() {
        let id = ParticipantId::new("alice-1");
        assert_eq!(id.to_string(), "alice-1");
        assert_eq!(id.as_str(), "alice-1");
    }

    #[test]
    fn participant_id_serializes_as_plain_string() {
        let id = ParticipantId::new("bob");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bob\"");
        let back: ParticipantId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn participant_ids_order_lexicographically() {
        assert!(ParticipantId::new("a") < ParticipantId::new("b"));
        assert!(ParticipantId::new("B") < ParticipantId::new("a"));
    }

    #[test]
    fn room_id_round_trips() {
        let room = RoomId::generate();
        let json = serde_json::to_string(&room).unwrap();
        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(room, back);
    }
}
