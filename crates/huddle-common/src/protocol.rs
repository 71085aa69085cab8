//! Wire protocol spoken between clients and the signaling relay.
//!
//! Every frame is a JSON object discriminated by `type`. Clients address
//! negotiation messages with `target_user`; the relay rewrites that into
//! `from_user` before delivering them to the target.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{ParticipantId, RoomId};

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
            SdpType::Pranswer => "pranswer",
            SdpType::Rollback => "rollback",
        };
        f.write_str(s)
    }
}

/// An SDP offer or answer, shaped like a browser `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Discards a pending local offer.
    pub fn rollback() -> Self {
        Self {
            sdp_type: SdpType::Rollback,
            sdp: String::new(),
        }
    }
}

/// A trickled connectivity candidate, shaped like a browser `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

/// The unit exchanged over the signaling transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingEnvelope {
    /// Assert room membership; sent on every (re)connect.
    JoinRoom { room_id: RoomId },
    /// Explicitly leave a room before hanging up.
    LeaveRoom { room_id: RoomId },
    UserJoined {
        user_id: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    UserLeft {
        user_id: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    /// Full roster snapshot of the other members of the room.
    Participants {
        #[serde(default)]
        participants: Vec<ParticipantId>,
    },
    WebrtcOffer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user: Option<ParticipantId>,
        offer: SessionDescription,
    },
    WebrtcAnswer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user: Option<ParticipantId>,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_user: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user: Option<ParticipantId>,
        candidate: IceCandidate,
    },
    ChatMessage {
        room_id: RoomId,
        text: String,
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user: Option<ParticipantId>,
    },
    #[serde(other)]
    Unknown,
}

impl SignalingEnvelope {
    pub fn offer(target: ParticipantId, offer: SessionDescription) -> Self {
        Self::WebrtcOffer {
            target_user: Some(target),
            from_user: None,
            offer,
        }
    }

    pub fn answer(target: ParticipantId, answer: SessionDescription) -> Self {
        Self::WebrtcAnswer {
            target_user: Some(target),
            from_user: None,
            answer,
        }
    }

    pub fn candidate(target: ParticipantId, candidate: IceCandidate) -> Self {
        Self::IceCandidate {
            target_user: Some(target),
            from_user: None,
            candidate,
        }
    }

    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::Participants { .. } => "participants",
            Self::WebrtcOffer { .. } => "webrtc_offer",
            Self::WebrtcAnswer { .. } => "webrtc_answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::ChatMessage { .. } => "chat_message",
            Self::Unknown => "unknown",
        }
    }

    /// Messages whose loss is tolerable because later ones supersede them.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::IceCandidate { .. })
    }

    /// Target of a negotiation message, if it has one.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            Self::WebrtcOffer { target_user, .. }
            | Self::WebrtcAnswer { target_user, .. }
            | Self::IceCandidate { target_user, .. } => target_user.as_ref(),
            _ => None,
        }
    }

    /// Stamp the sender on a message the relay is about to deliver.
    pub fn with_sender(self, from: ParticipantId) -> Self {
        match self {
            Self::WebrtcOffer { offer, .. } => Self::WebrtcOffer {
                target_user: None,
                from_user: Some(from),
                offer,
            },
            Self::WebrtcAnswer { answer, .. } => Self::WebrtcAnswer {
                target_user: None,
                from_user: Some(from),
                answer,
            },
            Self::IceCandidate { candidate, .. } => Self::IceCandidate {
                target_user: None,
                from_user: Some(from),
                candidate,
            },
            Self::ChatMessage {
                room_id,
                text,
                timestamp,
                ..
            } => Self::ChatMessage {
                room_id,
                text,
                timestamp,
                from_user: Some(from),
            },
            other => other,
        }
    }
}
