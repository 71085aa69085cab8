use huddle_common::{
    IceCandidate, NegotiationError, ParticipantId, SessionDescription, SignalingEnvelope,
};
use tokio::sync::oneshot;

use crate::media::OutgoingTracks;
use crate::platform::{IceServer, TrackKind};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle of one peer session. "Absent" is the lack of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiating,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    /// Negotiating or connected: the session still owns a live connection.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Negotiating | SessionState::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Initiator,
    Responder,
}

/// Observable view of a session, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub peer: ParticipantId,
    pub state: SessionState,
    pub role: SessionRole,
    /// Remote candidates waiting for the remote description.
    pub pending_candidates: usize,
    pub remote_description_applied: bool,
    pub failure: Option<NegotiationError>,
    /// The last remote offer this session answered. A repeat of it is
    /// answered again instead of starting over.
    pub(crate) answered_offer: Option<SessionDescription>,
}

impl SessionSnapshot {
    pub(crate) fn new(peer: ParticipantId, role: SessionRole) -> Self {
        Self {
            peer,
            state: SessionState::Negotiating,
            role,
            pending_candidates: 0,
            remote_description_applied: false,
            failure: None,
            answered_offer: None,
        }
    }
}

/// Notifications from the session layer to the call.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected {
        peer: ParticipantId,
    },
    Failed {
        peer: ParticipantId,
        error: NegotiationError,
    },
    RemoteTrack {
        peer: ParticipantId,
        kind: TrackKind,
        track_id: String,
    },
    Closed {
        peer: ParticipantId,
    },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Who sends the offer for a fresh pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlarePolicy {
    /// Whoever observes the peer first initiates. Crossing offers are
    /// settled by letting the greater participant ID yield.
    #[default]
    FirstObserver,
    /// Only the lexicographically smaller participant ID initiates.
    LowerIdInitiates,
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub ice_servers: Vec<IceServer>,
    pub glare_policy: GlarePolicy,
}

// ---------------------------------------------------------------------------
// Inbound negotiation
// ---------------------------------------------------------------------------

/// A negotiation message addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
}

impl Signal {
    /// Split a received negotiation envelope into sender and signal.
    /// Returns `None` for other envelope types or a missing sender.
    pub fn from_envelope(envelope: SignalingEnvelope) -> Option<(ParticipantId, Signal)> {
        match envelope {
            SignalingEnvelope::WebrtcOffer {
                from_user: Some(from),
                offer,
                ..
            } => Some((from, Signal::Offer(offer))),
            SignalingEnvelope::WebrtcAnswer {
                from_user: Some(from),
                answer,
                ..
            } => Some((from, Signal::Answer(answer))),
            SignalingEnvelope::IceCandidate {
                from_user: Some(from),
                candidate,
                ..
            } => Some((from, Signal::Candidate(candidate))),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::Candidate(_) => "candidate",
        }
    }
}

pub(crate) enum SessionCommand {
    Signal(Signal),
    /// Retarget senders; `done` fires once applied (or skipped as stale).
    UpdateTracks {
        tracks: OutgoingTracks,
        done: oneshot::Sender<()>,
    },
}
