//! Seams to the capture devices and the peer-connection stack.
//!
//! The call logic never touches a camera or an ICE agent directly; it
//! drives these traits. A browser binding, a native WebRTC stack or the
//! in-memory fakes used by the tests all plug in here.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{
    IceCandidate, MediaAcquisitionError, NegotiationError, ParticipantId, SessionDescription,
};
use tokio::sync::mpsc;

use crate::media::{DisplayMediaConstraints, MediaStreamConstraints};

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// A live capture track owned by this process.
#[async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn enabled(&self) -> bool;
    /// Mute or unmute in place; the track keeps its device.
    fn set_enabled(&self, enabled: bool);
    /// Release the underlying device. Idempotent.
    fn stop(&self);
    fn is_stopped(&self) -> bool;
    /// Resolves when the track is ended from outside the application,
    /// e.g. the platform's own "stop sharing" control.
    async fn ended(&self);
}

pub type LocalTrack = Arc<dyn MediaTrack>;

/// Capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<Vec<LocalTrack>, MediaAcquisitionError>;

    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<Vec<LocalTrack>, MediaAcquisitionError>;
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Asynchronous notifications from one peer connection.
#[derive(Debug, Clone)]
pub enum PeerConnectionEvent {
    /// A local candidate was gathered and should be trickled to the peer.
    IceCandidate(IceCandidate),
    IceConnectionStateChanged(IceConnectionState),
    /// The peer started sending a track.
    RemoteTrack { kind: TrackKind, track_id: String },
}

/// One direct media connection to one remote participant.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach an outgoing sender on a new media line.
    async fn add_sender(
        &self,
        kind: TrackKind,
        track: Option<LocalTrack>,
    ) -> Result<(), NegotiationError>;

    /// Swap the track on the existing sender of `kind` without renegotiating.
    async fn replace_track(
        &self,
        kind: TrackKind,
        track: Option<LocalTrack>,
    ) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;
    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;
    async fn close(&self);
}

pub type PeerEvents = mpsc::UnboundedReceiver<PeerConnectionEvent>;

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer: &ParticipantId,
        ice_servers: &[IceServer],
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), NegotiationError>;
}

/// Everything the call needs from the host environment.
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerConnectionFactory>,
}
