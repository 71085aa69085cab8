pub mod api;
pub mod call;
pub mod chat;
pub mod identity;
pub mod media;
pub mod platform;
pub mod roster;
pub mod screen_share;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{AccessToken, ApiClient};
pub use call::{Call, CallConfig, CallEvent};
pub use chat::{ChatLog, ChatMessage};
pub use identity::{Identity, LoginSession};
pub use media::{
    AudioConstraints, CaptureConstraints, DisplayMediaConstraints, LocalMediaController,
    LocalMediaState, LocalTracks, OutgoingTracks, Range, VideoConstraints, VideoSource,
};
pub use platform::{
    IceServer, LocalTrack, MediaDevices, MediaTrack, PeerConnection, PeerConnectionEvent,
    PeerConnectionFactory, Platform, TrackKind,
};
pub use roster::{RoomRoster, RosterUpdate};
pub use screen_share::{ScreenShareController, ScreenShareEvent, StopReason};
pub use session::{
    GlarePolicy, OrchestratorConfig, PeerSessionOrchestrator, SessionEvent, SessionRole,
    SessionSnapshot, SessionState, Signal,
};
pub use transport::{ConnectionState, Outbox, SignalingTransport, TransportConfig, TransportEvent};
