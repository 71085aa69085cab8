//! Local capture: camera, microphone and the outgoing track set.

mod constraints;
mod controller;


pub use constraints::{
    AudioConstraints, CaptureConstraints, DisplayMediaConstraints, MediaStreamConstraints, Range,
    VideoConstraints,
};
pub use controller::LocalMediaController;
pub(crate) use controller::VideoRoute;

use async_trait::async_trait;

use crate::platform::LocalTrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Camera,
    Screen,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMediaState {
    pub audio_enabled: bool,
    pub camera_enabled: bool,
    pub active_video_source: VideoSource,
}

impl Default for LocalMediaState {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            camera_enabled: false,
            active_video_source: VideoSource::None,
        }
    }
}

/// The camera and microphone tracks currently owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct LocalTracks {
    pub audio: Option<LocalTrack>,
    pub video: Option<LocalTrack>,
}

/// What every session should be sending right now.
///
/// `version` grows with each change so a consumer that sees two snapshots
/// out of order keeps the newer one.
#[derive(Debug, Clone, Default)]
pub struct OutgoingTracks {
    pub version: u64,
    pub audio: Option<LocalTrack>,
    pub video: Option<LocalTrack>,
}

impl OutgoingTracks {
    pub fn audio_id(&self) -> Option<&str> {
        self.audio.as_ref().map(|t| t.id())
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video.as_ref().map(|t| t.id())
    }
}

/// Receiver of outgoing-track changes; implemented by the session layer.
#[async_trait]
pub trait OutgoingTrackSink: Send + Sync {
    /// Retarget every open session's senders. Returns once they have
    /// applied the change.
    async fn publish(&self, tracks: OutgoingTracks);
}
