//! Capture preferences handed to [`MediaDevices`](crate::platform::MediaDevices).

/// `{ ideal, min }` pair, as capture APIs express soft preferences with
/// hard floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub ideal: u32,
    pub min: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: Range,
    pub height: Range,
    pub frame_rate: Range,
    pub facing_mode: String,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: Range {
                ideal: 1920,
                min: 1280,
            },
            height: Range {
                ideal: 1080,
                min: 720,
            },
            frame_rate: Range { ideal: 30, min: 15 },
            facing_mode: "user".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// A user-media request. `None` means the kind is not requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStreamConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
}

impl MediaStreamConstraints {
    pub fn wants_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}

/// Preferences for the camera and microphone, used to build the individual
/// user-media requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub video: VideoConstraints,
    pub audio: AudioConstraints,
}

impl CaptureConstraints {
    pub fn combined(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: Some(self.audio.clone()),
            video: Some(self.video.clone()),
        }
    }

    pub fn video_only(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: None,
            video: Some(self.video.clone()),
        }
    }

    pub fn audio_only(&self) -> MediaStreamConstraints {
        MediaStreamConstraints {
            audio: Some(self.audio.clone()),
            video: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMediaConstraints {
    pub video: bool,
    /// Include system audio when the platform supports it.
    pub audio: bool,
}

impl Default for DisplayMediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}
