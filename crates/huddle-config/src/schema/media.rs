//! Capture preferences for camera, microphone and screen.

use serde::{Deserialize, Serialize};

/// Camera capture preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraintsConfig {
    pub ideal_width: u32,
    pub min_width: u32,
    pub ideal_height: u32,
    pub min_height: u32,
    pub ideal_frame_rate: u32,
    pub min_frame_rate: u32,
    pub facing_mode: String,
}

impl Default for VideoConstraintsConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1920,
            min_width: 1280,
            ideal_height: 1080,
            min_height: 720,
            ideal_frame_rate: 30,
            min_frame_rate: 15,
            facing_mode: "user".into(),
        }
    }
}

/// Microphone processing switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConstraintsConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraintsConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub video: VideoConstraintsConfig,
    pub audio: AudioConstraintsConfig,
}

/// Display capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenShareConfig {
    /// Ask the platform to include system audio with the display capture.
    pub capture_audio: bool,
}

impl Default for ScreenShareConfig {
    fn default() -> Self {
        Self {
            capture_audio: true,
        }
    }
}
