//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the call client ships with.

mod call;
mod ice;
mod media;
mod signaling;
mod system;

pub use call::*;
pub use ice::*;
pub use media::*;
pub use signaling::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Huddle.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub signaling: SignalingConfig,
    pub api: ApiConfig,
    pub media: MediaConfig,
    pub screen_share: ScreenShareConfig,
    pub ice: IceConfig,
    pub call: CallPolicyConfig,
    pub relay: RelayServerConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_signaling_matches_client_defaults() {
        let config = HuddleConfig::default();
        assert_eq!(config.signaling.url, "ws://localhost:8000");
        assert_eq!(config.signaling.max_reconnect_attempts, 5);
        assert_eq!(config.signaling.reconnect_base_delay_ms, 1000);
        assert_eq!(config.signaling.max_reconnect_delay_ms, 60_000);
        assert_eq!(config.signaling.connect_timeout_secs, 15);
    }

    #[test]
    fn default_video_preferences() {
        let video = HuddleConfig::default().media.video;
        assert_eq!((video.ideal_width, video.min_width), (1920, 1280));
        assert_eq!((video.ideal_height, video.min_height), (1080, 720));
        assert_eq!((video.ideal_frame_rate, video.min_frame_rate), (30, 15));
        assert_eq!(video.facing_mode, "user");
    }

    #[test]
    fn default_audio_processing_is_on() {
        let audio = HuddleConfig::default().media.audio;
        assert!(audio.echo_cancellation);
        assert!(audio.noise_suppression);
        assert!(audio.auto_gain_control);
    }

    #[test]
    fn default_ice_servers_are_public_stun() {
        let ice = HuddleConfig::default().ice;
        assert_eq!(ice.servers.len(), 1);
        assert_eq!(ice.servers[0].urls.len(), 3);
        assert!(ice.servers[0].urls[0].starts_with("stun:"));
        assert!(ice.servers[0].username.is_none());
    }

    #[test]
    fn default_glare_mode_is_first_observer() {
        assert_eq!(HuddleConfig::default().call.glare_policy, GlareMode::FirstObserver);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[signaling]
url = "wss://relay.example.com"

[call]
glare_policy = "lower_id_initiates"
"#;
        let config: HuddleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.signaling.url, "wss://relay.example.com");
        assert_eq!(config.signaling.max_reconnect_attempts, 5);
        assert_eq!(config.call.glare_policy, GlareMode::LowerIdInitiates);
        assert_eq!(config.relay.port, 8000);
    }

    #[test]
    fn ice_servers_parse_as_array_of_tables() {
        let toml_str = r#"
[[ice.servers]]
urls = ["turn:turn.example.com:3478"]
username = "u"
credential = "p"
"#;
        let config: HuddleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ice.servers.len(), 1);
        assert_eq!(config.ice.servers[0].username.as_deref(), Some("u"));
        assert_eq!(config.ice.servers[0].credential.as_deref(), Some("p"));
    }
}
