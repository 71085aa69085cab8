//! Start-up: config loading, logging filter, and the mapping from the
//! on-disk config to the call client's runtime settings.

use std::path::Path;
use std::time::Duration;

use huddle_call::{
    AudioConstraints, CallConfig, CaptureConstraints, DisplayMediaConstraints, GlarePolicy,
    IceServer, OrchestratorConfig, Range, TransportConfig, VideoConstraints,
};
use huddle_common::ConfigError;
use huddle_config::schema::GlareMode;
use huddle_config::HuddleConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "huddle=info,huddle_call=info";

/// Load config from `path` or the default location. A failure is handed
/// back alongside the defaults so it can be logged once logging is up.
pub fn load_config(path: Option<&Path>) -> (HuddleConfig, Option<ConfigError>) {
    let loaded = match path {
        Some(path) => huddle_config::load_config_from(path),
        None => huddle_config::load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (HuddleConfig::default(), Some(e)),
    }
}

/// `RUST_LOG` wins, then `--log-level`, then `[logging] level`.
pub fn env_filter(flag: Option<&str>, config_level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(directive(flag, config_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn directive(flag: Option<&str>, config_level: Option<&str>) -> String {
    match (flag, config_level) {
        (Some(flag), _) => flag.to_string(),
        (None, Some(level)) => format!("huddle={level},huddle_call={level}"),
        (None, None) => DEFAULT_DIRECTIVE.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Config -> runtime settings
// ---------------------------------------------------------------------------

pub fn transport_config(config: &HuddleConfig) -> TransportConfig {
    let signaling = &config.signaling;
    TransportConfig {
        url: signaling.url.clone(),
        max_reconnect_attempts: signaling.max_reconnect_attempts,
        reconnect_base_delay: Duration::from_millis(signaling.reconnect_base_delay_ms),
        max_reconnect_delay: Duration::from_millis(signaling.max_reconnect_delay_ms),
        connect_timeout: Duration::from_secs(signaling.connect_timeout_secs),
    }
}

pub fn capture_constraints(config: &HuddleConfig) -> CaptureConstraints {
    let video = &config.media.video;
    let audio = &config.media.audio;
    CaptureConstraints {
        video: VideoConstraints {
            width: Range {
                ideal: video.ideal_width,
                min: video.min_width,
            },
            height: Range {
                ideal: video.ideal_height,
                min: video.min_height,
            },
            frame_rate: Range {
                ideal: video.ideal_frame_rate,
                min: video.min_frame_rate,
            },
            facing_mode: video.facing_mode.clone(),
        },
        audio: AudioConstraints {
            echo_cancellation: audio.echo_cancellation,
            noise_suppression: audio.noise_suppression,
            auto_gain_control: audio.auto_gain_control,
        },
    }
}

pub fn orchestrator_config(config: &HuddleConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        ice_servers: config
            .ice
            .servers
            .iter()
            .map(|s| IceServer {
                urls: s.urls.clone(),
                username: s.username.clone(),
                credential: s.credential.clone(),
            })
            .collect(),
        glare_policy: match config.call.glare_policy {
            GlareMode::FirstObserver => GlarePolicy::FirstObserver,
            GlareMode::LowerIdInitiates => GlarePolicy::LowerIdInitiates,
        },
    }
}

/// Everything a `Call` needs from the config file.
pub fn call_config(config: &HuddleConfig) -> CallConfig {
    CallConfig {
        transport: transport_config(config),
        capture: capture_constraints(config),
        display: DisplayMediaConstraints {
            video: true,
            audio: config.screen_share.capture_audio,
        },
        orchestrator: orchestrator_config(config),
        ..CallConfig::default()
    }
}
