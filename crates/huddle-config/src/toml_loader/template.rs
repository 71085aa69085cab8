//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# url = "ws://localhost:8000"      # relay base; endpoint is {url}/ws/{participant_id}
# max_reconnect_attempts = 5       # 1-20, retries after the initial attempt
# reconnect_base_delay_ms = 1000   # retry n (from 1) waits base * 2^n, so the first waits 2x base
# max_reconnect_delay_ms = 60000
# connect_timeout_secs = 15

[api]
# base_url = "http://localhost:8000"

[media.video]
# ideal_width = 1920
# min_width = 1280
# ideal_height = 1080
# min_height = 720
# ideal_frame_rate = 30
# min_frame_rate = 15
# facing_mode = "user"

[media.audio]
# echo_cancellation = true
# noise_suppression = true
# auto_gain_control = true

[screen_share]
# capture_audio = true

# [[ice.servers]]
# urls = ["stun:stun.l.google.com:19302", "stun:stun1.l.google.com:19302", "stun:stun2.l.google.com:19302"]
# username = ""
# credential = ""

[call]
# glare_policy = "first_observer"  # first_observer, lower_id_initiates

[relay]
# bind_address = "0.0.0.0"
# port = 8000

[logging]
# level = "info"                   # trace, debug, info, warn, error
"##
    .to_string()
}
