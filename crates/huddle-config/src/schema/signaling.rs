//! Signaling relay and HTTP collaborator endpoints.

use serde::{Deserialize, Serialize};

/// Connection to the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Relay base URL; the client connects to `{url}/ws/{participant_id}`.
    pub url: String,
    /// Retries after the initial attempt before giving up (valid range: 1-20).
    pub max_reconnect_attempts: u32,
    /// Delay before retry `n` is `base * 2^n`, capped at `max_reconnect_delay_ms`.
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000".into(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            max_reconnect_delay_ms: 60_000,
            connect_timeout_secs: 15,
        }
    }
}

/// Login and room-creation HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
        }
    }
}
