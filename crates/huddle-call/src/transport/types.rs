//! Configuration and event types for the signaling transport.

use std::time::Duration;

use huddle_common::{ParticipantId, SignalingEnvelope, TransportError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Relay base URL, e.g. `ws://localhost:8000`.
    pub url: String,
    /// Retries after the initial attempt before reporting a terminal failure.
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000".into(),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl TransportConfig {
    /// Endpoint addressed by the local identity.
    pub(crate) fn endpoint(&self, participant: &ParticipantId) -> String {
        format!("{}/ws/{}", self.url.trim_end_matches('/'), participant)
    }

    /// Delay before retry `attempt` (1-based): `base * 2^attempt`, capped.
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.max_reconnect_delay)
    }
}

// ---------------------------------------------------------------------------
// State & Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    /// Deliberately closed, locally or by the relay.
    Closed,
    /// Reconnect ceiling reached.
    Failed,
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Channel open and `join_room` sent.
    Opened,
    Message(SignalingEnvelope),
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    /// Terminal; no further attempts will be made.
    Failed(TransportError),
    Closed,
}
