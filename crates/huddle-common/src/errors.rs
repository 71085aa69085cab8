use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the signaling channel to the relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0}s")]
    Timeout(u64),

    #[error("connection closed abnormally: {0}")]
    AbnormalClose(String),

    /// Terminal: the reconnect ceiling was reached and the transport gave up.
    #[error("connection lost after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Camera, microphone or screen capture could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaAcquisitionError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("capture returned no {0} track")]
    MissingTrack(String),
}

/// Failures confined to a single peer session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("malformed session description: {0}")]
    Malformed(String),

    #[error("expected {expected} description, got {actual}")]
    UnexpectedDescription { expected: String, actual: String },

    #[error("description rejected: {0}")]
    Rejected(String),

    #[error("failed to apply ICE candidate: {0}")]
    Candidate(String),

    #[error("ICE connectivity failed")]
    IceFailed,

    #[error("peer connection error: {0}")]
    PeerConnection(String),

    /// The session was torn down while a step was in flight.
    #[error("session closed")]
    Closed,
}

/// Errors surfaced by the local media and screen share controllers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("local media is not initialized")]
    NotInitialized,

    #[error("screen share is already active")]
    ScreenShareActive,

    #[error("screen share is not active")]
    ScreenShareInactive,

    #[error(transparent)]
    Acquisition(#[from] MediaAcquisitionError),
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl From<MediaAcquisitionError> for HuddleError {
    fn from(err: MediaAcquisitionError) -> Self {
        HuddleError::Media(MediaError::Acquisition(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("signaling.url is empty".into());
        assert_eq!(
            err.to_string(),
            "config validation error: signaling.url is empty"
        );
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::RetriesExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "connection lost after 5 reconnect attempts");

        let err = TransportError::Timeout(15);
        assert_eq!(err.to_string(), "connect timed out after 15s");
    }

    #[test]
    fn negotiation_error_display() {
        let err = NegotiationError::UnexpectedDescription {
            expected: "answer".into(),
            actual: "offer".into(),
        };
        assert_eq!(err.to_string(), "expected answer description, got offer");
        assert_eq!(NegotiationError::IceFailed.to_string(), "ICE connectivity failed");
    }

    #[test]
    fn acquisition_error_lifts_into_media_error() {
        let err: MediaError = MediaAcquisitionError::PermissionDenied("camera".into()).into();
        assert!(matches!(err, MediaError::Acquisition(_)));
        assert_eq!(err.to_string(), "permission denied: camera");
    }

    #[test]
    fn huddle_error_from_acquisition() {
        let err: HuddleError = MediaAcquisitionError::DeviceUnavailable("busy".into()).into();
        assert!(matches!(
            err,
            HuddleError::Media(MediaError::Acquisition(MediaAcquisitionError::DeviceUnavailable(_)))
        ));
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn huddle_error_from_transport() {
        let err: HuddleError = TransportError::Connect("refused".into()).into();
        assert!(matches!(err, HuddleError::Transport(_)));
        assert_eq!(err.to_string(), "connect failed: refused");
    }

    #[test]
    fn huddle_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: HuddleError = io_err.into();
        assert!(matches!(err, HuddleError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn huddle_error_other_variants() {
        let err = HuddleError::Network("timeout".into());
        assert_eq!(err.to_string(), "network error: timeout");

        let err = HuddleError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
