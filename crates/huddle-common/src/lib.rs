pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::{
    ConfigError, HuddleError, MediaAcquisitionError, MediaError, NegotiationError, TransportError,
};
pub use id::{new_id, ParticipantId, RoomId};
pub use protocol::{IceCandidate, SdpType, SessionDescription, SignalingEnvelope};

pub type Result<T> = std::result::Result<T, HuddleError>;
