//! Peer session orchestration: one negotiation state machine per remote
//! participant, owned and routed by [`PeerSessionOrchestrator`].

mod orchestrator;
mod peer;
mod types;


pub use orchestrator::PeerSessionOrchestrator;
pub use types::{
    GlarePolicy, OrchestratorConfig, SessionEvent, SessionRole, SessionSnapshot, SessionState,
    Signal,
};
