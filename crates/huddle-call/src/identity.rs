//! Local participant identity and the login-session context that owns it.

use chrono::{DateTime, Utc};
use huddle_common::ParticipantId;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub participant_id: ParticipantId,
    pub display_name: String,
    /// Bearer token from the login endpoint, if the user authenticated.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("participant_id", &self.participant_id)
            .field("display_name", &self.display_name)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Identity {
    /// Fresh identity with a random participant ID.
    ///
    /// Two identities with the same display name are still distinct
    /// participants.
    pub fn generate(display_name: &str) -> Self {
        Self {
            participant_id: ParticipantId::generate(),
            display_name: display_name.to_string(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Process-wide context created on login and dropped on logout.
///
/// Holds the identity that the transport and the call are opened with;
/// nothing reads identity from ambient state.
#[derive(Debug)]
pub struct LoginSession {
    identity: Identity,
    started_at: DateTime<Utc>,
}

impl LoginSession {
    pub fn begin(display_name: &str, access_token: Option<String>) -> Self {
        let mut identity = Identity::generate(display_name);
        identity.access_token = access_token;
        info!(
            participant = %identity.participant_id,
            display_name,
            "login session started"
        );
        Self {
            identity,
            started_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.identity.participant_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// End the session. The identity must not be reused afterwards.
    pub fn end(self) {
        info!(participant = %self.identity.participant_id, "login session ended");
    }
}
