use serde::{Deserialize, Serialize};

/// Which side of a pairing sends the first offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GlareMode {
    /// Whoever observes the other's presence first initiates.
    #[default]
    FirstObserver,
    /// The lexicographically smaller participant ID always initiates.
    LowerIdInitiates,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallPolicyConfig {
    pub glare_policy: GlareMode,
}
