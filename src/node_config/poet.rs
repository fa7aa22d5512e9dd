//! PoET service configuration.

use serde::{Deserialize, Serialize};

/// Proof parameter passed to every PoET
pub const POET_PROOF_PARAMETER: u32 = 21;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoetConfig {
    /// Seconds before the first proof round starts
    pub initial_duration_secs: u64,
    /// Length of every round after the first, one epoch
    pub round_duration_secs: u64,
    pub n: u32,
}

impl PoetConfig {
    pub fn new(initial_duration_secs: u64, round_duration_secs: u64) -> Self {
        Self {
            initial_duration_secs,
            round_duration_secs,
            n: POET_PROOF_PARAMETER,
        }
    }

    /// Render the service config file
    pub fn to_config_file(&self) -> String {
        format!("duration=\"{}s\"\nn=\"{}\"\n", self.round_duration_secs, self.n)
    }

    /// Initial duration in the form the service's command line expects
    pub fn initial_duration_arg(&self) -> String {
        format!("{}s", self.initial_duration_secs)
    }
}
