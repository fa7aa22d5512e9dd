use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable description of the network to deploy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSpec {
    /// Name of the network, used for the cluster and the output directory
    pub network_name: String,
    /// Number of miner nodes (`M`)
    pub miners: u32,
    /// Number of PoET service nodes (`P`)
    pub poets: u32,
    /// Number of bootnodes handed to later miners (`B`)
    pub bootnodes: u32,
    /// Upper bound on deployments running at the same time (`C`)
    pub max_concurrent_deployments: u32,
    /// Delay between network creation and genesis
    #[serde(with = "humantime_serde")]
    pub genesis_delay: Duration,
    /// Stagger applied to consecutive PoET initial durations
    #[serde(with = "humantime_serde")]
    pub poet_phase_shift: Duration,
    /// Number of miner API endpoints passed to each PoET on activation (`G`)
    pub poet_gateways: u32,
    /// Start a fresh network instead of joining an existing one
    pub bootstrap: bool,
    /// Derive hare committee parameters from the miner count
    pub adjust_hare: bool,
    /// Cancel in-flight sibling deployments once a wave reports a failure
    pub cancel_on_error: bool,
    /// Bootnodes of the parent network when joining
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seed_bootnodes: Vec<String>,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            network_name: "mininet".to_string(),
            miners: 10,
            poets: 1,
            bootnodes: 6,
            max_concurrent_deployments: 100,
            genesis_delay: Duration::from_secs(10 * 60),
            poet_phase_shift: Duration::ZERO,
            poet_gateways: 4,
            bootstrap: true,
            adjust_hare: true,
            cancel_on_error: false,
            seed_bootnodes: Vec::new(),
        }
    }
}

impl NetworkSpec {
    /// Validate the spec before anything is provisioned
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.network_name.trim().is_empty() {
            return Err(ValidationError::InvalidNetwork(
                "network_name cannot be empty".to_string(),
            ));
        }
        if self.miners == 0 {
            return Err(ValidationError::InvalidNodes(
                "at least one miner is required".to_string(),
            ));
        }
        if self.poets == 0 {
            return Err(ValidationError::InvalidNodes(
                "at least one poet is required, every miner is assigned a poet-server".to_string(),
            ));
        }
        if self.bootnodes == 0 && self.miners > 1 {
            return Err(ValidationError::InvalidTopology(
                "bootnodes must be at least 1 when deploying more than one miner".to_string(),
            ));
        }
        if self.max_concurrent_deployments == 0 {
            return Err(ValidationError::InvalidTopology(
                "max_concurrent_deployments must be at least 1".to_string(),
            ));
        }
        if self.poet_gateways == 0 {
            return Err(ValidationError::InvalidNodes(
                "poet_gateways must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bootnode count after capping to what the miner count can supply.
    ///
    /// A self-bootstrapping network spends ordinal 1 on the bootstrap node,
    /// so at most `M - 1` miners remain to act as bootnodes.
    pub fn effective_bootnodes(&self) -> u32 {
        let cap = if self.bootstrap {
            self.miners.saturating_sub(1)
        } else {
            self.miners
        };
        self.bootnodes.min(cap)
    }

    /// Gateway count after capping to the miner count
    pub fn effective_gateways(&self) -> u32 {
        self.poet_gateways.min(self.miners)
    }
}

/// Network spec validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid node counts: {0}")]
    InvalidNodes(String),
    #[error("Invalid topology configuration: {0}")]
    InvalidTopology(String),
}
