//! Typed miner configuration document.
//!
//! The document is the JSON config handed to every miner. Only the values
//! the orchestrator overrides have explicit fields; everything else is kept
//! verbatim in the `extra` maps so that the rendered document round-trips
//! unknown keys. Values are treated as immutable snapshots: every override
//! returns a new document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::{DerivedParameters, HareParameters};

/// Keys accepted for the layer duration in the `main` section
pub const LAYER_DURATION_KEYS: [&str; 2] = ["layer-duration-sec", "layer-duration-seconds"];
/// Key for the number of layers in an epoch in the `main` section
pub const LAYERS_PER_EPOCH_KEY: &str = "layers-per-epoch";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MinerConfig {
    #[serde(default)]
    pub main: MainSection,
    #[serde(default)]
    pub p2p: P2pSection,
    #[serde(default, skip_serializing_if = "HareSection::is_empty")]
    pub hare: HareSection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MainSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_active_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poet_server: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MainSection {
    /// Read a numeric value that the orchestrator does not override
    pub fn number(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(Value::as_f64)
    }

    /// Layer duration in seconds, under either accepted key
    pub fn layer_duration_secs(&self) -> Option<f64> {
        LAYER_DURATION_KEYS.iter().find_map(|key| self.number(key))
    }

    pub fn layers_per_epoch(&self) -> Option<f64> {
        self.number(LAYERS_PER_EPOCH_KEY)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct P2pSection {
    #[serde(default)]
    pub swarm: SwarmSection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SwarmSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootnodes: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HareSection {
    #[serde(rename = "hare-committee-size", skip_serializing_if = "Option::is_none")]
    pub committee_size: Option<u32>,
    #[serde(rename = "hare-max-adversaries", skip_serializing_if = "Option::is_none")]
    pub max_adversaries: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HareSection {
    pub fn is_empty(&self) -> bool {
        self.committee_size.is_none() && self.max_adversaries.is_none() && self.extra.is_empty()
    }
}

impl MinerConfig {
    /// Parse a config document from its JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Render the document for the deployment boundary
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Bootnodes currently carried by the document
    pub fn bootnodes(&self) -> &[String] {
        self.p2p.swarm.bootnodes.as_deref().unwrap_or(&[])
    }

    pub fn poet_server(&self) -> Option<&str> {
        self.main.poet_server.as_deref()
    }

    /// Apply the network-wide derived parameters.
    ///
    /// Fields the derivation left unset keep the base document's values.
    pub fn with_parameters(&self, params: &DerivedParameters) -> Self {
        let mut next = self.clone();
        if let Some(genesis_time) = &params.genesis_time {
            next.main.genesis_time = Some(genesis_time.clone());
        }
        if let Some(size) = params.genesis_active_size {
            next.main.genesis_active_size = Some(size);
        }
        if let Some(HareParameters { committee_size, max_adversaries }) = params.hare {
            next.hare.committee_size = Some(committee_size);
            next.hare.max_adversaries = Some(max_adversaries);
        }
        next
    }

    pub fn with_bootnodes(&self, bootnodes: Vec<String>) -> Self {
        let mut next = self.clone();
        next.p2p.swarm.bootnodes = Some(bootnodes);
        next
    }

    pub fn with_bootstrap_flag(&self, bootstrap: bool) -> Self {
        let mut next = self.clone();
        next.p2p.swarm.bootstrap = Some(bootstrap);
        next
    }

    pub fn with_poet_server(&self, endpoint: &str) -> Self {
        let mut next = self.clone();
        next.main.poet_server = Some(endpoint.to_string());
        next
    }
}
