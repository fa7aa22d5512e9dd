//! # Network Registry
//!
//! Summary of a deployed network, written next to the network once every
//! node is up so that test harnesses can find the nodes without talking to
//! the cluster.
//!
//! ## File Location
//!
//! ```text
//! <output_dir>/<network_name>/
//! \-- network.json    # Miners, PoETs, gateways and genesis time
//! ```
//!
//! ## Example Registry Structure
//!
//! ```json
//! {
//!   "network_name": "mininet",
//!   "genesis_time": "2026-01-01T12:10:00Z",
//!   "miners": [
//!     {
//!       "name": "miner-1",
//!       "peer_address": "/ip4/10.0.0.2/tcp/7513/p2p/3f9c...",
//!       "api_endpoint": "10.0.0.2:9092",
//!       "poet_server": "10.1.0.2:5000"
//!     }
//!   ],
//!   "poets": [
//!     { "name": "poet-1", "rest_endpoint": "10.1.0.2:5000" }
//!   ],
//!   "gateways": ["10.0.0.2:9092"]
//! }
//! ```
//!
//! Miners added to a running network are appended to the existing file,
//! and deleted miners are dropped from it.
//!
//! ## Listing
//!
//! [`list_networks`] walks the output directory and summarises every
//! network that has a registry, reading the network id from the persisted
//! miner config next to it.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::deploy::{node_name, NodeRecord, Role};
use crate::error::BackendError;
use crate::node_config::MinerConfig;
use crate::store::NETWORK_CONFIG_FILE;
use crate::topology::PoetAssignment;

pub const REGISTRY_FILE: &str = "network.json";

/// A deployed miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerInfo {
    pub name: String,
    pub ordinal: u32,
    pub peer_address: String,
    pub api_endpoint: String,
    /// PoET REST endpoint the miner was configured with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poet_server: Option<String>,
}

/// A deployed PoET service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoetInfo {
    pub name: String,
    pub ordinal: u32,
    pub rest_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRegistry {
    pub network_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_time: Option<String>,
    pub miners: Vec<MinerInfo>,
    pub poets: Vec<PoetInfo>,
    /// Miner API endpoints handed to the PoETs on activation
    pub gateways: Vec<String>,
}

impl MinerInfo {
    pub fn from_record(record: &NodeRecord, poet_server: Option<&str>) -> Self {
        Self {
            name: node_name(Role::Miner, record.ordinal),
            ordinal: record.ordinal,
            peer_address: record.peer_address.clone().unwrap_or_default(),
            api_endpoint: record.api_endpoint.clone().unwrap_or_default(),
            poet_server: poet_server.map(str::to_string),
        }
    }
}

impl NetworkRegistry {
    /// Build the registry from records ordered by ordinal
    pub fn from_records(
        network_name: &str,
        genesis_time: Option<String>,
        miners: &[NodeRecord],
        poets: &[NodeRecord],
        gateways: Vec<String>,
    ) -> Self {
        let assignment = PoetAssignment::new(
            poets.iter().filter_map(|poet| poet.rest_endpoint.clone()).collect(),
        );
        Self {
            network_name: network_name.to_string(),
            genesis_time,
            miners: miners
                .iter()
                .map(|miner| MinerInfo::from_record(miner, assignment.endpoint_for(miner.ordinal)))
                .collect(),
            poets: poets
                .iter()
                .map(|poet| PoetInfo {
                    name: node_name(Role::Poet, poet.ordinal),
                    ordinal: poet.ordinal,
                    rest_endpoint: poet.rest_endpoint.clone().unwrap_or_default(),
                })
                .collect(),
            gateways,
        }
    }

    /// Add a miner, keeping the list ordered by ordinal
    pub fn push_miner(&mut self, miner: MinerInfo) {
        self.miners.retain(|existing| existing.ordinal != miner.ordinal);
        self.miners.push(miner);
        self.miners.sort_by_key(|miner| miner.ordinal);
    }

    /// Drop the miner with `ordinal`, returning it if it was listed
    pub fn remove_miner(&mut self, ordinal: u32) -> Option<MinerInfo> {
        let index = self.miners.iter().position(|miner| miner.ordinal == ordinal)?;
        Some(self.miners.remove(index))
    }

    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), BackendError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(
            "Wrote registry for '{}' ({} miners, {} poets) to {:?}",
            self.network_name,
            self.miners.len(),
            self.poets.len(),
            path
        );
        Ok(())
    }
}

/// Summary of one deployed network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub name: String,
    pub genesis_time: Option<String>,
    pub miners: usize,
    pub poets: usize,
    /// `p2p.network-id` of the persisted config, if there is one
    pub network_id: Option<u64>,
}

/// Summarise every network under `output_dir`.
///
/// # Arguments
/// * `output_dir` - Directory holding one subdirectory per network
///
/// # Returns
/// * Summaries ordered by network name. Subdirectories without a registry
///   are skipped, and a missing `output_dir` yields an empty list
pub fn list_networks(output_dir: &Path) -> Result<Vec<NetworkSummary>, BackendError> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut summaries = Vec::new();
    for entry in entries {
        let network_dir = entry?.path();
        let registry_path = network_dir.join(REGISTRY_FILE);
        if !registry_path.is_file() {
            debug!("Skipping {:?}: no {}", network_dir, REGISTRY_FILE);
            continue;
        }
        let registry = NetworkRegistry::load(&registry_path)?;

        // The config is only written once a network is fully up
        let config_path = network_dir.join(NETWORK_CONFIG_FILE);
        let network_id = match fs::read_to_string(&config_path) {
            Ok(text) => MinerConfig::from_json(&text)?
                .p2p
                .extra
                .get("network-id")
                .and_then(Value::as_u64),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        summaries.push(NetworkSummary {
            name: registry.network_name,
            genesis_time: registry.genesis_time,
            miners: registry.miners.len(),
            poets: registry.poets.len(),
            network_id,
        });
    }
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn miner(ordinal: u32) -> NodeRecord {
        NodeRecord::miner(
            ordinal,
            format!("/ip4/10.0.0.{}/tcp/7513", ordinal),
            format!("10.0.0.{}:9092", ordinal),
        )
    }

    fn poet(ordinal: u32) -> NodeRecord {
        NodeRecord::poet(ordinal, format!("10.1.0.{}:5000", ordinal))
    }

    #[test]
    fn test_registry_assigns_poets_round_robin() {
        let registry = NetworkRegistry::from_records(
            "testnet",
            Some("2026-01-01T12:10:00Z".to_string()),
            &[miner(1), miner(2), miner(3)],
            &[poet(1), poet(2)],
            vec!["10.0.0.1:9092".to_string()],
        );

        assert_eq!(registry.miners[0].name, "miner-1");
        assert_eq!(registry.miners[0].poet_server.as_deref(), Some("10.1.0.1:5000"));
        assert_eq!(registry.miners[1].poet_server.as_deref(), Some("10.1.0.2:5000"));
        assert_eq!(registry.miners[2].poet_server.as_deref(), Some("10.1.0.1:5000"));
        assert_eq!(registry.poets[1].name, "poet-2");
    }

    #[test]
    fn test_registry_file_round_trip_with_added_miner() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(REGISTRY_FILE);
        let registry =
            NetworkRegistry::from_records("testnet", None, &[miner(1), miner(3)], &[poet(1)], Vec::new());
        registry.write(&path).unwrap();

        let mut loaded = NetworkRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);

        loaded.push_miner(MinerInfo::from_record(&miner(2), Some("10.1.0.1:5000")));
        let ordinals: Vec<u32> = loaded.miners.iter().map(|m| m.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_miner() {
        let mut registry =
            NetworkRegistry::from_records("testnet", None, &[miner(1), miner(2), miner(3)], &[poet(1)], Vec::new());

        let removed = registry.remove_miner(2).unwrap();
        assert_eq!(removed.name, "miner-2");
        let ordinals: Vec<u32> = registry.miners.iter().map(|m| m.ordinal).collect();
        assert_eq!(ordinals, vec![1, 3]);
        assert_eq!(registry.remove_miner(2), None);
    }

    #[test]
    fn test_list_networks() {
        let tmp = TempDir::new().unwrap();
        assert!(list_networks(&tmp.path().join("missing")).unwrap().is_empty());
        assert!(list_networks(tmp.path()).unwrap().is_empty());

        let alpha = tmp.path().join("alpha");
        fs::create_dir(&alpha).unwrap();
        NetworkRegistry::from_records(
            "alpha",
            Some("2026-01-01T12:10:00Z".to_string()),
            &[miner(1), miner(2)],
            &[poet(1)],
            Vec::new(),
        )
        .write(&alpha.join(REGISTRY_FILE))
        .unwrap();
        fs::write(alpha.join(NETWORK_CONFIG_FILE), r#"{"p2p": {"network-id": 42}}"#).unwrap();

        // Registry but no persisted config yet
        let beta = tmp.path().join("beta");
        fs::create_dir(&beta).unwrap();
        NetworkRegistry::from_records("beta", None, &[miner(1)], &[poet(1), poet(2)], Vec::new())
            .write(&beta.join(REGISTRY_FILE))
            .unwrap();

        // Not a network
        fs::create_dir(tmp.path().join("scratch")).unwrap();

        let summaries = list_networks(tmp.path()).unwrap();
        assert_eq!(
            summaries,
            vec![
                NetworkSummary {
                    name: "alpha".to_string(),
                    genesis_time: Some("2026-01-01T12:10:00Z".to_string()),
                    miners: 2,
                    poets: 1,
                    network_id: Some(42),
                },
                NetworkSummary {
                    name: "beta".to_string(),
                    genesis_time: None,
                    miners: 1,
                    poets: 2,
                    network_id: None,
                },
            ]
        );
    }
}
