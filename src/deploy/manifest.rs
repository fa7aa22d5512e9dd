//! Directory-tree backend.
//!
//! Materialises a network on the local filesystem instead of a real
//! cluster. Every node gets its own directory holding its rendered config
//! and a `node.json` manifest with the addresses it was assigned:
//!
//! ```text
//! <network_dir>/
//! |-- cluster.json
//! |-- poet-1/{config.conf, node.json, activation.json}
//! |-- miner-1/{config.json, node.json}
//! \-- miner-2/{config.json, node.json}
//! ```
//!
//! Nodes are never overwritten: deploying an ordinal whose directory
//! already exists fails, the same way a cluster rejects a duplicate
//! deployment name. Removing a node deletes its directory.

use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{
    node_name, ClusterHandle, ClusterProvisioner, DeployRequest, NodeConfig, NodeDeployer,
    NodeRecord, PlacementHint, PoetActivator, Role,
};
use crate::error::BackendError;
use crate::executor::CancelToken;
use crate::network_spec::NetworkSpec;

pub const MINER_P2P_PORT: u16 = 7513;
pub const MINER_GRPC_PORT: u16 = 9092;
pub const POET_REST_PORT: u16 = 5000;

pub const CLUSTER_FILE: &str = "cluster.json";
pub const MANIFEST_FILE: &str = "node.json";
pub const ACTIVATION_FILE: &str = "activation.json";

static MINER_DIR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^miner-(\d+)$").expect("Invalid miner directory regex"));

/// Contents of a node's `node.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeManifest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementHint>,
    pub args: Vec<String>,
    pub record: NodeRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivationRecord<'a> {
    gateway_addresses: &'a [String],
}

pub struct ManifestBackend {
    network_dir: PathBuf,
    hosts: u32,
    /// PoET REST endpoint -> node directory
    poets: Mutex<HashMap<String, PathBuf>>,
}

impl ManifestBackend {
    /// `hosts` is the number of cluster hosts reported for placement
    pub fn new(network_dir: impl Into<PathBuf>, hosts: u32) -> Self {
        Self {
            network_dir: network_dir.into(),
            hosts,
            poets: Mutex::new(HashMap::new()),
        }
    }

    pub fn network_dir(&self) -> &Path {
        &self.network_dir
    }

    pub fn node_dir(&self, role: Role, ordinal: u32) -> PathBuf {
        self.network_dir.join(node_name(role, ordinal))
    }

    /// One past the highest miner ordinal present in the network
    pub fn next_miner_ordinal(&self) -> Result<u32, BackendError> {
        if !self.network_dir.is_dir() {
            return Err(BackendError::NotFound(self.network_dir.display().to_string()));
        }
        let mut latest = 0;
        for entry in fs::read_dir(&self.network_dir)? {
            let name = entry?.file_name();
            let ordinal = MINER_DIR_PATTERN
                .captures(&name.to_string_lossy())
                .and_then(|captures| captures[1].parse::<u32>().ok());
            if let Some(ordinal) = ordinal {
                latest = latest.max(ordinal);
            }
        }
        Ok(latest + 1)
    }

    fn create_node_dir(&self, role: Role, ordinal: u32) -> Result<PathBuf, BackendError> {
        let dir = self.node_dir(role, ordinal);
        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(BackendError::AlreadyExists(node_name(role, ordinal)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Deterministic address for a node: miners in 10.0.0.0/16, PoETs in 10.1.0.0/16
///
/// # Arguments
/// * `role` - Selects the /16 block
/// * `ordinal` - Position within the block
///
/// # Returns
/// * `Err(BackendError::AddressSpaceExhausted)` once the block is full,
///   i.e. for ordinals of 65024 and above
pub fn node_ip(role: Role, ordinal: u32) -> Result<Ipv4Addr, BackendError> {
    let second = match role {
        Role::Miner => 0,
        Role::Poet => 1,
    };
    // 254 hosts per /24, skipping .0 and .255 in the last octet
    let third = u8::try_from(ordinal / 254)
        .map_err(|_| BackendError::AddressSpaceExhausted { role, ordinal })?;
    let fourth = (ordinal % 254 + 1) as u8;
    Ok(Ipv4Addr::new(10, second, third, fourth))
}

/// Random 20-byte node identity, hex encoded
fn node_identity() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl ClusterProvisioner for ManifestBackend {
    fn provision(&self, spec: &NetworkSpec) -> Result<ClusterHandle, BackendError> {
        fs::create_dir_all(&self.network_dir)?;
        let handle = ClusterHandle {
            name: spec.network_name.clone(),
            hosts: (1..=self.hosts.max(1)).map(|i| format!("host-{}", i)).collect(),
        };
        fs::write(
            self.network_dir.join(CLUSTER_FILE),
            serde_json::to_string_pretty(&handle)?,
        )?;
        info!(
            "Provisioned cluster '{}' with {} host(s) at {:?}",
            handle.name,
            handle.hosts.len(),
            self.network_dir
        );
        Ok(handle)
    }

    fn destroy(&self, network_name: &str) -> Result<(), BackendError> {
        if !self.network_dir.exists() {
            return Err(BackendError::NotFound(network_name.to_string()));
        }
        fs::remove_dir_all(&self.network_dir)?;
        self.poets.lock().clear();
        info!("Destroyed network '{}'", network_name);
        Ok(())
    }
}

impl NodeDeployer for ManifestBackend {
    fn deploy(&self, request: &DeployRequest, cancel: &CancelToken) -> Result<NodeRecord, BackendError> {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        let name = request.node_name();
        // Resolve the address first so a rejected ordinal leaves no directory behind
        let ip = node_ip(request.role, request.ordinal)?;
        let dir = self.create_node_dir(request.role, request.ordinal)?;

        // Render the role's config and the args the node is started with
        let (record, args) = match &request.config {
            NodeConfig::Miner(config) => {
                fs::write(dir.join("config.json"), config.to_json_pretty()?)?;
                let peer = format!("/ip4/{}/tcp/{}/p2p/{}", ip, MINER_P2P_PORT, node_identity());
                let api = format!("{}:{}", ip, MINER_GRPC_PORT);
                let args = vec!["--config".to_string(), "config.json".to_string()];
                (NodeRecord::miner(request.ordinal, peer, api), args)
            }
            NodeConfig::Poet(config) => {
                fs::write(dir.join("config.conf"), config.to_config_file())?;
                let rest = format!("{}:{}", ip, POET_REST_PORT);
                // Activation looks the directory up by endpoint
                self.poets.lock().insert(rest.clone(), dir.clone());
                let args = vec![
                    "--configfile".to_string(),
                    "config.conf".to_string(),
                    "--initialduration".to_string(),
                    config.initial_duration_arg(),
                ];
                (NodeRecord::poet(request.ordinal, rest), args)
            }
        };

        // node.json is written last; its presence marks a complete deployment
        let manifest = NodeManifest {
            name: name.clone(),
            placement: request.placement.clone(),
            args,
            record: record.clone(),
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;
        debug!("Deployed {} at {}", name, ip);
        Ok(record)
    }

    fn remove(&self, role: Role, ordinal: u32) -> Result<(), BackendError> {
        let name = node_name(role, ordinal);
        let dir = self.node_dir(role, ordinal);
        if !dir.is_dir() {
            return Err(BackendError::NotFound(name));
        }
        fs::remove_dir_all(&dir)?;
        if role == Role::Poet {
            self.poets.lock().retain(|_, poet_dir| *poet_dir != dir);
        }
        info!("Removed {} from {:?}", name, self.network_dir);
        Ok(())
    }
}

impl PoetActivator for ManifestBackend {
    fn activate(&self, rest_endpoint: &str, gateways: &[String]) -> Result<(), BackendError> {
        let dir = self
            .poets
            .lock()
            .get(rest_endpoint)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(rest_endpoint.to_string()))?;
        let activation = ActivationRecord { gateway_addresses: gateways };
        fs::write(dir.join(ACTIVATION_FILE), serde_json::to_string_pretty(&activation)?)?;
        debug!("Recorded activation of {} with {} gateway(s)", rest_endpoint, gateways.len());
        Ok(())
    }
}
