//! # Deployment collaborators
//!
//! The orchestrator never starts a node itself. It talks to a small set of
//! collaborators, each behind a trait, and only decides what they are asked
//! to do and in which order.
//!
//! ## Interfaces
//!
//! - [`ClusterProvisioner`]: creates (and tears down) the compute cluster
//!   and reports the hosts nodes can be placed on
//! - [`NodeDeployer`]: turns a role, an ordinal, a config snapshot and an
//!   optional placement hint into a running node and reports its addresses.
//!   Also removes single nodes again
//! - [`NodeSelector`]: hands out placement hints, round-robin
//! - [`PoetActivator`]: starts a deployed PoET's proof rounds
//! - [`crate::store::ConfigStore`]: durable storage for the network config
//!
//! ## Backends
//!
//! - `manifest`: materialises the network as a directory tree, one
//!   directory per node, for dry runs and tests
//! - `activation`: HTTP activation of real PoET services
//!
//! ## Concurrency
//!
//! `NodeDeployer::deploy` is called concurrently from wave workers for
//! different ordinals, so deployers must be `Send + Sync`. Each call gets
//! its own [`DeployRequest`], whose config is an owned snapshot.

pub mod activation;
pub mod manifest;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BackendError;
use crate::executor::CancelToken;
use crate::network_spec::NetworkSpec;
use crate::node_config::{MinerConfig, PoetConfig};

pub use activation::HttpPoetActivator;
pub use manifest::ManifestBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Miner,
    Poet,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Miner => "miner",
            Role::Poet => "poet",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host a node should be scheduled on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementHint(pub String);

impl fmt::Display for PlacementHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Config snapshot handed to a single deployment
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Miner(MinerConfig),
    Poet(PoetConfig),
}

/// One entry of a deployment wave
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub role: Role,
    pub ordinal: u32,
    pub config: NodeConfig,
    pub placement: Option<PlacementHint>,
}

impl DeployRequest {
    pub fn miner(ordinal: u32, config: MinerConfig, placement: Option<PlacementHint>) -> Self {
        Self {
            role: Role::Miner,
            ordinal,
            config: NodeConfig::Miner(config),
            placement,
        }
    }

    pub fn poet(ordinal: u32, config: PoetConfig) -> Self {
        Self {
            role: Role::Poet,
            ordinal,
            config: NodeConfig::Poet(config),
            placement: None,
        }
    }

    /// Name of the node, e.g. `miner-3`
    pub fn node_name(&self) -> String {
        node_name(self.role, self.ordinal)
    }
}

/// Name of the node with `role` and `ordinal`; also its directory and deployment name
pub fn node_name(role: Role, ordinal: u32) -> String {
    format!("{}-{}", role, ordinal)
}

/// Addresses of a successfully deployed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub role: Role,
    pub ordinal: u32,
    /// Dialable multiaddress, miners only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_address: Option<String>,
    /// gRPC API endpoint, miners only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
    /// REST endpoint, PoETs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_endpoint: Option<String>,
}

impl NodeRecord {
    pub fn miner(ordinal: u32, peer_address: String, api_endpoint: String) -> Self {
        Self {
            role: Role::Miner,
            ordinal,
            peer_address: Some(peer_address),
            api_endpoint: Some(api_endpoint),
            rest_endpoint: None,
        }
    }

    pub fn poet(ordinal: u32, rest_endpoint: String) -> Self {
        Self {
            role: Role::Poet,
            ordinal,
            peer_address: None,
            api_endpoint: None,
            rest_endpoint: Some(rest_endpoint),
        }
    }
}

/// Handle to a provisioned cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHandle {
    pub name: String,
    /// Hosts available for placement hints
    pub hosts: Vec<String>,
}

impl ClusterHandle {
    // One hint per host, in host order
    pub fn placement_hints(&self) -> Vec<PlacementHint> {
        self.hosts.iter().cloned().map(PlacementHint).collect()
    }
}

pub trait ClusterProvisioner {
    fn provision(&self, spec: &NetworkSpec) -> Result<ClusterHandle, BackendError>;

    fn destroy(&self, network_name: &str) -> Result<(), BackendError>;
}

pub trait NodeDeployer: Send + Sync {
    /// Start a node and wait until it is reachable.
    ///
    /// Implementations own their readiness timeouts. `cancel` is tripped
    /// when a sibling in the same wave has failed and the run was configured
    /// to cancel on error.
    fn deploy(&self, request: &DeployRequest, cancel: &CancelToken) -> Result<NodeRecord, BackendError>;

    /// Stop a single node and release what it was given.
    ///
    /// # Arguments
    /// * `role` - Role of the node
    /// * `ordinal` - Ordinal of the node within its role
    ///
    /// # Returns
    /// * `Err(BackendError::NotFound)` if no such node was deployed
    fn remove(&self, role: Role, ordinal: u32) -> Result<(), BackendError>;
}

pub trait NodeSelector: Send + Sync {
    fn next(&self) -> Option<PlacementHint>;
}

pub trait PoetActivator {
    /// Start the PoET behind `rest_endpoint`, anchoring it to `gateways`
    fn activate(&self, rest_endpoint: &str, gateways: &[String]) -> Result<(), BackendError>;
}
