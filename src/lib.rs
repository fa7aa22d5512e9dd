//! # Netcraft - Orchestrator for ephemeral miner and PoET test networks
//!
//! This library brings up short-lived test networks made of miner nodes and
//! proof-of-elapsed-time (PoET) services. It decides how many nodes are
//! deployed, in which order, with which config and how many at a time; the
//! nodes themselves are started by a pluggable deployment backend.
//!
//! ## Overview
//!
//! A network is deployed in strictly ordered phases:
//!
//! 1. provision the cluster
//! 2. deploy all PoETs
//! 3. deploy the bootstrap miner, which dials nobody
//! 4. deploy the bootnodes, which dial the bootstrap miner
//! 5. deploy the remaining miners in bounded waves, dialing the bootnodes
//! 6. activate every PoET with a handful of miner API endpoints
//! 7. persist the final miner config
//!
//! Every miner only dials miners deployed in an earlier wave, so the
//! bootstrap topology is acyclic by construction.
//!
//! ## Architecture
//!
//! - `network_spec`: the YAML network description and its validation
//! - `config_loader`: spec and config file loading, CLI overrides
//! - `node_config`: typed miner and PoET config documents
//! - `params`: genesis time, PoET timing and hare parameter derivation
//! - `topology`: wave planning, bootnode selection and round-robin cursors
//! - `executor`: bounded concurrent execution of one wave
//! - `deploy`: collaborator traits and the bundled backends
//! - `store`: durable storage for the network config
//! - `registry`: JSON summary of a deployed network, and listing of networks
//! - `orchestrator`: the phase state machine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netcraft::config_loader::{load_miner_config, load_network_spec};
//! use netcraft::deploy::ManifestBackend;
//! use netcraft::orchestrator::Orchestrator;
//! use netcraft::store::FileConfigStore;
//! use std::path::Path;
//!
//! let spec = load_network_spec(Path::new("network.yaml"))?;
//! let base = load_miner_config(Path::new("miner.json"))?;
//!
//! let network_dir = Path::new("netcraft_output").join(&spec.network_name);
//! let backend = ManifestBackend::new(&network_dir, 4);
//! let store = FileConfigStore::in_dir(&network_dir);
//!
//! let mut orchestrator = Orchestrator::new(&backend, &backend, &backend, &store);
//! let registry = orchestrator.create_network(&spec, &base)?;
//! println!("{} miners up", registry.miners.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return typed errors (`error::OrchestratorError`)
//! carrying the failing phase and node ordinal. File loading uses
//! `color_eyre` for reporting with context.

pub mod config_loader;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod network_spec;
pub mod node_config;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod store;
pub mod topology;
