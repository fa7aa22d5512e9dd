//! Network topology planning.
//!
//! This module decides the order in which nodes are deployed, which peers
//! each miner dials at startup, and how placement and PoET endpoints are
//! spread across the network.

pub mod plan;
pub mod selector;

// Re-export key types and functions for easier access
pub use plan::{plan_waves, resolve_bootnodes, select_bootnodes, BootnodeSource, DeploymentPlan, WavePlan};
pub use selector::{PoetAssignment, RoundRobin};
