//! Node configuration documents.
//!
//! Miners receive a JSON document derived from the network's base config,
//! PoETs receive a small service config carrying their round timing.

pub mod miner;
pub mod poet;

pub use miner::{HareSection, MainSection, MinerConfig, P2pSection, SwarmSection};
pub use poet::PoetConfig;
