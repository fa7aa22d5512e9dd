//! Durable storage for the network's miner config.
//!
//! The orchestrator writes the final config once a network is fully up;
//! later operations (adding a miner) read it back.

use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::BackendError;
use crate::node_config::MinerConfig;

/// File name used by [`FileConfigStore::in_dir`]
pub const NETWORK_CONFIG_FILE: &str = "network-config.json";

pub trait ConfigStore {
    /// Replace the stored config with `config`
    fn write(&self, config: &MinerConfig) -> Result<(), BackendError>;

    /// # Returns
    /// * `Err(BackendError::NotFound)` if nothing was ever written
    fn read(&self) -> Result<MinerConfig, BackendError>;
}

/// Stores the config as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/network-config.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(NETWORK_CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn write(&self, config: &MinerConfig) -> Result<(), BackendError> {
        // The network directory may not exist yet
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, config.to_json_pretty()?)?;
        debug!("Wrote network config to {:?}", self.path);
        Ok(())
    }

    fn read(&self) -> Result<MinerConfig, BackendError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::NotFound(self.path.display().to_string()),
            _ => e.into(),
        })?;
        Ok(MinerConfig::from_json(&text)?)
    }
}
