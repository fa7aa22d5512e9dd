use crate::network_spec::NetworkSpec;
use crate::node_config::MinerConfig;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Load and validate a network spec from a YAML file
///
/// # Arguments
/// * `spec_path` - Path to the YAML file
///
/// # Returns
/// * The parsed spec, already validated. Fields missing from the file take
///   their defaults
pub fn load_network_spec(spec_path: &Path) -> Result<NetworkSpec> {
    info!("Loading network spec from: {:?}", spec_path);

    let file = File::open(spec_path)
        .wrap_err_with(|| format!("Failed to open network spec '{}'", spec_path.display()))?;
    let spec: NetworkSpec = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse network spec '{}'", spec_path.display()))?;

    // Reject bad sizes here rather than after provisioning
    spec.validate()?;
    Ok(spec)
}

/// Load a miner config document from a JSON file
pub fn load_miner_config(config_path: &Path) -> Result<MinerConfig> {
    info!("Loading miner config from: {:?}", config_path);

    let text = std::fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read miner config '{}'", config_path.display()))?;
    let config = MinerConfig::from_json(&text)
        .wrap_err_with(|| format!("Failed to parse miner config '{}'", config_path.display()))?;
    Ok(config)
}

/// Command-line values that take precedence over the YAML spec
#[derive(Debug, Clone, Default)]
pub struct SpecOverrides {
    pub network_name: Option<String>,
    pub miners: Option<u32>,
    pub poets: Option<u32>,
    pub bootnodes: Option<u32>,
    pub max_concurrent_deployments: Option<u32>,
    pub genesis_delay: Option<Duration>,
    pub poet_phase_shift: Option<Duration>,
    pub poet_gateways: Option<u32>,
    /// Join an existing network instead of bootstrapping a new one
    pub join: bool,
    pub no_adjust_hare: bool,
    pub cancel_on_error: bool,
    pub seed_bootnodes: Vec<String>,
}

/// Apply CLI overrides to a network spec and re-validate it
pub fn apply_overrides(spec: &mut NetworkSpec, overrides: &SpecOverrides) -> Result<()> {
    if let Some(name) = &overrides.network_name {
        spec.network_name = name.clone();
    }
    if let Some(miners) = overrides.miners {
        spec.miners = miners;
    }
    if let Some(poets) = overrides.poets {
        spec.poets = poets;
    }
    if let Some(bootnodes) = overrides.bootnodes {
        spec.bootnodes = bootnodes;
    }
    if let Some(concurrency) = overrides.max_concurrent_deployments {
        spec.max_concurrent_deployments = concurrency;
    }
    if let Some(delay) = overrides.genesis_delay {
        spec.genesis_delay = delay;
    }
    if let Some(shift) = overrides.poet_phase_shift {
        spec.poet_phase_shift = shift;
    }
    if let Some(gateways) = overrides.poet_gateways {
        spec.poet_gateways = gateways;
    }
    if overrides.join {
        spec.bootstrap = false;
    }
    if overrides.no_adjust_hare {
        spec.adjust_hare = false;
    }
    if overrides.cancel_on_error {
        spec.cancel_on_error = true;
    }
    if !overrides.seed_bootnodes.is_empty() {
        spec.seed_bootnodes = overrides.seed_bootnodes.clone();
    }

    spec.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_network_spec() {
        let yaml = r#"
network_name: "devnet"
miners: 20
poets: 2
genesis_delay: "5m"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let spec = load_network_spec(temp_file.path()).unwrap();
        assert_eq!(spec.network_name, "devnet");
        assert_eq!(spec.poets, 2);
        assert_eq!(spec.genesis_delay, Duration::from_secs(300));
        assert_eq!(spec.bootnodes, 6);
    }

    #[test]
    fn test_load_invalid_spec_fails() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "miners: 5\npoets: 0\n").unwrap();
        assert!(load_network_spec(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_miner_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, r#"{{"main": {{"layer-duration-sec": 30, "layers-per-epoch": 3}}}}"#).unwrap();

        let config = load_miner_config(temp_file.path()).unwrap();
        assert_eq!(config.main.layers_per_epoch(), Some(3.0));
        assert!(load_miner_config(Path::new("/nonexistent/config.json")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut spec = NetworkSpec::default();
        let overrides = SpecOverrides {
            miners: Some(40),
            genesis_delay: Some(Duration::from_secs(120)),
            join: true,
            seed_bootnodes: vec!["/ip4/1.2.3.4/tcp/7513".to_string()],
            ..SpecOverrides::default()
        };

        apply_overrides(&mut spec, &overrides).unwrap();
        assert_eq!(spec.miners, 40);
        assert_eq!(spec.genesis_delay, Duration::from_secs(120));
        assert!(!spec.bootstrap);
        assert_eq!(spec.seed_bootnodes.len(), 1);
        // Untouched fields keep their values
        assert_eq!(spec.poets, 1);
    }

    #[test]
    fn test_apply_overrides_revalidates() {
        let mut spec = NetworkSpec::default();
        let overrides = SpecOverrides { max_concurrent_deployments: Some(0), ..SpecOverrides::default() };
        assert!(apply_overrides(&mut spec, &overrides).is_err());
    }
}
