use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use netcraft::config_loader::{apply_overrides, load_miner_config, load_network_spec, SpecOverrides};
use netcraft::deploy::{HttpPoetActivator, ManifestBackend, PoetActivator};
use netcraft::network_spec::NetworkSpec;
use netcraft::orchestrator::Orchestrator;
use netcraft::registry::{list_networks, MinerInfo, NetworkRegistry, REGISTRY_FILE};
use netcraft::store::{ConfigStore, FileConfigStore};

/// Orchestrator for ephemeral miner and PoET test networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding one subdirectory per network
    #[arg(short, long, default_value = "netcraft_output", global = true)]
    output: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy a new network
    Create(CreateArgs),
    /// Deploy one more miner into an existing network
    AddMiner(AddMinerArgs),
    /// Remove one miner from an existing network
    DeleteMiner {
        /// Name of the network the miner belongs to
        #[arg(short, long)]
        name: String,

        /// Ordinal of the miner to delete
        #[arg(long)]
        ordinal: u32,
    },
    /// List the networks under the output directory
    List,
    /// Tear a network down
    Delete {
        /// Name of the network to delete
        #[arg(short, long)]
        name: String,
    },
}

#[derive(ClapArgs, Debug)]
struct CreateArgs {
    /// Network spec YAML file; defaults apply when omitted
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Base miner config JSON file
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    miners: Option<u32>,

    #[arg(long)]
    poets: Option<u32>,

    #[arg(long)]
    bootnodes: Option<u32>,

    /// Maximum number of deployments running at once
    #[arg(long)]
    max_concurrent: Option<u32>,

    /// Delay until genesis, e.g. "10m"
    #[arg(long, value_parser = humantime::parse_duration)]
    genesis_delay: Option<Duration>,

    /// Stagger between PoET initial durations, e.g. "30s"
    #[arg(long, value_parser = humantime::parse_duration)]
    poet_phase_shift: Option<Duration>,

    /// Number of miner API endpoints passed to each PoET
    #[arg(long)]
    poet_gateways: Option<u32>,

    /// Join an existing network instead of bootstrapping a new one
    #[arg(long)]
    join: bool,

    /// Bootnode of the network being joined (repeatable)
    #[arg(long = "seed-bootnode")]
    seed_bootnodes: Vec<String>,

    /// Keep the base config's hare parameters
    #[arg(long)]
    no_adjust_hare: bool,

    /// Cancel the rest of a wave once one of its deployments fails
    #[arg(long)]
    cancel_on_error: bool,

    /// Number of cluster hosts to spread placed nodes over
    #[arg(long, default_value_t = 4)]
    hosts: u32,

    /// Activate PoETs through their REST API instead of recording the activation
    #[arg(long)]
    http_activation: bool,

    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    activation_timeout: Duration,
}

#[derive(ClapArgs, Debug)]
struct AddMinerArgs {
    /// Name of the network to extend
    #[arg(short, long)]
    name: String,

    /// Ordinal of the new miner; defaults to the next free one
    #[arg(long)]
    ordinal: Option<u32>,

    /// Miner config JSON file; defaults to the network's persisted config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl CreateArgs {
    fn overrides(&self) -> SpecOverrides {
        SpecOverrides {
            network_name: self.name.clone(),
            miners: self.miners,
            poets: self.poets,
            bootnodes: self.bootnodes,
            max_concurrent_deployments: self.max_concurrent,
            genesis_delay: self.genesis_delay,
            poet_phase_shift: self.poet_phase_shift,
            poet_gateways: self.poet_gateways,
            join: self.join,
            no_adjust_hare: self.no_adjust_hare,
            cancel_on_error: self.cancel_on_error,
            seed_bootnodes: self.seed_bootnodes.clone(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    info!("Output directory: {:?}", args.output);

    match args.command {
        Command::Create(create) => create_network(&args.output, &create),
        Command::AddMiner(add) => add_miner(&args.output, &add),
        Command::DeleteMiner { name, ordinal } => delete_miner(&args.output, &name, ordinal),
        Command::List => list(&args.output),
        Command::Delete { name } => delete_network(&args.output, &name),
    }
}

fn create_network(output: &Path, args: &CreateArgs) -> Result<()> {
    let mut spec = match &args.spec {
        Some(path) => load_network_spec(path)?,
        None => NetworkSpec::default(),
    };
    apply_overrides(&mut spec, &args.overrides())?;
    let base = load_miner_config(&args.config)?;

    let network_dir = output.join(&spec.network_name);
    let backend = ManifestBackend::new(&network_dir, args.hosts);
    let store = FileConfigStore::in_dir(&network_dir);
    let http = HttpPoetActivator::new(args.activation_timeout);
    let activator: &dyn PoetActivator = if args.http_activation { &http } else { &backend };

    let mut orchestrator = Orchestrator::new(&backend, &backend, activator, &store);
    let registry = orchestrator
        .create_network(&spec, &base)
        .wrap_err_with(|| format!("Failed to create network '{}'", spec.network_name))?;

    let registry_path = network_dir.join(REGISTRY_FILE);
    registry.write(&registry_path)?;
    info!("Network config persisted to {:?}", store.path());
    info!("Gateways: {}", registry.gateways.join(", "));
    Ok(())
}

fn add_miner(output: &Path, args: &AddMinerArgs) -> Result<()> {
    let network_dir = output.join(&args.name);
    let backend = ManifestBackend::new(&network_dir, 1);
    let store = FileConfigStore::in_dir(&network_dir);

    let ordinal = match args.ordinal {
        Some(ordinal) => ordinal,
        None => backend
            .next_miner_ordinal()
            .wrap_err_with(|| format!("Network '{}' does not exist", args.name))?,
    };
    let config = args.config.as_deref().map(load_miner_config).transpose()?;
    let poet_server = match &config {
        Some(config) => config.poet_server().map(str::to_string),
        None => store.read().ok().and_then(|stored| stored.main.poet_server),
    };

    let mut orchestrator = Orchestrator::new(&backend, &backend, &backend, &store);
    let record = orchestrator
        .add_miner(&args.name, ordinal, config)
        .wrap_err_with(|| format!("Failed to add miner-{} to '{}'", ordinal, args.name))?;

    let registry_path = network_dir.join(REGISTRY_FILE);
    if registry_path.exists() {
        let mut registry = NetworkRegistry::load(&registry_path)?;
        registry.push_miner(MinerInfo::from_record(&record, poet_server.as_deref()));
        registry.write(&registry_path)?;
    }
    info!("Added miner-{} at {}", ordinal, record.api_endpoint.unwrap_or_default());
    Ok(())
}

fn delete_miner(output: &Path, name: &str, ordinal: u32) -> Result<()> {
    let network_dir = output.join(name);
    let backend = ManifestBackend::new(&network_dir, 1);
    let store = FileConfigStore::in_dir(&network_dir);

    let mut orchestrator = Orchestrator::new(&backend, &backend, &backend, &store);
    orchestrator
        .delete_miner(name, ordinal)
        .wrap_err_with(|| format!("Failed to delete miner-{} from '{}'", ordinal, name))?;

    // Keep the registry in step with the network
    let registry_path = network_dir.join(REGISTRY_FILE);
    if registry_path.exists() {
        let mut registry = NetworkRegistry::load(&registry_path)?;
        if registry.remove_miner(ordinal).is_some() {
            registry.write(&registry_path)?;
        }
    }
    info!("Deleted miner-{} from '{}'", ordinal, name);
    Ok(())
}

fn list(output: &Path) -> Result<()> {
    let networks = list_networks(output)
        .wrap_err_with(|| format!("Failed to list networks in {:?}", output))?;
    if networks.is_empty() {
        warn!("No networks found");
        return Ok(());
    }

    info!("Deployed networks:");
    for network in &networks {
        info!(
            "  {}: genesis {}, {} miners, {} poets, network id {}",
            network.name,
            network.genesis_time.as_deref().unwrap_or("unset"),
            network.miners,
            network.poets,
            network
                .network_id
                .map_or_else(|| "unknown".to_string(), |id| id.to_string())
        );
    }
    Ok(())
}

fn delete_network(output: &Path, name: &str) -> Result<()> {
    let network_dir = output.join(name);
    let backend = ManifestBackend::new(&network_dir, 1);
    let store = FileConfigStore::in_dir(&network_dir);

    let mut orchestrator = Orchestrator::new(&backend, &backend, &backend, &store);
    orchestrator.destroy_network(name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_parsing() {
        let args = Args::parse_from([
            "netcraft",
            "create",
            "--config", "miner.json",
            "--miners", "20",
            "--genesis-delay", "5m",
            "--seed-bootnode", "/ip4/1.2.3.4/tcp/7513",
            "--seed-bootnode", "/ip4/1.2.3.5/tcp/7513",
            "--join",
        ]);

        assert_eq!(args.output, PathBuf::from("netcraft_output"));
        let Command::Create(create) = args.command else {
            panic!("expected create");
        };
        assert_eq!(create.config, PathBuf::from("miner.json"));
        assert_eq!(create.hosts, 4);
        assert_eq!(create.activation_timeout, Duration::from_secs(30));

        let overrides = create.overrides();
        assert_eq!(overrides.miners, Some(20));
        assert_eq!(overrides.genesis_delay, Some(Duration::from_secs(300)));
        assert_eq!(overrides.seed_bootnodes.len(), 2);
        assert!(overrides.join);
    }

    #[test]
    fn test_add_miner_parsing() {
        let args = Args::parse_from(["netcraft", "--output", "/tmp/nets", "add-miner", "--name", "devnet"]);
        assert_eq!(args.output, PathBuf::from("/tmp/nets"));
        let Command::AddMiner(add) = args.command else {
            panic!("expected add-miner");
        };
        assert_eq!(add.name, "devnet");
        assert_eq!(add.ordinal, None);
        assert_eq!(add.config, None);
    }

    #[test]
    fn test_delete_miner_parsing() {
        let args = Args::parse_from(["netcraft", "delete-miner", "--name", "devnet", "--ordinal", "3"]);
        assert!(matches!(
            args.command,
            Command::DeleteMiner { name, ordinal: 3 } if name == "devnet"
        ));

        // The ordinal is required
        assert!(Args::try_parse_from(["netcraft", "delete-miner", "--name", "devnet"]).is_err());
    }

    #[test]
    fn test_list_parsing() {
        let args = Args::parse_from(["netcraft", "list", "-o", "/tmp/nets"]);
        assert_eq!(args.output, PathBuf::from("/tmp/nets"));
        assert!(matches!(args.command, Command::List));
    }

    #[test]
    fn test_delete_parsing() {
        let args = Args::parse_from(["netcraft", "delete", "-n", "devnet", "--log-level", "debug"]);
        assert_eq!(args.log_level, "debug");
        assert!(matches!(args.command, Command::Delete { name } if name == "devnet"));
    }
}
