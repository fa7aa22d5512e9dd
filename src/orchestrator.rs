//! Network orchestrator.
//!
//! Sequences the phases of a network deployment: provision the cluster,
//! deploy PoETs, deploy miners wave by wave, activate the PoETs and persist
//! the final config. Every phase either completes fully or fails the run;
//! there is no retry and no rollback, so nodes deployed before a failure
//! stay up.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::fmt;

use crate::deploy::{
    ClusterProvisioner, DeployRequest, NodeConfig, NodeDeployer, NodeRecord, NodeSelector,
    PoetActivator, Role,
};
use crate::error::{BackendError, OrchestratorError};
use crate::executor::{CancelToken, WaveExecutor};
use crate::network_spec::{NetworkSpec, ValidationError};
use crate::node_config::{MinerConfig, PoetConfig};
use crate::params::{derive_parameters, DerivedParameters};
use crate::registry::NetworkRegistry;
use crate::store::ConfigStore;
use crate::topology::{plan_waves, resolve_bootnodes, PoetAssignment, RoundRobin, WavePlan};

/// Orchestrator state. Transitions only move forward; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ProvisioningCluster,
    DeployingPoets,
    DeployingBootstrap,
    DeployingBootnodes,
    DeployingRemaining { chunk: usize, of: usize },
    ActivatingPoets,
    PersistingConfig,
    AddingMiner,
    DeletingMiner,
    DestroyingNetwork,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::ProvisioningCluster => f.write_str("provisioning the cluster"),
            Phase::DeployingPoets => f.write_str("deploying poets"),
            Phase::DeployingBootstrap => f.write_str("deploying the bootstrap miner"),
            Phase::DeployingBootnodes => f.write_str("deploying bootnodes"),
            Phase::DeployingRemaining { chunk, of } => {
                write!(f, "deploying remaining miners (wave {} of {})", chunk, of)
            }
            Phase::ActivatingPoets => f.write_str("activating poets"),
            Phase::PersistingConfig => f.write_str("persisting the network config"),
            Phase::AddingMiner => f.write_str("adding a miner"),
            Phase::DeletingMiner => f.write_str("deleting a miner"),
            Phase::DestroyingNetwork => f.write_str("destroying the network"),
            Phase::Done => f.write_str("done"),
            Phase::Failed => f.write_str("failed"),
        }
    }
}

/// Drives network operations against a set of collaborators
pub struct Orchestrator<'a> {
    provisioner: &'a dyn ClusterProvisioner,
    deployer: &'a dyn NodeDeployer,
    activator: &'a dyn PoetActivator,
    store: &'a dyn ConfigStore,
    phase: Phase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        provisioner: &'a dyn ClusterProvisioner,
        deployer: &'a dyn NodeDeployer,
        activator: &'a dyn PoetActivator,
        store: &'a dyn ConfigStore,
    ) -> Self {
        Self {
            provisioner,
            deployer,
            activator,
            store,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Deploy a complete network.
    ///
    /// # Arguments
    /// * `spec` - Sizes, timing and topology of the network
    /// * `base` - Miner config every node's config is derived from
    ///
    /// # Returns
    /// * The registry of deployed nodes once every PoET is active and the
    ///   final config is persisted
    pub fn create_network(
        &mut self,
        spec: &NetworkSpec,
        base: &MinerConfig,
    ) -> Result<NetworkRegistry, OrchestratorError> {
        let result = self.run_create(spec, base);
        self.finish(&spec.network_name, result)
    }

    /// Deploy one extra miner into a running network.
    ///
    /// # Arguments
    /// * `network_name` - Network the miner joins, used for logging
    /// * `ordinal` - Ordinal of the new miner
    /// * `config` - Config to deploy with; `None` reads the one persisted
    ///   by `create_network`
    pub fn add_miner(
        &mut self,
        network_name: &str,
        ordinal: u32,
        config: Option<MinerConfig>,
    ) -> Result<NodeRecord, OrchestratorError> {
        let result = self.run_add_miner(ordinal, config);
        self.finish(network_name, result)
    }

    /// Remove a single miner from a running network.
    ///
    /// The persisted config and the other nodes are left untouched, so the
    /// ordinal can be reused by a later `add_miner`.
    pub fn delete_miner(&mut self, network_name: &str, ordinal: u32) -> Result<(), OrchestratorError> {
        self.enter(Phase::DeletingMiner);
        info!("Deleting miner-{} from '{}'", ordinal, network_name);
        let result = self
            .deployer
            .remove(Role::Miner, ordinal)
            .map_err(|source| OrchestratorError::RemovalFailed {
                role: Role::Miner,
                ordinal,
                source,
            });
        self.finish(network_name, result)
    }

    /// Tear the network's cluster down
    pub fn destroy_network(&mut self, network_name: &str) -> Result<(), OrchestratorError> {
        self.enter(Phase::DestroyingNetwork);
        let result = self
            .provisioner
            .destroy(network_name)
            .map_err(|source| OrchestratorError::TeardownFailed {
                network: network_name.to_string(),
                source,
            });
        self.finish(network_name, result)
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn finish<T>(
        &mut self,
        network_name: &str,
        result: Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        match &result {
            Ok(_) => self.enter(Phase::Done),
            Err(err) => {
                error!("Network '{}' failed while {}: {}", network_name, self.phase, err);
                self.phase = Phase::Failed;
            }
        }
        result
    }

    fn run_create(
        &mut self,
        spec: &NetworkSpec,
        base: &MinerConfig,
    ) -> Result<NetworkRegistry, OrchestratorError> {
        // Everything that can be rejected is checked before provisioning
        spec.validate()?;
        let seeds = if spec.seed_bootnodes.is_empty() {
            base.bootnodes().to_vec()
        } else {
            spec.seed_bootnodes.clone()
        };
        if !spec.bootstrap && seeds.is_empty() {
            return Err(ValidationError::InvalidTopology(
                "joining an existing network requires seed bootnodes".to_string(),
            )
            .into());
        }
        if spec.effective_bootnodes() < spec.bootnodes {
            warn!(
                "Requested {} bootnodes but only {} miner(s) can serve as bootnodes",
                spec.bootnodes,
                spec.effective_bootnodes()
            );
        }
        if spec.effective_gateways() < spec.poet_gateways {
            warn!(
                "Requested {} poet gateways, using {} (one per miner)",
                spec.poet_gateways,
                spec.effective_gateways()
            );
        }

        // Derive timing, then stamp it on the base config once for all miners
        let params = derive_parameters(spec, base, Utc::now())?;
        let plan = plan_waves(spec);
        let base = base.with_parameters(&params);
        info!(
            "Creating network '{}': {} miners, {} poets, {} bootnodes, {} miner wave(s)",
            spec.network_name,
            spec.miners,
            spec.poets,
            spec.effective_bootnodes(),
            plan.miners.len()
        );

        // Provision the cluster
        self.enter(Phase::ProvisioningCluster);
        let cluster = self
            .provisioner
            .provision(spec)
            .map_err(|source| OrchestratorError::ProvisioningFailed {
                network: spec.network_name.clone(),
                source,
            })?;
        let hosts = RoundRobin::new(cluster.placement_hints());
        let selector: &dyn NodeSelector = &hosts;
        let executor = WaveExecutor::new(spec.max_concurrent_deployments as usize)
            .cancel_on_error(spec.cancel_on_error);

        // PoETs go first; miners need their endpoints
        self.enter(plan.poets.phase);
        let poets = self.dispatch(&executor, plan.poets.phase, poet_requests(&plan.poets, &params))?;
        let poet_endpoints = poets
            .iter()
            .map(|poet| {
                poet.rest_endpoint.clone().ok_or_else(|| OrchestratorError::DeploymentFailed {
                    role: Role::Poet,
                    ordinal: poet.ordinal,
                    phase: plan.poets.phase,
                    source: BackendError::NotFound(format!("REST endpoint of poet-{}", poet.ordinal)),
                })
            })
            .collect::<Result<Vec<String>, _>>()?;
        let assignment = PoetAssignment::new(poet_endpoints.clone());

        let mut miners: Vec<NodeRecord> = Vec::with_capacity(spec.miners as usize);
        let mut last_applied = base.clone();
        // Miner waves run strictly in order; each sees the records of the ones before
        for wave in &plan.miners {
            self.enter(wave.phase);
            let mut template = match resolve_bootnodes(wave.bootnodes, &miners, &seeds) {
                Some(bootnodes) => base.with_bootnodes(bootnodes),
                None => base.clone(),
            };
            if wave.swarm_bootstrap {
                template = template.with_bootstrap_flag(true);
            }

            // Per-node snapshot: the wave template plus the miner's PoET
            let requests: Vec<DeployRequest> = wave
                .ordinals
                .iter()
                .map(|&ordinal| {
                    let config = match assignment.endpoint_for(ordinal) {
                        Some(endpoint) => template.with_poet_server(endpoint),
                        None => template.clone(),
                    };
                    let placement = if wave.placed { selector.next() } else { None };
                    DeployRequest::miner(ordinal, config, placement)
                })
                .collect();
            // The highest ordinal of the last wave ends up persisted
            if let Some(DeployRequest { config: NodeConfig::Miner(config), .. }) = requests.last() {
                last_applied = config.clone();
            }

            let records = self.dispatch(&executor, wave.phase, requests)?;
            miners.extend(records);
        }
        miners.sort_by_key(|record| record.ordinal);

        // Activate every PoET against the lowest-ordinal miners
        self.enter(Phase::ActivatingPoets);
        let gateways: Vec<String> = miners
            .iter()
            .filter_map(|miner| miner.api_endpoint.clone())
            .take(spec.effective_gateways() as usize)
            .collect();
        for (poet, endpoint) in poets.iter().zip(&poet_endpoints) {
            info!("Activating poet-{} at {} with {} gateway(s)", poet.ordinal, endpoint, gateways.len());
            self.activator
                .activate(endpoint, &gateways)
                .map_err(|source| OrchestratorError::ActivationFailed { ordinal: poet.ordinal, source })?;
        }

        // Persist exactly once, after the network is fully up
        self.enter(Phase::PersistingConfig);
        self.store
            .write(&last_applied)
            .map_err(|source| OrchestratorError::PersistenceFailed { source })?;

        info!(
            "Network '{}' is up: {} miners, {} poets",
            spec.network_name,
            miners.len(),
            poets.len()
        );
        Ok(NetworkRegistry::from_records(
            &spec.network_name,
            last_applied.main.genesis_time.clone(),
            &miners,
            &poets,
            gateways,
        ))
    }

    fn run_add_miner(
        &mut self,
        ordinal: u32,
        config: Option<MinerConfig>,
    ) -> Result<NodeRecord, OrchestratorError> {
        self.enter(Phase::AddingMiner);
        // An explicit config wins over the persisted one
        let config = match config {
            Some(config) => config,
            None => self
                .store
                .read()
                .map_err(|source| OrchestratorError::ConfigUnavailable { source })?,
        };
        let request = DeployRequest::miner(ordinal, config, None);
        info!("Adding {}", request.node_name());
        let record = self
            .deployer
            .deploy(&request, &CancelToken::new())
            .map_err(|source| OrchestratorError::DeploymentFailed {
                role: request.role,
                ordinal,
                phase: Phase::AddingMiner,
                source,
            })?;
        Ok(record)
    }

    /// Run one wave and return its records in ordinal order
    fn dispatch(
        &self,
        executor: &WaveExecutor,
        phase: Phase,
        requests: Vec<DeployRequest>,
    ) -> Result<Vec<NodeRecord>, OrchestratorError> {
        info!("Dispatching {} node(s) while {}", requests.len(), phase);
        let deployer = self.deployer;
        executor.execute(requests, |request, cancel| {
            debug!("Deploying {} (placement: {:?})", request.node_name(), request.placement);
            deployer
                .deploy(&request, cancel)
                .map_err(|source| OrchestratorError::DeploymentFailed {
                    role: request.role,
                    ordinal: request.ordinal,
                    phase,
                    source,
                })
        })
    }
}

fn poet_requests(wave: &WavePlan, params: &DerivedParameters) -> Vec<DeployRequest> {
    wave.ordinals
        .iter()
        .map(|&ordinal| {
            let initial = params.poet_initial_duration(ordinal).unwrap_or_default();
            DeployRequest::poet(ordinal, PoetConfig::new(initial, params.epoch_duration_secs))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::DeployingBootnodes.to_string(), "deploying bootnodes");
        assert_eq!(
            Phase::DeployingRemaining { chunk: 2, of: 3 }.to_string(),
            "deploying remaining miners (wave 2 of 3)"
        );
    }

    #[test]
    fn test_poet_requests_carry_timing() {
        let params = DerivedParameters {
            genesis_time: None,
            genesis_active_size: None,
            epoch_duration_secs: 90,
            poet_initial_durations: vec![630, 650],
            hare: None,
        };
        let plan = plan_waves(&NetworkSpec { poets: 2, ..NetworkSpec::default() });
        let requests = poet_requests(&plan.poets, &params);

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].node_name(), "poet-2");
        assert_eq!(requests[1].config, NodeConfig::Poet(PoetConfig::new(650, 90)));
    }
}
