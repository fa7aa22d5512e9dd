//! Deployment wave planning.
//!
//! Turns a [`NetworkSpec`] into an ordered list of waves. Every node in a
//! wave depends only on nodes from earlier waves, so the bootstrap topology
//! is a DAG by construction:
//!
//! 1. all PoETs in one wave
//! 2. the bootstrap miner (ordinal 1) alone, when self-bootstrapping
//! 3. the bootnodes, dialing the bootstrap miner or the parent's seeds
//! 4. the remaining miners in chunks of at most `C`, dialing the first `B`
//!    miners deployed so far

use log::debug;

use crate::deploy::{NodeRecord, Role};
use crate::network_spec::NetworkSpec;
use crate::orchestrator::Phase;

/// Where a wave's bootnode list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootnodeSource {
    /// Leave the document's bootnodes as they are
    Unchanged,
    /// Dial nobody
    Empty,
    /// Dial the externally supplied seeds of the parent network
    Seeds,
    /// Dial up to `limit` already deployed miners, lowest ordinal first
    Collected { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePlan {
    pub phase: Phase,
    pub role: Role,
    pub ordinals: Vec<u32>,
    pub bootnodes: BootnodeSource,
    /// Ask the node selector for a placement hint per node
    pub placed: bool,
    /// Set `p2p.swarm.bootstrap` on the nodes of this wave
    pub swarm_bootstrap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub poets: WavePlan,
    /// Miner waves in dispatch order; empty waves are never included
    pub miners: Vec<WavePlan>,
}

impl DeploymentPlan {
    /// Total number of miners across all waves
    pub fn miner_count(&self) -> usize {
        self.miners.iter().map(|wave| wave.ordinals.len()).sum()
    }
}

/// Plan the deployment waves for a network
///
/// # Arguments
/// * `spec` - A validated network spec
///
/// # Returns
/// * The PoET wave and the miner waves in dispatch order: bootstrap miner,
///   bootnodes, then the remaining miners in chunks of at most
///   `max_concurrent_deployments`
pub fn plan_waves(spec: &NetworkSpec) -> DeploymentPlan {
    let bootnodes = spec.effective_bootnodes();

    // All PoETs in a single wave
    let poets = WavePlan {
        phase: Phase::DeployingPoets,
        role: Role::Poet,
        ordinals: (1..=spec.poets).collect(),
        bootnodes: BootnodeSource::Unchanged,
        placed: false,
        swarm_bootstrap: false,
    };

    // A bootstrapped network starts from miner 1 with no peers
    let mut miners = Vec::new();
    let first_bootnode = if spec.bootstrap {
        miners.push(WavePlan {
            phase: Phase::DeployingBootstrap,
            role: Role::Miner,
            ordinals: vec![1],
            bootnodes: BootnodeSource::Empty,
            placed: true,
            swarm_bootstrap: false,
        });
        2
    } else {
        1
    };

    // Bootnodes dial the bootstrap miner, or the seeds when joining
    if bootnodes > 0 {
        miners.push(WavePlan {
            phase: Phase::DeployingBootnodes,
            role: Role::Miner,
            ordinals: (first_bootnode..first_bootnode + bootnodes).collect(),
            bootnodes: if spec.bootstrap {
                BootnodeSource::Collected { limit: 1 }
            } else {
                BootnodeSource::Seeds
            },
            placed: true,
            swarm_bootstrap: true,
        });
    }

    // Everyone else dials the bootnodes, chunked to the concurrency limit
    let remaining: Vec<u32> = (first_bootnode + bootnodes..=spec.miners).collect();
    let remaining_source = if bootnodes == 0 && !spec.bootstrap {
        BootnodeSource::Seeds
    } else {
        BootnodeSource::Collected { limit: bootnodes as usize }
    };
    let chunks = chunk_ordinals(&remaining, spec.max_concurrent_deployments as usize);
    let chunk_total = chunks.len();
    for (index, ordinals) in chunks.into_iter().enumerate() {
        miners.push(WavePlan {
            phase: Phase::DeployingRemaining { chunk: index + 1, of: chunk_total },
            role: Role::Miner,
            ordinals,
            bootnodes: remaining_source,
            placed: false,
            swarm_bootstrap: true,
        });
    }

    debug!(
        "Planned {} poet(s) and {} miner wave(s) for '{}'",
        poets.ordinals.len(),
        miners.len(),
        spec.network_name
    );
    DeploymentPlan { poets, miners }
}

/// Split ordinals into consecutive chunks of at most `size`
pub fn chunk_ordinals(ordinals: &[u32], size: usize) -> Vec<Vec<u32>> {
    ordinals.chunks(size.max(1)).map(<[u32]>::to_vec).collect()
}

/// Peer addresses of the first `limit` miners, lowest ordinal first
pub fn select_bootnodes(collected: &[NodeRecord], limit: usize) -> Vec<String> {
    let mut miners: Vec<&NodeRecord> = collected
        .iter()
        .filter(|record| record.role == Role::Miner)
        .collect();
    miners.sort_by_key(|record| record.ordinal);
    miners
        .into_iter()
        .filter_map(|record| record.peer_address.clone())
        .take(limit)
        .collect()
}

/// Resolve a wave's bootnode list, `None` meaning "leave unchanged"
pub fn resolve_bootnodes(
    source: BootnodeSource,
    collected: &[NodeRecord],
    seeds: &[String],
) -> Option<Vec<String>> {
    match source {
        BootnodeSource::Unchanged => None,
        BootnodeSource::Empty => Some(Vec::new()),
        BootnodeSource::Seeds => Some(seeds.to_vec()),
        BootnodeSource::Collected { limit } => Some(select_bootnodes(collected, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn spec(miners: u32, bootnodes: u32, concurrency: u32) -> NetworkSpec {
        NetworkSpec {
            miners,
            poets: 1,
            bootnodes,
            max_concurrent_deployments: concurrency,
            ..NetworkSpec::default()
        }
    }

    fn peer(ordinal: u32) -> String {
        format!("/ip4/10.0.0.{}/tcp/7513", ordinal)
    }

    fn record(ordinal: u32) -> NodeRecord {
        NodeRecord::miner(ordinal, peer(ordinal), format!("10.0.0.{}:9092", ordinal))
    }

    /// Walk the plan wave by wave, resolving each node's bootnodes from the
    /// miners collected so far
    fn simulate(plan: &DeploymentPlan, seeds: &[String]) -> BTreeMap<u32, Vec<String>> {
        let mut collected = Vec::new();
        let mut lists = BTreeMap::new();
        for wave in &plan.miners {
            let bootnodes = resolve_bootnodes(wave.bootnodes, &collected, seeds).unwrap_or_default();
            for &ordinal in &wave.ordinals {
                lists.insert(ordinal, bootnodes.clone());
            }
            collected.extend(wave.ordinals.iter().map(|&ordinal| record(ordinal)));
        }
        lists
    }

    #[test]
    fn test_small_bootstrap_network() {
        let plan = plan_waves(&spec(4, 2, 10));

        assert_eq!(plan.poets.ordinals, vec![1]);
        assert_eq!(plan.miners.len(), 3);

        let bootstrap = &plan.miners[0];
        assert_eq!(bootstrap.phase, Phase::DeployingBootstrap);
        assert_eq!(bootstrap.ordinals, vec![1]);
        assert_eq!(bootstrap.bootnodes, BootnodeSource::Empty);
        assert!(bootstrap.placed);

        let bootnodes = &plan.miners[1];
        assert_eq!(bootnodes.phase, Phase::DeployingBootnodes);
        assert_eq!(bootnodes.ordinals, vec![2, 3]);
        assert!(bootnodes.placed);

        let remaining = &plan.miners[2];
        assert_eq!(remaining.phase, Phase::DeployingRemaining { chunk: 1, of: 1 });
        assert_eq!(remaining.ordinals, vec![4]);
        assert!(!remaining.placed);

        let lists = simulate(&plan, &[]);
        assert!(lists[&1].is_empty());
        assert_eq!(lists[&2], vec![peer(1)]);
        assert_eq!(lists[&3], vec![peer(1)]);
        assert_eq!(lists[&4], vec![peer(1), peer(2)]);
    }

    #[test]
    fn test_remaining_miners_chunked() {
        // 26 miners, 1 bootstrap node and 2 bootnodes leave 23 remaining
        let plan = plan_waves(&spec(26, 2, 10));
        let remaining: Vec<&WavePlan> = plan
            .miners
            .iter()
            .filter(|wave| matches!(wave.phase, Phase::DeployingRemaining { .. }))
            .collect();

        let sizes: Vec<usize> = remaining.iter().map(|wave| wave.ordinals.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert_eq!(remaining[0].ordinals.first(), Some(&4));
        assert_eq!(remaining[2].ordinals.last(), Some(&26));
        assert_eq!(remaining[2].phase, Phase::DeployingRemaining { chunk: 3, of: 3 });
        assert_eq!(plan.miner_count(), 26);
    }

    #[test]
    fn test_bootnode_lists_only_reference_earlier_ordinals() {
        for miners in 2..30u32 {
            for bootnodes in 1..miners {
                let plan = plan_waves(&spec(miners, bootnodes, 4));
                assert_eq!(plan.miner_count(), miners as usize);

                for (ordinal, list) in simulate(&plan, &[]) {
                    if ordinal == 1 {
                        assert!(list.is_empty());
                        continue;
                    }
                    let expected = if ordinal > bootnodes + 1 {
                        bootnodes.min(ordinal - 1) as usize
                    } else {
                        1
                    };
                    assert_eq!(list.len(), expected, "M={} B={} k={}", miners, bootnodes, ordinal);
                    assert!(list.iter().all(|address| {
                        (1..ordinal).any(|earlier| *address == peer(earlier))
                    }));
                }
            }
        }
    }

    #[test]
    fn test_bootnodes_absorb_small_network() {
        // B is capped at M - 1, nothing left for the remaining phase
        let plan = plan_waves(&spec(3, 6, 10));
        assert_eq!(plan.miners.len(), 2);
        assert_eq!(plan.miners[1].ordinals, vec![2, 3]);
    }

    #[test]
    fn test_single_miner_network() {
        let plan = plan_waves(&spec(1, 0, 10));
        assert_eq!(plan.miners.len(), 1);
        assert_eq!(plan.miners[0].phase, Phase::DeployingBootstrap);
    }

    #[test]
    fn test_joining_network_uses_seeds() {
        let joining = NetworkSpec { bootstrap: false, ..spec(5, 2, 10) };
        let plan = plan_waves(&joining);
        assert_eq!(plan.miners.len(), 2);
        assert_eq!(plan.miners[0].ordinals, vec![1, 2]);
        assert_eq!(plan.miners[0].bootnodes, BootnodeSource::Seeds);
        assert_eq!(plan.miners[1].ordinals, vec![3, 4, 5]);

        let seeds = vec!["/ip4/1.2.3.4/tcp/7513".to_string()];
        let lists = simulate(&plan, &seeds);
        assert_eq!(lists[&1], seeds);
        assert_eq!(lists[&5], vec![peer(1), peer(2)]);
    }

    #[test]
    fn test_poet_wave_has_no_dependencies() {
        let plan = plan_waves(&NetworkSpec { poets: 3, ..spec(10, 2, 10) });
        assert_eq!(plan.poets.ordinals, vec![1, 2, 3]);
        assert_eq!(plan.poets.role, Role::Poet);
        assert_eq!(plan.poets.bootnodes, BootnodeSource::Unchanged);
    }

    #[test]
    fn test_select_bootnodes_orders_by_ordinal() {
        let collected = vec![record(3), record(1), record(2)];
        assert_eq!(select_bootnodes(&collected, 2), vec![peer(1), peer(2)]);
        assert_eq!(select_bootnodes(&collected, 10).len(), 3);
    }
}
