//! Network-wide parameter derivation.
//!
//! Computes the genesis time, PoET round timing and hare committee
//! parameters once per run, from the network size and the base miner
//! config. The current time is passed in so the derivation stays pure.

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;

use crate::error::OrchestratorError;
use crate::network_spec::NetworkSpec;
use crate::node_config::miner::{MinerConfig, LAYERS_PER_EPOCH_KEY, LAYER_DURATION_KEYS};

/// Hare committee parameters derived from the miner count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HareParameters {
    pub committee_size: u32,
    pub max_adversaries: u32,
}

impl HareParameters {
    /// `floor(M * 0.6)` members, `floor(size / 2) - 1` adversaries (never negative)
    pub fn for_miners(miners: u32) -> Self {
        let committee_size = (u64::from(miners) * 3 / 5) as u32;
        let max_adversaries = (committee_size / 2).saturating_sub(1);
        Self { committee_size, max_adversaries }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedParameters {
    /// RFC3339 genesis instant, only set when self-bootstrapping
    pub genesis_time: Option<String>,
    /// Number of miners expected at genesis, only set when self-bootstrapping
    pub genesis_active_size: Option<u32>,
    /// Epoch length in seconds, used as the PoET round duration
    pub epoch_duration_secs: u64,
    /// Initial duration in seconds for each PoET, indexed by PoET ordinal - 1
    pub poet_initial_durations: Vec<u64>,
    /// Hare overrides, only set when self-bootstrapping with hare adjustment
    pub hare: Option<HareParameters>,
}

impl DerivedParameters {
    /// Initial duration for a 1-based PoET ordinal
    pub fn poet_initial_duration(&self, ordinal: u32) -> Option<u64> {
        let index = (ordinal as usize).checked_sub(1)?;
        self.poet_initial_durations.get(index).copied()
    }
}

/// Derive the run's parameters from the spec and the base miner config.
///
/// # Arguments
///
/// * `spec` - Network spec providing the node counts and timing offsets
/// * `base` - Base miner config, must carry the layer duration and layers per epoch
/// * `now` - Reference instant the genesis delay is added to
///
/// # Returns
///
/// * The derived parameters, `ConfigFieldMissing` when a required field is
///   absent, or `ParameterOutOfRange` when a timing value cannot be represented
pub fn derive_parameters(
    spec: &NetworkSpec,
    base: &MinerConfig,
    now: DateTime<Utc>,
) -> Result<DerivedParameters, OrchestratorError> {
    // Both values must be numeric; textual durations are not accepted
    let layer_duration = base
        .main
        .layer_duration_secs()
        .ok_or_else(|| OrchestratorError::ConfigFieldMissing {
            field: format!("main.{}", LAYER_DURATION_KEYS[0]),
        })?;
    let layers_per_epoch = base
        .main
        .layers_per_epoch()
        .ok_or_else(|| OrchestratorError::ConfigFieldMissing {
            field: format!("main.{}", LAYERS_PER_EPOCH_KEY),
        })?;

    let epoch_duration_secs = (layer_duration * layers_per_epoch) as u64;

    let genesis_delay_secs = spec.genesis_delay.as_secs();
    let phase_shift_secs = spec.poet_phase_shift.as_secs();
    let poet_initial_durations = (0..u64::from(spec.poets))
        .map(|index| {
            index
                .checked_mul(phase_shift_secs)
                .and_then(|shift| shift.checked_add(genesis_delay_secs))
                .and_then(|total| total.checked_add(layer_duration as u64))
                .ok_or_else(|| out_of_range("poet_phase_shift"))
        })
        .collect::<Result<Vec<u64>, _>>()?;

    // Joining networks keep the genesis time already present in the base config
    let (genesis_time, genesis_active_size) = if spec.bootstrap {
        let genesis = i64::try_from(genesis_delay_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| out_of_range("genesis_delay"))?;
        (
            Some(genesis.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Some(spec.miners),
        )
    } else {
        (None, None)
    };

    let hare = (spec.bootstrap && spec.adjust_hare).then(|| HareParameters::for_miners(spec.miners));

    let params = DerivedParameters {
        genesis_time,
        genesis_active_size,
        epoch_duration_secs,
        poet_initial_durations,
        hare,
    };
    debug!("Derived network parameters: {:?}", params);
    Ok(params)
}

fn out_of_range(parameter: &str) -> OrchestratorError {
    OrchestratorError::ParameterOutOfRange { parameter: parameter.to_string() }
}
