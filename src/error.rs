//! Error types shared by the orchestrator and its collaborators.

use crate::deploy::Role;
use crate::network_spec::ValidationError;
use crate::orchestrator::Phase;

/// Failure reported by an external collaborator (provisioner, deployer,
/// activator or config store)
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Deployment cancelled after a sibling failed")]
    Cancelled,
    /// The ordinal does not fit in the role's address block
    #[error("No address left for {role}-{ordinal}")]
    AddressSpaceExhausted { role: Role, ordinal: u32 },
}

/// Errors surfaced by a network operation.
///
/// None of these are retried; the operation stops at the first one and
/// resources created before it are left in place.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    InvalidSpec(#[from] ValidationError),
    // Raised before anything is provisioned
    #[error("Required numeric field '{field}' is missing from the base config")]
    ConfigFieldMissing { field: String },
    #[error("Network parameter '{parameter}' is out of range")]
    ParameterOutOfRange { parameter: String },
    #[error("Failed to provision cluster '{network}': {source}")]
    ProvisioningFailed {
        network: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to tear down network '{network}': {source}")]
    TeardownFailed {
        network: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to deploy {role}-{ordinal} while {phase}: {source}")]
    DeploymentFailed {
        role: Role,
        ordinal: u32,
        phase: Phase,
        #[source]
        source: BackendError,
    },
    #[error("Failed to remove {role}-{ordinal}: {source}")]
    RemovalFailed {
        role: Role,
        ordinal: u32,
        #[source]
        source: BackendError,
    },
    #[error("Failed to activate poet-{ordinal}: {source}")]
    ActivationFailed {
        ordinal: u32,
        #[source]
        source: BackendError,
    },
    // Every node is already up at this point
    #[error("Failed to persist the network config (all nodes are still running): {source}")]
    PersistenceFailed {
        #[source]
        source: BackendError,
    },
    #[error("Failed to read the network config: {source}")]
    ConfigUnavailable {
        #[source]
        source: BackendError,
    },
    #[error("Failed to start deployment workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl OrchestratorError {
    /// Ordinal of the node the error refers to, if any
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            Self::DeploymentFailed { ordinal, .. }
            | Self::RemovalFailed { ordinal, .. }
            | Self::ActivationFailed { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }
}
