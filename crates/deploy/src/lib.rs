//! starkaid-deploy - Deployment library for the starkaid Starknet contracts.
//!
//! This crate resolves the contract dependency graph into a deployment plan,
//! then declares and deploys each contract in order, feeding the addresses of
//! earlier contracts into the constructors of later ones.

mod felt;
pub use felt::{ClassHash, ContractAddress, Felt, Salt};

mod graph;
pub use graph::{ConstructorArg, DeploymentUnit, starkaid_units};

mod plan;
pub use plan::{DeploymentPlan, PlanError};

mod registry;
pub use registry::DeployedRegistry;

pub mod artifact;
pub use artifact::{AbiInput, ArtifactLoader, ContractAbi, ContractArtifact, ScarbArtifactLoader};

mod payload;
pub use payload::ConstructorPayload;

mod chain;
pub use chain::{ChainClient, DeployedContract};

pub mod rpc;

mod starkli;
pub use starkli::{DEFAULT_STARKLI_BINARY, StarkliClient, StarkliCmdBuilder, StarkliConfig};

mod report;
pub use report::{FailureKind, REPORT_FILENAME, RunReport, RunStatus, UnitOutcome, UnitReport};

mod fingerprint;
pub use fingerprint::{RunFingerprint, unit_digest};

mod reporter;
pub use reporter::{Reporter, TracingReporter, summary_table};

mod orchestrator;
pub use orchestrator::{Orchestrator, RunState};

mod config;
pub use config::{
    ArtifactsConfig, ArtifactsOverrides, CONFIG_FILENAME, ConfigOverrides, DEFAULT_OUTDATA,
    DeployConfig, ENV_PREFIX, Network,
};

mod deployer;
pub use deployer::Deployer;
