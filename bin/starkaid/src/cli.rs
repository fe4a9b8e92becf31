use std::path::PathBuf;

use clap::{Parser, Subcommand};
use starkaid_deploy::{ArtifactsOverrides, ConfigOverrides, ContractAddress, Network};
use tracing::level_filters::LevelFilter;

/// How `starkaid report` prints the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "starkaid")]
#[command(
    author,
    version,
    about = "Declare and deploy the starkaid contracts on Starknet, in dependency order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STARKAID_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Starkaid.toml configuration file, or a directory containing one.
    ///
    /// If not provided, ./Starkaid.toml is used when it exists.
    #[arg(long, alias = "conf", env = "STARKAID_CONFIG")]
    pub config: Option<PathBuf>,

    /// The URL of the Starknet JSON-RPC endpoint.
    #[arg(long, alias = "rpc", global = true)]
    pub rpc_url: Option<String>,

    /// The address of the deploying account.
    #[arg(long, alias = "account", global = true)]
    pub account_address: Option<ContractAddress>,

    /// The private key of the deploying account.
    ///
    /// Prefer the DEPLOYER_PRIVATE_KEY or STARKAID_PRIVATE_KEY environment variables.
    #[arg(long, global = true)]
    pub private_key: Option<String>,

    /// The network the node is expected to serve: mainnet, sepolia or a chain id short string.
    #[arg(long, global = true)]
    pub network: Option<Network>,

    /// The Scarb target directory holding the compiled contracts.
    #[arg(long, global = true)]
    pub target_dir: Option<PathBuf>,

    /// The Scarb package the contracts belong to.
    #[arg(long, global = true)]
    pub package: Option<String>,

    /// The path to the output data directory.
    #[arg(long, global = true)]
    pub outdata: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy every contract of the plan (default).
    Deploy {
        /// Redeploy all contracts.
        /// If not provided, contracts recorded by the previous run against the same
        /// chain and account are reused when unchanged.
        #[arg(long, env = "STARKAID_REDEPLOY", default_value_t = false)]
        redeploy: bool,
    },
    /// Print the deployment order and constructor wiring without touching the chain.
    Plan,
    /// Print the report of the last run.
    Report {
        #[arg(long, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
    },
}

impl Cli {
    /// Flags given on the command line, to be layered over every other configuration source.
    pub fn overrides(&self) -> ConfigOverrides {
        let artifacts = (self.target_dir.is_some() || self.package.is_some()).then(|| {
            ArtifactsOverrides {
                target_dir: self.target_dir.clone(),
                package: self.package.clone(),
            }
        });

        ConfigOverrides {
            rpc_url: self.rpc_url.clone(),
            account_address: self.account_address,
            private_key: self.private_key.clone(),
            network: self.network.clone(),
            outdata: self.outdata.clone(),
            artifacts,
        }
    }
}
