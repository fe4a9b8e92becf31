//! Layered configuration for a deployment run.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    ContractAddress, DeploymentUnit, Felt, StarkliConfig, starkaid_units,
    artifact::{DEFAULT_PACKAGE, DEFAULT_TARGET_DIR},
};

/// The default name for the starkaid configuration file.
pub const CONFIG_FILENAME: &str = "Starkaid.toml";

/// Prefix of the environment variables overriding configuration keys.
pub const ENV_PREFIX: &str = "STARKAID_";

/// The default output directory for run reports and the account file.
pub const DEFAULT_OUTDATA: &str = "deployments";

/// Environment variables read by the deployment scripts this tool replaces,
/// with the configuration key each one maps to.
const LEGACY_ENV: [(&str, &str); 3] = [
    ("RPC_ENDPOINT", "rpc_url"),
    ("DEPLOYER_ADDRESS", "account_address"),
    ("DEPLOYER_PRIVATE_KEY", "private_key"),
];

/// Starknet network the run is expected to target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::EnumString, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    Mainnet,
    Sepolia,
    /// Any other chain, identified by its chain id short string.
    #[strum(default)]
    Custom(String),
}

impl Network {
    /// The chain id the node must report for this network.
    pub fn chain_id(&self) -> Result<Felt> {
        match self {
            Network::Mainnet => Felt::from_short_string("SN_MAIN"),
            Network::Sepolia => Felt::from_short_string("SN_SEPOLIA"),
            Network::Custom(id) => Felt::from_short_string(id),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Sepolia => write!(f, "sepolia"),
            Network::Custom(id) => write!(f, "{}", id),
        }
    }
}

impl TryFrom<String> for Network {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.to_string()
    }
}

/// Where compiled contract classes are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Scarb output directory holding the compiled classes.
    pub target_dir: PathBuf,
    /// Scarb package name, used as the artifact file prefix.
    pub package: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

/// Complete configuration of a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// JSON-RPC endpoint of the Starknet node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Address of the deploying account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_address: Option<ContractAddress>,
    /// Signing key of the deploying account. Never written back to disk.
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
    /// starkli account config. Defaults to `<outdata>/account.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_file: Option<PathBuf>,
    /// Expected network, checked against the node's chain id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Path to the output data directory.
    pub outdata: PathBuf,

    pub artifacts: ArtifactsConfig,
    pub starkli: StarkliConfig,

    /// The contracts to deploy.
    pub units: Vec<DeploymentUnit>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            account_address: None,
            private_key: None,
            account_file: None,
            network: None,
            outdata: PathBuf::from(DEFAULT_OUTDATA),
            artifacts: ArtifactsConfig::default(),
            starkli: StarkliConfig::default(),
            units: starkaid_units(),
        }
    }
}

/// Values given explicitly on the command line. They override every other source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_address: Option<ContractAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdata: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactsOverrides>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl DeployConfig {
    /// Load the configuration from every source, lowest priority first:
    /// defaults, the config file, `STARKAID_*` variables, the legacy
    /// environment variables and finally `overrides`.
    ///
    /// Without an explicit `config_path`, `./Starkaid.toml` is used when present.
    pub fn load(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let figment = Self::figment(config_path)?.merge(Serialized::defaults(overrides));
        Self::extract(figment)
    }

    /// Every configuration source except command line overrides.
    pub fn figment(config_path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_path {
            Some(path) => figment = figment.merge(Toml::file(resolve_config_path(path)?)),
            None if Path::new(CONFIG_FILENAME).exists() => {
                figment = figment.merge(Toml::file(CONFIG_FILENAME))
            }
            None => {}
        }

        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(legacy_env()))
    }

    /// Extract and validate a configuration from `figment`.
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(rpc_url) = &self.rpc_url {
            let url = url::Url::parse(rpc_url)
                .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("RPC URL must use http or https: {}", rpc_url);
            }
        }

        if let Some(network) = &self.network {
            network
                .chain_id()
                .with_context(|| format!("Invalid network: {}", network))?;
        }

        Ok(())
    }

    /// The RPC URL, for commands that talk to the chain.
    pub fn require_rpc_url(&self) -> Result<&str> {
        self.rpc_url.as_deref().context(
            "No RPC URL configured (set rpc_url, STARKAID_RPC_URL, RPC_ENDPOINT or --rpc-url)",
        )
    }

    /// The deploying account, for commands that talk to the chain.
    pub fn require_account_address(&self) -> Result<ContractAddress> {
        self.account_address.context(
            "No account address configured \
             (set account_address, STARKAID_ACCOUNT_ADDRESS, DEPLOYER_ADDRESS or --account-address)",
        )
    }

    pub fn account_file_path(&self) -> PathBuf {
        self.account_file
            .clone()
            .unwrap_or_else(|| self.outdata.join("account.json"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.outdata.join(crate::REPORT_FILENAME)
    }

    /// Save the configuration to `<outdata>/Starkaid.toml`, so a run can be
    /// replayed with `--config <outdata>`.
    pub fn save_config(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.outdata)
            .with_context(|| format!("Failed to create {}", self.outdata.display()))?;
        let config_path = self.outdata.join(CONFIG_FILENAME);
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Accept either a config file or a directory containing `Starkaid.toml`.
fn resolve_config_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file or directory not found: {}",
            path.display()
        );
    }

    if path.is_dir() {
        Ok(path.join(CONFIG_FILENAME))
    } else {
        Ok(path.to_path_buf())
    }
}

fn legacy_env() -> Env {
    Env::raw()
        .only(&LEGACY_ENV.map(|(var, _)| var))
        .map(|var| {
            LEGACY_ENV
                .iter()
                .find(|(legacy, _)| var.as_str().eq_ignore_ascii_case(legacy))
                .map_or(var.as_str(), |(_, key)| *key)
                .to_string()
                .into()
        })
}
