//! Chain client driving the starkli CLI.

mod cmd;

use std::{path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use cmd::StarkliCmdBuilder;

use crate::{
    ChainClient, ClassHash, ConstructorPayload, ContractAddress, ContractArtifact,
    DeployedContract, Felt, Salt, rpc,
};

/// Default starkli executable, resolved through `PATH`.
pub const DEFAULT_STARKLI_BINARY: &str = "starkli";

/// Configuration for the starkli client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarkliConfig {
    /// Path or name of the starkli executable.
    pub binary: PathBuf,
    /// Wait for each transaction to be confirmed.
    pub watch: bool,
    /// Extra arguments appended to every declare/deploy command.
    pub extra_args: Vec<String>,
}

impl Default for StarkliConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_STARKLI_BINARY),
            watch: true,
            extra_args: Vec::new(),
        }
    }
}

/// Declares and deploys classes with starkli, and queries the node directly
/// over JSON-RPC for read-only checks.
pub struct StarkliClient {
    config: StarkliConfig,
    rpc_url: String,
    account_file: PathBuf,
    private_key: Option<String>,
    http: reqwest::Client,
}

impl StarkliClient {
    pub fn new(
        config: StarkliConfig,
        rpc_url: impl Into<String>,
        account_file: impl Into<PathBuf>,
        private_key: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            rpc_url: rpc_url.into(),
            account_file: account_file.into(),
            private_key,
            http: rpc::create_client()?,
        })
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<Felt> {
        rpc::chain_id(&self.http, &self.rpc_url).await
    }

    /// Make sure the starkli account config exists, fetching it from the chain if needed.
    pub async fn ensure_account(&self, address: ContractAddress) -> Result<()> {
        if self.account_file.exists() {
            tracing::debug!(path = %self.account_file.display(), "Using existing account file");
            return Ok(());
        }

        if let Some(parent) = self.account_file.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create directory for the account file")?;
        }

        tracing::info!(
            %address,
            path = %self.account_file.display(),
            "Fetching account config..."
        );

        let args = vec![
            "account".to_string(),
            "fetch".to_string(),
            "--rpc".to_string(),
            self.rpc_url.clone(),
            "--output".to_string(),
            self.account_file.display().to_string(),
            address.to_string(),
        ];
        self.run(args)
            .await
            .with_context(|| format!("Failed to fetch account config for {}", address))?;

        Ok(())
    }

    /// Run starkli with `args`, returning its stdout.
    async fn run(&self, args: Vec<String>) -> Result<String> {
        let subcommand = args.first().cloned().unwrap_or_default();
        tracing::debug!(binary = %self.config.binary.display(), ?args, "Running starkli");

        let mut command = tokio::process::Command::new(&self.config.binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(private_key) = &self.private_key {
            command.env("STARKNET_PRIVATE_KEY", private_key);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "starkli {} exited with {}: {}",
                subcommand,
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn declare(&self, artifact: &ContractArtifact) -> Result<ClassHash> {
        let args = StarkliCmdBuilder::declare(&artifact.sierra_path)
            .rpc(&self.rpc_url)
            .account(&self.account_file)
            .casm_file(&artifact.casm_path)
            .watch(self.config.watch)
            .extra_args(self.config.extra_args.iter().cloned())
            .build();

        let stdout = self.run(args).await?;
        let class_hash =
            ClassHash::from(last_felt(&stdout).context("No class hash in starkli output")?);

        tracing::info!(artifact = %artifact.name, %class_hash, "Class declared");
        Ok(class_hash)
    }

    async fn deploy(
        &self,
        class_hash: ClassHash,
        payload: &ConstructorPayload,
        salt: Salt,
    ) -> Result<ContractAddress> {
        let args = StarkliCmdBuilder::deploy(class_hash)
            .rpc(&self.rpc_url)
            .account(&self.account_file)
            .salt(salt)
            .watch(self.config.watch)
            .extra_args(self.config.extra_args.iter().cloned())
            .ctor_args(payload.calldata())
            .build();

        let stdout = self.run(args).await?;
        let felt = last_felt(&stdout).context("No contract address in starkli output")?;
        Ok(ContractAddress::from(felt))
    }
}

impl ChainClient for StarkliClient {
    async fn declare_and_deploy(
        &self,
        artifact: &ContractArtifact,
        payload: &ConstructorPayload,
        salt: Salt,
    ) -> Result<DeployedContract> {
        let class_hash = self
            .declare(artifact)
            .await
            .with_context(|| format!("Failed to declare {}", artifact.name))?;

        let address = self
            .deploy(class_hash, payload, salt)
            .await
            .with_context(|| format!("Failed to deploy {} ({})", artifact.name, class_hash))?;

        Ok(DeployedContract {
            address,
            class_hash,
        })
    }

    async fn is_deployed(&self, address: ContractAddress) -> Result<bool> {
        let class_hash = rpc::class_hash_at(&self.http, &self.rpc_url, address).await?;
        Ok(class_hash.is_some())
    }
}

/// The last hex field element printed in `output`.
///
/// starkli prints progress messages around the value it returns, so the value
/// is taken from the end.
fn last_felt(output: &str) -> Option<Felt> {
    output
        .split_whitespace()
        .rev()
        .filter(|token| token.starts_with("0x"))
        .find_map(|token| token.trim_end_matches(['.', ',']).parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_felt_plain_output() {
        let felt = last_felt("0x03ad36f5a64f9c119b84c9251b9f4c7fc399b0a626a8034e0881842cbb9728bf\n");
        assert_eq!(
            felt.unwrap().to_string(),
            "0x3ad36f5a64f9c119b84c9251b9f4c7fc399b0a626a8034e0881842cbb9728bf"
        );
    }

    #[test]
    fn test_last_felt_with_surrounding_messages() {
        let output = "Declaring Cairo 1 class: 0x1111\n\
                      Contract declaration transaction: 0x2222\n\
                      Class hash declared:\n\
                      0x3333\n";
        assert_eq!(last_felt(output), Some(Felt::from(0x3333u64)));
    }

    #[test]
    fn test_last_felt_none_without_hex() {
        assert_eq!(last_felt("nothing to see here"), None);
        assert_eq!(last_felt(""), None);
    }

    #[test]
    fn test_default_config() {
        let config = StarkliConfig::default();
        assert_eq!(config.binary, PathBuf::from("starkli"));
        assert!(config.watch);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let client = StarkliClient::new(
            StarkliConfig {
                binary: PathBuf::from("/nonexistent/starkli"),
                ..Default::default()
            },
            "http://127.0.0.1:1",
            "/nonexistent/account.json",
            None,
        )
        .unwrap();

        let err = client.run(vec!["--version".to_string()]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/starkli"));
    }
}
