use std::path::Path;

use anyhow::{Context, Result};

use crate::{
    DeployConfig, DeploymentPlan, Orchestrator, RunFingerprint, RunReport, ScarbArtifactLoader,
    StarkliClient, TracingReporter,
};

/// Main deployer that wires the configuration to a real chain and runs the plan.
pub struct Deployer {
    pub config: DeployConfig,
}

impl Deployer {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Resolve the configured units into an execution order.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        DeploymentPlan::build(self.config.units.clone()).context("Invalid deployment graph")
    }

    /// Deploy every unit of the plan and persist the run report.
    ///
    /// Units recorded by a previous run against the same target are reused
    /// when unchanged, unless `redeploy` is set.
    pub async fn deploy(self, redeploy: bool) -> Result<RunReport> {
        tracing::info!("Starting deployment process...");

        let plan = self.plan()?;
        let rpc_url = self.config.require_rpc_url()?;
        let account_address = self.config.require_account_address()?;

        let client = StarkliClient::new(
            self.config.starkli.clone(),
            rpc_url,
            self.config.account_file_path(),
            self.config.private_key.clone(),
        )?;

        let chain_id = client
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach Starknet node at {}", rpc_url))?;
        tracing::info!(%chain_id, rpc_url, "Connected to Starknet node");

        if let Some(network) = &self.config.network {
            let expected = network.chain_id()?;
            if expected != chain_id {
                anyhow::bail!(
                    "Node at {} reports chain id {}, expected {} for network {}",
                    rpc_url,
                    chain_id,
                    expected,
                    network
                );
            }
        }

        client.ensure_account(account_address).await?;
        self.config.save_config()?;

        let fingerprint = RunFingerprint {
            chain_id,
            account_address,
            package: self.config.artifacts.package.clone(),
        }
        .compute_hash();

        let report_path = self.config.report_path();
        let prior = if redeploy {
            tracing::info!("Redeploy requested, ignoring previous deployments");
            None
        } else {
            load_prior(&report_path, &fingerprint)
        };

        let loader = ScarbArtifactLoader::new(
            &self.config.artifacts.target_dir,
            &self.config.artifacts.package,
        );
        let mut orchestrator = Orchestrator::new(loader, client, TracingReporter);
        if let Some(prior) = prior {
            orchestrator = orchestrator.with_prior(prior);
        }

        let mut report = orchestrator.run(&plan).await;
        report.fingerprint = Some(fingerprint);
        report.save_to_file(&report_path)?;

        Ok(report)
    }
}

/// The previous run's report, if it was made against the same target.
fn load_prior(path: &Path, fingerprint: &str) -> Option<RunReport> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No previous run report");
        return None;
    }

    let report = match RunReport::load_from_file(path) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{:#}", err),
                "Ignoring unreadable run report"
            );
            return None;
        }
    };

    if report.fingerprint.as_deref() != Some(fingerprint) {
        tracing::info!(
            path = %path.display(),
            "Previous run targeted another chain or account, deploying from scratch"
        );
        return None;
    }

    tracing::info!(
        path = %path.display(),
        units = report.successes().count(),
        "Found previous deployments"
    );
    Some(report)
}
