//! Per-unit results of a deployment run and their persisted form.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ClassHash, ContractAddress, Salt};

/// The default name of the persisted run report inside the output directory.
pub const REPORT_FILENAME: &str = "deployments.json";

/// Which step of a unit's deployment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailureKind {
    /// The compiled artifact could not be loaded.
    Load,
    /// The constructor payload could not be built from the ABI and registry.
    Payload,
    /// The chain rejected or failed the declare/deploy.
    Deploy,
}

/// Outcome of a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum UnitOutcome {
    /// Freshly declared and deployed in this run.
    Deployed {
        address: ContractAddress,
        class_hash: ClassHash,
        salt: Salt,
        digest: String,
    },
    /// Taken over from a previous run without touching the chain.
    Reused {
        address: ContractAddress,
        digest: String,
    },
    Failed { kind: FailureKind, reason: String },
}

/// Result of one unit, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

impl UnitReport {
    pub fn address(&self) -> Option<ContractAddress> {
        match &self.outcome {
            UnitOutcome::Deployed { address, .. } | UnitOutcome::Reused { address, .. } => {
                Some(*address)
            }
            UnitOutcome::Failed { .. } => None,
        }
    }

    pub fn digest(&self) -> Option<&str> {
        match &self.outcome {
            UnitOutcome::Deployed { digest, .. } | UnitOutcome::Reused { digest, .. } => {
                Some(digest.as_str())
            }
            UnitOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, UnitOutcome::Failed { .. })
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RunStatus {
    /// Every unit in the plan succeeded.
    Completed,
    /// The run stopped at `unit`; later units were never attempted.
    Halted { unit: String, kind: FailureKind },
}

/// Everything an operator needs to know about a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Fingerprint of the deployment target the run was made against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Attempted units, in plan order.
    pub units: Vec<UnitReport>,
    /// Units never attempted because the run halted first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,
    /// Successes recorded by earlier runs for units this run never got to deploy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carried_over: Vec<UnitReport>,
}

impl RunReport {
    /// Whether the run deployed or reused every unit.
    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed && self.units.iter().all(UnitReport::is_success)
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|report| report.unit == name)
    }

    /// Address of `name` if it succeeded in this run.
    pub fn address_of(&self, name: &str) -> Option<ContractAddress> {
        self.unit(name).and_then(UnitReport::address)
    }

    /// The unit the run halted at, with the failure.
    pub fn failure(&self) -> Option<(&str, FailureKind, &str)> {
        self.units.iter().find_map(|report| match &report.outcome {
            UnitOutcome::Failed { kind, reason } => {
                Some((report.unit.as_str(), *kind, reason.as_str()))
            }
            _ => None,
        })
    }

    /// The latest confirmed result for `name`, from this run or carried over from earlier ones.
    pub fn recorded(&self, name: &str) -> Option<&UnitReport> {
        self.units
            .iter()
            .chain(&self.carried_over)
            .find(|report| report.unit == name && report.is_success())
    }

    /// Keep `prior`'s confirmed results for the units this run left untouched:
    /// the ones never attempted and the one whose artifact could not be loaded.
    pub fn carry_forward(&mut self, prior: &RunReport) {
        let load_failure = self
            .failure()
            .filter(|(_, kind, _)| *kind == FailureKind::Load)
            .map(|(unit, _, _)| unit.to_string());

        self.carried_over = self
            .not_attempted
            .iter()
            .cloned()
            .chain(load_failure)
            .filter_map(|unit| prior.recorded(&unit).cloned())
            .collect();
    }

    pub fn successes(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|report| report.is_success())
    }

    /// Save the report as pretty JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Run report saved");
        Ok(())
    }

    /// Load a report written by [`RunReport::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Run report does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run report from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse run report JSON")
    }
}
