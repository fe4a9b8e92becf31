//! Sequential execution of a deployment plan.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;

use crate::{
    ArtifactLoader, ChainClient, ConstructorPayload, ContractAddress, ContractArtifact,
    DeployedContract, DeployedRegistry, DeploymentPlan, DeploymentUnit, FailureKind, Reporter,
    RunReport, RunStatus, Salt, UnitOutcome, UnitReport, unit_digest,
};

/// Attempts at drawing a salt not yet used in the current run.
const MAX_SALT_ATTEMPTS: usize = 8;

/// Lifecycle of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Halted { unit: String, reason: String },
}

/// Deploys the units of a plan one after the other.
///
/// Each unit's constructor is fed the addresses produced earlier in the same
/// run. The first failure halts the run: nothing is rolled back and nothing
/// after the failing unit is attempted.
pub struct Orchestrator<L, C, R> {
    loader: L,
    client: C,
    reporter: R,
    prior: Option<RunReport>,
    state: RunState,
}

/// Per-run bookkeeping, dropped when the run ends.
#[derive(Default)]
struct Run {
    registry: DeployedRegistry,
    used_salts: HashSet<Salt>,
    /// Units whose address was taken over from the prior report.
    reused: HashSet<String>,
    units: Vec<UnitReport>,
}

/// Why a unit failed, before it is turned into a report entry.
struct StepFailure {
    kind: FailureKind,
    error: anyhow::Error,
}

impl StepFailure {
    fn new(kind: FailureKind, error: anyhow::Error) -> Self {
        Self { kind, error }
    }
}

impl<L, C, R> Orchestrator<L, C, R>
where
    L: ArtifactLoader,
    C: ChainClient,
    R: Reporter,
{
    pub fn new(loader: L, client: C, reporter: R) -> Self {
        Self {
            loader,
            client,
            reporter,
            prior: None,
            state: RunState::NotStarted,
        }
    }

    /// Reuse units that `prior` already deployed, when they are provably unchanged.
    pub fn with_prior(mut self, prior: RunReport) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Execute `plan` and report what happened to every unit.
    pub async fn run(&mut self, plan: &DeploymentPlan) -> RunReport {
        let started_at = Utc::now();
        self.state = RunState::Running;
        tracing::info!(units = plan.len(), "Starting deployment run...");

        let mut run = Run::default();
        let mut halted = None;

        for (position, unit) in plan.units().iter().enumerate() {
            tracing::info!(
                unit = %unit.name,
                step = position + 1,
                total = plan.len(),
                "Deploying unit..."
            );

            match self.step(unit, &mut run).await {
                Ok(outcome) => run.units.push(UnitReport {
                    unit: unit.name.clone(),
                    outcome,
                }),
                Err(failure) => {
                    let reason = format!("{:#}", failure.error);
                    self.reporter.unit_failed(&unit.name, &reason);
                    run.units.push(UnitReport {
                        unit: unit.name.clone(),
                        outcome: UnitOutcome::Failed {
                            kind: failure.kind,
                            reason: reason.clone(),
                        },
                    });
                    halted = Some((position, failure.kind, reason));
                    break;
                }
            }
        }

        let (status, not_attempted) = match halted {
            None => {
                self.state = RunState::Completed;
                (RunStatus::Completed, Vec::new())
            }
            Some((position, kind, reason)) => {
                let unit = plan.units()[position].name.clone();
                self.state = RunState::Halted {
                    unit: unit.clone(),
                    reason,
                };
                let not_attempted = plan.names().skip(position + 1).map(String::from).collect();
                (RunStatus::Halted { unit, kind }, not_attempted)
            }
        };

        let mut report = RunReport {
            fingerprint: None,
            started_at,
            finished_at: Utc::now(),
            status,
            units: run.units,
            not_attempted,
            carried_over: Vec::new(),
        };
        if let Some(prior) = &self.prior {
            report.carry_forward(prior);
        }

        self.reporter.run_finished(&report);
        report
    }

    /// Deploy (or reuse) one unit and register its address.
    async fn step(
        &self,
        unit: &DeploymentUnit,
        run: &mut Run,
    ) -> Result<UnitOutcome, StepFailure> {
        let artifact = self
            .loader
            .load(&unit.name)
            .map_err(|err| StepFailure::new(FailureKind::Load, err))?;
        let digest = unit_digest(unit, &artifact);

        if let Some(address) = self.reusable_address(unit, &digest, run).await? {
            register(run, unit, address)?;
            run.reused.insert(unit.name.clone());
            self.reporter.unit_reused(&unit.name, address);
            return Ok(UnitOutcome::Reused { address, digest });
        }

        let payload = ConstructorPayload::build(unit, &artifact.abi, &run.registry)
            .map_err(|err| StepFailure::new(FailureKind::Payload, err))?;
        let salt = self
            .fresh_salt(&mut run.used_salts)
            .map_err(|err| StepFailure::new(FailureKind::Deploy, err))?;

        let deployed = self.deploy(unit, &artifact, &payload, salt).await?;
        register(run, unit, deployed.address)?;
        self.reporter.unit_deployed(&unit.name, deployed.address);

        Ok(UnitOutcome::Deployed {
            address: deployed.address,
            class_hash: deployed.class_hash,
            salt,
            digest,
        })
    }

    async fn deploy(
        &self,
        unit: &DeploymentUnit,
        artifact: &ContractArtifact,
        payload: &ConstructorPayload,
        salt: Salt,
    ) -> Result<DeployedContract, StepFailure> {
        tracing::debug!(
            unit = %unit.name,
            artifact = %artifact.name,
            %payload,
            %salt,
            "Declaring and deploying"
        );

        self.client
            .declare_and_deploy(artifact, payload, salt)
            .await
            .map_err(|err| {
                StepFailure::new(
                    FailureKind::Deploy,
                    err.context(format!("Failed to declare and deploy {}", unit.name)),
                )
            })
    }

    /// Draw a salt that has not been used earlier in this run.
    fn fresh_salt(&self, used: &mut HashSet<Salt>) -> Result<Salt> {
        for _ in 0..MAX_SALT_ATTEMPTS {
            let salt = self.client.generate_salt();
            if used.insert(salt) {
                return Ok(salt);
            }
            tracing::warn!(%salt, "Salt already used in this run, drawing another one");
        }
        anyhow::bail!(
            "Salt source returned only used salts after {} attempts",
            MAX_SALT_ATTEMPTS
        )
    }

    /// Address recorded for `unit` by the prior run, if it may be reused.
    ///
    /// Reuse requires the same digest, every dependency reused in this run
    /// (a redeployed dependency invalidates the dependent's constructor input),
    /// and the chain still holding a contract at that address. A chain that
    /// cannot answer fails the unit.
    async fn reusable_address(
        &self,
        unit: &DeploymentUnit,
        digest: &str,
        run: &Run,
    ) -> Result<Option<ContractAddress>, StepFailure> {
        let Some(prior) = self
            .prior
            .as_ref()
            .and_then(|prior| prior.recorded(&unit.name))
        else {
            return Ok(None);
        };
        let Some(address) = prior.address() else {
            return Ok(None);
        };

        if prior.digest() != Some(digest) {
            tracing::info!(unit = %unit.name, "Unit changed since the last run, redeploying");
            return Ok(None);
        }

        if let Some(dependency) = unit
            .dependencies
            .iter()
            .find(|dependency| !run.reused.contains(dependency.as_str()))
        {
            tracing::info!(
                unit = %unit.name,
                %dependency,
                "Dependency was redeployed, redeploying dependent"
            );
            return Ok(None);
        }

        match self.client.is_deployed(address).await {
            Ok(true) => Ok(Some(address)),
            Ok(false) => {
                tracing::warn!(unit = %unit.name, %address, "Recorded contract not found on chain");
                Ok(None)
            }
            Err(err) => Err(StepFailure::new(
                FailureKind::Deploy,
                err.context(format!(
                    "Failed to check whether {} is still deployed at {}",
                    unit.name, address
                )),
            )),
        }
    }
}

fn register(
    run: &mut Run,
    unit: &DeploymentUnit,
    address: ContractAddress,
) -> Result<(), StepFailure> {
    run.registry
        .insert(&unit.name, address)
        .map_err(|err| StepFailure::new(FailureKind::Deploy, err))
}
