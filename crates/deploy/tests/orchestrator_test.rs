//! End-to-end runs of the orchestrator against in-memory artifacts and chain.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use starkaid_deploy::{
    AbiInput, ArtifactLoader, ChainClient, ConstructorPayload, ContractAbi, ContractAddress,
    ContractArtifact, DeployedContract, DeploymentPlan, DeploymentUnit, FailureKind, Felt,
    Orchestrator, PlanError, Reporter, RunReport, RunState, RunStatus, Salt, UnitOutcome,
    starkaid_units,
};

const ADDRESS_TYPE: &str = "core::starknet::contract_address::ContractAddress";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn constructor(params: &[&str]) -> ContractAbi {
    ContractAbi {
        constructor: Some(
            params
                .iter()
                .map(|name| AbiInput {
                    name: name.to_string(),
                    ty: ADDRESS_TYPE.to_string(),
                })
                .collect(),
        ),
    }
}

/// Serves artifacts from memory. Units without an ABI entry have no artifact.
struct StubLoader {
    abis: HashMap<String, ContractAbi>,
    digests: HashMap<String, String>,
}

impl StubLoader {
    fn starkaid() -> Self {
        let abis = [
            ("Auth", ContractAbi::default()),
            ("Validator", ContractAbi::default()),
            (
                "Campaign",
                constructor(&["auth_contract_address", "validator_contract_address"]),
            ),
            ("ValidatorReport", constructor(&["validator_contract_address"])),
            ("ProgressTracking", constructor(&["campaign_contract_address"])),
        ]
        .into_iter()
        .map(|(unit, abi)| (unit.to_string(), abi))
        .collect();

        Self {
            abis,
            digests: HashMap::new(),
        }
    }

    fn without(mut self, unit: &str) -> Self {
        self.abis.remove(unit);
        self
    }

    fn with_abi(mut self, unit: &str, abi: ContractAbi) -> Self {
        self.abis.insert(unit.to_string(), abi);
        self
    }

    fn with_digest(mut self, unit: &str, digest: &str) -> Self {
        self.digests.insert(unit.to_string(), digest.to_string());
        self
    }
}

impl ArtifactLoader for StubLoader {
    fn load(&self, unit: &str) -> Result<ContractArtifact> {
        let Some(abi) = self.abis.get(unit) else {
            anyhow::bail!("No artifact for {}", unit);
        };

        Ok(ContractArtifact {
            name: format!("starkaid_{}", unit),
            sierra_path: PathBuf::from(format!("starkaid_{}.contract_class.json", unit)),
            casm_path: PathBuf::from(format!("starkaid_{}.compiled_contract_class.json", unit)),
            abi: abi.clone(),
            digest: self
                .digests
                .get(unit)
                .cloned()
                .unwrap_or_else(|| format!("digest-{}", unit)),
        })
    }
}

/// A declare-and-deploy call seen by the stub chain.
#[derive(Debug, Clone)]
struct DeployCall {
    artifact: String,
    payload: ConstructorPayload,
    salt: Salt,
    address: ContractAddress,
}

#[derive(Default)]
struct ChainState {
    calls: Vec<DeployCall>,
    live: HashSet<ContractAddress>,
    next_address: u64,
}

/// In-memory chain shared between runs of the same test.
#[derive(Clone, Default)]
struct StubChain(Arc<Mutex<ChainState>>);

impl StubChain {
    fn calls(&self) -> Vec<DeployCall> {
        self.0.lock().unwrap().calls.clone()
    }

    fn deployed_units(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.artifact.trim_start_matches("starkaid_").to_string())
            .collect()
    }

    fn forget(&self, address: ContractAddress) {
        self.0.lock().unwrap().live.remove(&address);
    }

    fn clear_calls(&self) {
        self.0.lock().unwrap().calls.clear();
    }
}

struct StubClient {
    chain: StubChain,
    fail_on: Option<String>,
    unreachable: bool,
    salts: Mutex<VecDeque<Salt>>,
}

impl StubClient {
    fn new(chain: &StubChain) -> Self {
        Self {
            chain: chain.clone(),
            fail_on: None,
            unreachable: false,
            salts: Mutex::new(VecDeque::new()),
        }
    }

    fn failing_on(mut self, unit: &str) -> Self {
        self.fail_on = Some(format!("starkaid_{}", unit));
        self
    }

    /// Every chain query fails, as if the node went down.
    fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn with_salts(self, salts: impl IntoIterator<Item = u64>) -> Self {
        *self.salts.lock().unwrap() = salts
            .into_iter()
            .map(|salt| Salt::from(Felt::from(salt)))
            .collect();
        self
    }
}

impl ChainClient for StubClient {
    async fn declare_and_deploy(
        &self,
        artifact: &ContractArtifact,
        payload: &ConstructorPayload,
        salt: Salt,
    ) -> Result<DeployedContract> {
        if self.fail_on.as_deref() == Some(artifact.name.as_str()) {
            anyhow::bail!("transaction reverted");
        }

        let mut state = self.chain.0.lock().unwrap();
        state.next_address += 1;
        let address = ContractAddress::from(Felt::from(0x1000 + state.next_address));
        state.live.insert(address);
        state.calls.push(DeployCall {
            artifact: artifact.name.clone(),
            payload: payload.clone(),
            salt,
            address,
        });

        Ok(DeployedContract {
            address,
            class_hash: Felt::from(state.next_address).into(),
        })
    }

    async fn is_deployed(&self, address: ContractAddress) -> Result<bool> {
        if self.unreachable {
            anyhow::bail!("connection refused");
        }
        Ok(self.chain.0.lock().unwrap().live.contains(&address))
    }

    fn generate_salt(&self) -> Salt {
        self.salts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Salt::random)
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn unit_deployed(&self, unit: &str, _address: ContractAddress) {
        self.events.lock().unwrap().push(format!("deployed {}", unit));
    }

    fn unit_reused(&self, unit: &str, _address: ContractAddress) {
        self.events.lock().unwrap().push(format!("reused {}", unit));
    }

    fn unit_failed(&self, unit: &str, _reason: &str) {
        self.events.lock().unwrap().push(format!("failed {}", unit));
    }

    fn run_finished(&self, report: &RunReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finished success={}", report.success()));
    }
}

fn plan() -> DeploymentPlan {
    DeploymentPlan::build(starkaid_units()).unwrap()
}

async fn run(
    loader: StubLoader,
    client: StubClient,
    prior: Option<RunReport>,
) -> (RunReport, Orchestrator<StubLoader, StubClient, RecordingReporter>) {
    init_tracing();
    let mut orchestrator = Orchestrator::new(loader, client, RecordingReporter::default());
    if let Some(prior) = prior {
        orchestrator = orchestrator.with_prior(prior);
    }
    assert_eq!(orchestrator.state(), &RunState::NotStarted);

    let report = orchestrator.run(&plan()).await;
    (report, orchestrator)
}

const CANONICAL: [&str; 5] = [
    "Auth",
    "Validator",
    "Campaign",
    "ValidatorReport",
    "ProgressTracking",
];

#[tokio::test]
async fn test_canonical_run_wires_addresses() {
    let chain = StubChain::default();
    let (report, orchestrator) = run(StubLoader::starkaid(), StubClient::new(&chain), None).await;

    assert!(report.success());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(orchestrator.state(), &RunState::Completed);
    assert!(report.not_attempted.is_empty());
    assert_eq!(chain.deployed_units(), CANONICAL);

    let calls = chain.calls();
    let auth = report.address_of("Auth").unwrap();
    let validator = report.address_of("Validator").unwrap();
    let campaign = report.address_of("Campaign").unwrap();

    assert!(calls[0].payload.is_empty());
    assert!(calls[1].payload.is_empty());
    assert_eq!(
        calls[2].payload.args(),
        [
            ("auth_contract_address".to_string(), *auth),
            ("validator_contract_address".to_string(), *validator),
        ]
    );
    assert_eq!(calls[2].payload.calldata(), vec![*auth, *validator]);
    assert_eq!(calls[3].payload.get("validator_contract_address"), Some(*validator));
    assert_eq!(calls[4].payload.get("campaign_contract_address"), Some(*campaign));

    for (unit, call) in report.units.iter().zip(&calls) {
        assert_eq!(unit.address(), Some(call.address));
    }

    assert_eq!(
        orchestrator.reporter().events(),
        [
            "deployed Auth",
            "deployed Validator",
            "deployed Campaign",
            "deployed ValidatorReport",
            "deployed ProgressTracking",
            "finished success=true",
        ]
    );
}

#[tokio::test]
async fn test_deploy_failure_halts_run() {
    let chain = StubChain::default();
    let client = StubClient::new(&chain).failing_on("Campaign");
    let (report, orchestrator) = run(StubLoader::starkaid(), client, None).await;

    assert!(!report.success());
    assert_eq!(report.successes().count(), 2);
    assert_eq!(
        report.status,
        RunStatus::Halted {
            unit: "Campaign".to_string(),
            kind: FailureKind::Deploy,
        }
    );

    let (unit, kind, reason) = report.failure().unwrap();
    assert_eq!(unit, "Campaign");
    assert_eq!(kind, FailureKind::Deploy);
    assert!(reason.contains("transaction reverted"));

    assert_eq!(report.not_attempted, ["ValidatorReport", "ProgressTracking"]);
    assert_eq!(chain.deployed_units(), ["Auth", "Validator"]);
    assert!(matches!(
        orchestrator.state(),
        RunState::Halted { unit, .. } if unit == "Campaign"
    ));
    assert_eq!(
        orchestrator.reporter().events(),
        [
            "deployed Auth",
            "deployed Validator",
            "failed Campaign",
            "finished success=false",
        ]
    );
}

#[tokio::test]
async fn test_missing_artifact_halts_with_load_failure() {
    let chain = StubChain::default();
    let loader = StubLoader::starkaid().without("Validator");
    let (report, _) = run(loader, StubClient::new(&chain), None).await;

    assert_eq!(
        report.failure().map(|(unit, kind, _)| (unit, kind)),
        Some(("Validator", FailureKind::Load))
    );
    assert_eq!(chain.deployed_units(), ["Auth"]);
    assert_eq!(
        report.not_attempted,
        ["Campaign", "ValidatorReport", "ProgressTracking"]
    );
}

#[tokio::test]
async fn test_abi_mismatch_halts_with_payload_failure() {
    let chain = StubChain::default();
    let loader =
        StubLoader::starkaid().with_abi("Campaign", constructor(&["auth_contract_address"]));
    let (report, _) = run(loader, StubClient::new(&chain), None).await;

    let (unit, kind, reason) = report.failure().unwrap();
    assert_eq!((unit, kind), ("Campaign", FailureKind::Payload));
    assert!(reason.contains("validator_contract_address"));
    assert_eq!(chain.deployed_units(), ["Auth", "Validator"]);
}

#[tokio::test]
async fn test_salts_are_unique_within_a_run() {
    let chain = StubChain::default();
    let client = StubClient::new(&chain).with_salts([1, 1, 2, 2, 3, 4, 4, 5]);
    let (report, _) = run(StubLoader::starkaid(), client, None).await;

    assert!(report.success());
    let salts: Vec<Salt> = chain.calls().iter().map(|call| call.salt).collect();
    let expected: Vec<Salt> = (1..=5u64).map(|s| Salt::from(Felt::from(s))).collect();
    assert_eq!(salts, expected);
}

#[tokio::test]
async fn test_exhausted_salt_source_fails_the_unit() {
    let chain = StubChain::default();
    let client = StubClient::new(&chain).with_salts(std::iter::repeat_n(7, 16));
    let (report, _) = run(StubLoader::starkaid(), client, None).await;

    assert_eq!(
        report.failure().map(|(unit, kind, _)| (unit, kind)),
        Some(("Validator", FailureKind::Deploy))
    );
    assert_eq!(chain.deployed_units(), ["Auth"]);
}

#[test]
fn test_cyclic_graph_is_rejected_before_any_deployment() {
    let mut units = starkaid_units();
    units[0] = DeploymentUnit::new("Auth").after("ProgressTracking");

    let members = match DeploymentPlan::build(units).unwrap_err() {
        PlanError::CyclicDependency { members } => members,
        other => panic!("expected a cycle, got {other}"),
    };
    assert!(members.contains(&"Auth".to_string()));
    assert!(members.contains(&"ProgressTracking".to_string()));
}

#[tokio::test]
async fn test_unchanged_units_are_reused() {
    let chain = StubChain::default();
    let (first, _) = run(StubLoader::starkaid(), StubClient::new(&chain), None).await;
    chain.clear_calls();

    let (second, orchestrator) =
        run(StubLoader::starkaid(), StubClient::new(&chain), Some(first.clone())).await;

    assert!(second.success());
    assert!(chain.calls().is_empty());
    for unit in CANONICAL {
        assert!(matches!(
            second.unit(unit).unwrap().outcome,
            UnitOutcome::Reused { .. }
        ));
        assert_eq!(second.address_of(unit), first.address_of(unit));
    }
    assert_eq!(orchestrator.reporter().events()[0], "reused Auth");
}

#[tokio::test]
async fn test_changed_unit_redeploys_its_dependents() {
    let chain = StubChain::default();
    let (first, _) = run(StubLoader::starkaid(), StubClient::new(&chain), None).await;
    chain.clear_calls();

    let loader = StubLoader::starkaid().with_digest("Validator", "rebuilt");
    let (second, _) = run(loader, StubClient::new(&chain), Some(first.clone())).await;

    assert!(second.success());
    assert_eq!(
        chain.deployed_units(),
        ["Validator", "Campaign", "ValidatorReport", "ProgressTracking"]
    );
    assert_eq!(second.address_of("Auth"), first.address_of("Auth"));

    let new_validator = second.address_of("Validator").unwrap();
    assert_ne!(Some(new_validator), first.address_of("Validator"));
    assert_eq!(
        chain.calls()[1].payload.get("validator_contract_address"),
        Some(*new_validator)
    );
}

#[tokio::test]
async fn test_vanished_contract_is_redeployed() {
    let chain = StubChain::default();
    let (first, _) = run(StubLoader::starkaid(), StubClient::new(&chain), None).await;
    chain.clear_calls();
    chain.forget(first.address_of("ValidatorReport").unwrap());

    let (second, _) = run(StubLoader::starkaid(), StubClient::new(&chain), Some(first)).await;

    assert!(second.success());
    assert_eq!(chain.deployed_units(), ["ValidatorReport"]);
}

#[tokio::test]
async fn test_halted_run_resumes_where_it_stopped() {
    let chain = StubChain::default();
    let client = StubClient::new(&chain).failing_on("Campaign");
    let (first, _) = run(StubLoader::starkaid(), client, None).await;
    chain.clear_calls();

    let (second, _) = run(StubLoader::starkaid(), StubClient::new(&chain), Some(first)).await;

    assert!(second.success());
    assert_eq!(
        chain.deployed_units(),
        ["Campaign", "ValidatorReport", "ProgressTracking"]
    );
    assert!(matches!(
        second.unit("Validator").unwrap().outcome,
        UnitOutcome::Reused { .. }
    ));
}

#[tokio::test]
async fn test_unverifiable_contract_halts_run() {
    let chain = StubChain::default();
    let (first, _) = run(StubLoader::starkaid(), StubClient::new(&chain), None).await;
    assert!(first.success());
    chain.clear_calls();

    let client = StubClient::new(&chain).unreachable();
    let (second, orchestrator) = run(StubLoader::starkaid(), client, Some(first)).await;

    assert!(!second.success());
    let (unit, kind, reason) = second.failure().unwrap();
    assert_eq!((unit, kind), ("Auth", FailureKind::Deploy));
    assert!(reason.contains("connection refused"));
    assert!(chain.calls().is_empty());
    assert_eq!(
        second.not_attempted,
        ["Validator", "Campaign", "ValidatorReport", "ProgressTracking"]
    );
    assert_eq!(
        orchestrator.reporter().events(),
        ["failed Auth", "finished success=false"]
    );
}

#[tokio::test]
async fn test_prior_addresses_survive_an_early_halt() {
    let chain = StubChain::default();
    let client = StubClient::new(&chain).failing_on("ValidatorReport");
    let (first, _) = run(StubLoader::starkaid(), client, None).await;
    assert_eq!(chain.deployed_units(), ["Auth", "Validator", "Campaign"]);
    chain.clear_calls();

    let loader = StubLoader::starkaid().without("Auth");
    let (second, _) = run(loader, StubClient::new(&chain), Some(first.clone())).await;
    assert_eq!(
        second.failure().map(|(unit, kind, _)| (unit, kind)),
        Some(("Auth", FailureKind::Load))
    );
    assert!(chain.calls().is_empty());
    for unit in ["Auth", "Validator", "Campaign"] {
        assert_eq!(
            second.recorded(unit).and_then(|report| report.address()),
            first.address_of(unit)
        );
    }

    let (third, _) = run(StubLoader::starkaid(), StubClient::new(&chain), Some(second)).await;

    assert!(third.success());
    assert_eq!(
        chain.deployed_units(),
        ["ValidatorReport", "ProgressTracking"]
    );
    for unit in ["Auth", "Validator", "Campaign"] {
        assert_eq!(third.address_of(unit), first.address_of(unit));
    }
    assert!(third.carried_over.is_empty());
}
