//! Loading of compiled contract classes.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default Scarb output directory for the dev profile.
pub const DEFAULT_TARGET_DIR: &str = "target/dev";

/// Default Scarb package name of the contract suite.
pub const DEFAULT_PACKAGE: &str = "starkaid";

/// Resolves a deployment unit name to its compiled artifact.
pub trait ArtifactLoader {
    fn load(&self, unit: &str) -> Result<ContractArtifact>;
}

/// A compiled contract class ready to be declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    /// Artifact name, e.g. `starkaid_Auth`.
    pub name: String,
    /// Path to the Sierra contract class.
    pub sierra_path: PathBuf,
    /// Path to the compiled CASM class.
    pub casm_path: PathBuf,
    pub abi: ContractAbi,
    /// Hex SHA-256 over the Sierra and CASM bytes.
    pub digest: String,
}

/// A single typed input of an ABI function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiInput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl AbiInput {
    /// Whether values of this type occupy exactly one felt of calldata.
    pub fn is_single_felt(&self) -> bool {
        const SINGLE_FELT_TYPES: &[&str] = &[
            "core::starknet::contract_address::ContractAddress",
            "core::starknet::class_hash::ClassHash",
            "core::felt252",
            "ContractAddress",
            "ClassHash",
            "felt252",
            "felt",
        ];
        SINGLE_FELT_TYPES.contains(&self.ty.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AbiEntry {
    Constructor {
        #[serde(default)]
        inputs: Vec<AbiInput>,
    },
    #[serde(other)]
    Other,
}

/// The parts of a contract ABI the deployer cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractAbi {
    /// Constructor inputs in declaration order, or `None` without a constructor.
    pub constructor: Option<Vec<AbiInput>>,
}

impl ContractAbi {
    /// Parse an ABI given either as a JSON array or as a JSON-encoded string.
    pub fn from_json(abi: &Value) -> Result<Self> {
        let entries: Vec<AbiEntry> = match abi {
            Value::String(encoded) => {
                serde_json::from_str(encoded).context("Failed to parse string-encoded ABI")?
            }
            other => Vec::<AbiEntry>::deserialize(other).context("Failed to parse ABI")?,
        };

        let constructor = entries.into_iter().find_map(|entry| match entry {
            AbiEntry::Constructor { inputs } => Some(inputs),
            AbiEntry::Other => None,
        });

        Ok(Self { constructor })
    }

    pub fn constructor_inputs(&self) -> &[AbiInput] {
        self.constructor.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SierraClass {
    sierra_program: Vec<Value>,
    abi: Value,
}

/// Index Scarb writes next to the artifacts when `starknet-contract` targets are built.
#[derive(Debug, Deserialize)]
struct StarknetArtifactsIndex {
    contracts: Vec<IndexedContract>,
}

#[derive(Debug, Deserialize)]
struct IndexedContract {
    package_name: String,
    contract_name: String,
    artifacts: IndexedArtifacts,
}

#[derive(Debug, Deserialize)]
struct IndexedArtifacts {
    sierra: String,
    casm: Option<String>,
}

/// Loads artifacts from a Scarb target directory.
///
/// Artifacts are looked up in `<package>.starknet_artifacts.json` when present,
/// and otherwise by Scarb's naming convention
/// `<package>_<Unit>.contract_class.json` / `.compiled_contract_class.json`.
#[derive(Debug, Clone)]
pub struct ScarbArtifactLoader {
    target_dir: PathBuf,
    package: String,
}

impl ScarbArtifactLoader {
    pub fn new(target_dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            target_dir: target_dir.into(),
            package: package.into(),
        }
    }

    fn artifact_name(&self, unit: &str) -> String {
        format!("{}_{}", self.package, unit)
    }

    /// Resolve the Sierra and CASM paths for `unit`.
    fn locate(&self, unit: &str) -> Result<(PathBuf, PathBuf)> {
        let index_path = self
            .target_dir
            .join(format!("{}.starknet_artifacts.json", self.package));

        if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)
                .with_context(|| format!("Failed to read {}", index_path.display()))?;
            let index: StarknetArtifactsIndex = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", index_path.display()))?;

            if let Some(entry) = index
                .contracts
                .into_iter()
                .find(|c| c.package_name == self.package && c.contract_name == unit)
            {
                let casm = entry.artifacts.casm.with_context(|| {
                    format!(
                        "No CASM artifact for {}, enable `casm = true` in the Scarb manifest",
                        unit
                    )
                })?;
                return Ok((
                    self.target_dir.join(entry.artifacts.sierra),
                    self.target_dir.join(casm),
                ));
            }

            tracing::debug!(
                unit,
                index = %index_path.display(),
                "Contract not listed in artifacts index, falling back to file naming"
            );
        }

        let name = self.artifact_name(unit);
        Ok((
            self.target_dir.join(format!("{}.contract_class.json", name)),
            self.target_dir
                .join(format!("{}.compiled_contract_class.json", name)),
        ))
    }
}

impl ArtifactLoader for ScarbArtifactLoader {
    fn load(&self, unit: &str) -> Result<ContractArtifact> {
        let (sierra_path, casm_path) = self.locate(unit)?;

        let sierra_bytes = std::fs::read(&sierra_path).with_context(|| {
            format!(
                "Failed to read Sierra class for {} at {}",
                unit,
                sierra_path.display()
            )
        })?;
        let casm_bytes = std::fs::read(&casm_path).with_context(|| {
            format!(
                "Failed to read CASM class for {} at {}",
                unit,
                casm_path.display()
            )
        })?;

        let sierra: SierraClass = serde_json::from_slice(&sierra_bytes).with_context(|| {
            format!("{} is not a Sierra contract class", sierra_path.display())
        })?;
        if sierra.sierra_program.is_empty() {
            anyhow::bail!("Sierra program in {} is empty", sierra_path.display());
        }
        let _: Value = serde_json::from_slice(&casm_bytes)
            .with_context(|| format!("{} is not valid JSON", casm_path.display()))?;

        let abi = ContractAbi::from_json(&sierra.abi)
            .with_context(|| format!("Invalid ABI in {}", sierra_path.display()))?;

        let mut hasher = Sha256::new();
        hasher.update(&sierra_bytes);
        hasher.update(&casm_bytes);
        let digest = hex::encode(hasher.finalize());

        tracing::debug!(
            unit,
            sierra = %sierra_path.display(),
            casm = %casm_path.display(),
            "Loaded contract artifact"
        );

        Ok(ContractArtifact {
            name: self.artifact_name(unit),
            sierra_path,
            casm_path,
            abi,
            digest,
        })
    }
}
