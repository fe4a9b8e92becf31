use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ContractAddress, ContractArtifact, DeploymentUnit, Felt};

/// Parameters identifying where a run deploys to.
///
/// Two runs with the same fingerprint target the same chain from the same
/// account, so addresses recorded by one are meaningful to the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    /// Chain id reported by the node.
    pub chain_id: Felt,
    /// Account paying for and originating the deployments.
    pub account_address: ContractAddress,
    /// Scarb package the artifacts come from.
    pub package: String,
}

impl RunFingerprint {
    /// Compute a SHA-256 hash of this fingerprint.
    ///
    /// The hash is deterministic: fields are serialized to JSON in declaration order.
    pub fn compute_hash(&self) -> String {
        hash_json(self)
    }
}

#[derive(Serialize)]
struct UnitDigestInput<'a> {
    unit: &'a DeploymentUnit,
    artifact: &'a str,
}

/// Digest of everything that determines what deploying `unit` puts on chain,
/// apart from its dependencies' addresses: the unit's wiring and the compiled artifact.
pub fn unit_digest(unit: &DeploymentUnit, artifact: &ContractArtifact) -> String {
    hash_json(&UnitDigestInput {
        unit,
        artifact: &artifact.digest,
    })
}

fn hash_json<T: Serialize>(value: &T) -> String {
    // Structs of strings and felts always serialize.
    let json = serde_json::to_vec(value).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}
