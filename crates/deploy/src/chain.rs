//! Interface to the chain the contracts are deployed on.

use std::future::Future;

use anyhow::Result;

use crate::{ClassHash, ConstructorPayload, ContractAddress, ContractArtifact, Salt};

/// Outcome of a successful declare-and-deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: ContractAddress,
    pub class_hash: ClassHash,
}

/// Declares and deploys contract classes.
///
/// Implementations own retries, signing and transaction tracking. Callers
/// treat every returned error as final.
pub trait ChainClient {
    /// Declare the class of `artifact` (if not yet declared) and deploy one
    /// instance with the given constructor payload and salt.
    fn declare_and_deploy(
        &self,
        artifact: &ContractArtifact,
        payload: &ConstructorPayload,
        salt: Salt,
    ) -> impl Future<Output = Result<DeployedContract>>;

    /// Whether a contract currently exists at `address`.
    fn is_deployed(&self, address: ContractAddress) -> impl Future<Output = Result<bool>>;

    /// A fresh, unpredictable deployment salt.
    fn generate_salt(&self) -> Salt {
        Salt::random()
    }
}
