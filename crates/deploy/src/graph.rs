//! Deployment units and the starkaid contract graph.

use serde::{Deserialize, Serialize};

/// Binds one constructor parameter to the address of a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructorArg {
    /// Constructor parameter name, as it appears in the contract ABI.
    pub param: String,
    /// Name of the unit whose address is passed for this parameter.
    pub from: String,
}

impl ConstructorArg {
    pub fn new(param: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            from: from.into(),
        }
    }
}

/// One contract to deploy.
///
/// `dependencies` lists the units that must be deployed first. Every
/// `constructor_args` entry must take its value from one of those.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentUnit {
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub constructor_args: Vec<ConstructorArg>,
}

impl DeploymentUnit {
    /// A unit with no dependencies and an empty constructor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            constructor_args: Vec::new(),
        }
    }

    /// Wire `param` to the address of `dependency`, declaring the dependency if needed.
    pub fn wire(mut self, param: impl Into<String>, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency.clone());
        }
        self.constructor_args.push(ConstructorArg::new(param, dependency));
        self
    }

    /// Declare an ordering dependency without passing its address.
    pub fn after(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }
}

/// The starkaid contract suite, in canonical deployment order.
pub fn starkaid_units() -> Vec<DeploymentUnit> {
    vec![
        DeploymentUnit::new("Auth"),
        DeploymentUnit::new("Validator"),
        DeploymentUnit::new("Campaign")
            .wire("auth_contract_address", "Auth")
            .wire("validator_contract_address", "Validator"),
        DeploymentUnit::new("ValidatorReport").wire("validator_contract_address", "Validator"),
        DeploymentUnit::new("ProgressTracking").wire("campaign_contract_address", "Campaign"),
    ]
}
