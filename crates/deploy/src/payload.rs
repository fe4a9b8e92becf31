//! Constructor calldata derived from the registry.

use std::fmt;

use anyhow::Result;

use crate::{ContractAbi, DeployedRegistry, DeploymentUnit, Felt};

/// Named constructor arguments, ordered as the constructor declares them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructorPayload {
    args: Vec<(String, Felt)>,
}

impl ConstructorPayload {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bind every wired argument of `unit` to the address its dependency got.
    ///
    /// Values are placed in the order of the ABI constructor inputs. Each input
    /// must be wired, each wiring must name an input, and every input must be
    /// a single-felt type since addresses are the only values substituted here.
    pub fn build(
        unit: &DeploymentUnit,
        abi: &ContractAbi,
        registry: &DeployedRegistry,
    ) -> Result<Self> {
        let Some(inputs) = abi.constructor.as_deref() else {
            if let Some(arg) = unit.constructor_args.first() {
                anyhow::bail!(
                    "{} has no constructor but `{}` is wired to {}",
                    unit.name,
                    arg.param,
                    arg.from
                );
            }
            return Ok(Self::empty());
        };

        if let Some(arg) = unit
            .constructor_args
            .iter()
            .find(|arg| !inputs.iter().any(|input| input.name == arg.param))
        {
            anyhow::bail!(
                "{} constructor has no parameter named `{}` (wired to {})",
                unit.name,
                arg.param,
                arg.from
            );
        }

        let mut args = Vec::with_capacity(inputs.len());
        for input in inputs {
            let Some(arg) = unit
                .constructor_args
                .iter()
                .find(|arg| arg.param == input.name)
            else {
                anyhow::bail!(
                    "{} constructor parameter `{}` is not wired to any dependency",
                    unit.name,
                    input.name
                );
            };

            if !input.is_single_felt() {
                anyhow::bail!(
                    "{} constructor parameter `{}` has type {}, which cannot hold a contract address",
                    unit.name,
                    input.name,
                    input.ty
                );
            }

            let Some(address) = registry.get(&arg.from) else {
                anyhow::bail!(
                    "{} needs the address of {} for `{}`, but it has not been deployed",
                    unit.name,
                    arg.from,
                    arg.param
                );
            };

            args.push((input.name.clone(), *address));
        }

        Ok(Self { args })
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Value bound to `param`, if any.
    pub fn get(&self, param: &str) -> Option<Felt> {
        self.args
            .iter()
            .find(|(name, _)| name == param)
            .map(|(_, value)| *value)
    }

    pub fn args(&self) -> &[(String, Felt)] {
        &self.args
    }

    /// Flattened calldata, one felt per argument.
    pub fn calldata(&self) -> Vec<Felt> {
        self.args.iter().map(|(_, value)| *value).collect()
    }
}

impl fmt::Display for ConstructorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str(")")
    }
}
