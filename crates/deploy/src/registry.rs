//! Run-scoped registry of deployed addresses.

use std::collections::BTreeMap;

use crate::ContractAddress;

/// Addresses produced so far in a run, keyed by unit name.
///
/// Entries are final: inserting a name twice is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployedRegistry {
    addresses: BTreeMap<String, ContractAddress>,
}

impl DeployedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the address of `unit`.
    pub fn insert(&mut self, unit: &str, address: ContractAddress) -> anyhow::Result<()> {
        if let Some(existing) = self.addresses.get(unit) {
            anyhow::bail!(
                "Unit {} is already registered at {}, refusing to overwrite with {}",
                unit,
                existing,
                address
            );
        }
        self.addresses.insert(unit.to_string(), address);
        Ok(())
    }

    pub fn get(&self, unit: &str) -> Option<ContractAddress> {
        self.addresses.get(unit).copied()
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.addresses.contains_key(unit)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Felt;

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = DeployedRegistry::new();
        let auth = ContractAddress::from(Felt::from(0x10u64));

        registry.insert("Auth", auth).unwrap();

        assert_eq!(registry.get("Auth"), Some(auth));
        assert!(registry.contains("Auth"));
        assert!(registry.get("Validator").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_addresses_are_final() {
        let mut registry = DeployedRegistry::new();
        let first = ContractAddress::from(Felt::from(1u64));
        let second = ContractAddress::from(Felt::from(2u64));

        registry.insert("Auth", first).unwrap();
        assert!(registry.insert("Auth", second).is_err());
        assert_eq!(registry.get("Auth"), Some(first));
    }
}
