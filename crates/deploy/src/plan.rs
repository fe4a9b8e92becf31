//! Resolution of deployment units into an executable order.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::DeploymentUnit;

/// Reasons a set of units cannot be turned into a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("deployment unit `{0}` is defined more than once")]
    DuplicateUnit(String),

    #[error("unit `{unit}` depends on `{dependency}`, which is not a known deployment unit")]
    UnresolvedDependency { unit: String, dependency: String },

    #[error(
        "constructor argument `{param}` of unit `{unit}` is wired to `{dependency}`, which is not one of its dependencies"
    )]
    UndeclaredArgument {
        unit: String,
        param: String,
        dependency: String,
    },

    #[error("constructor argument `{param}` of unit `{unit}` is wired more than once")]
    DuplicateArgument { unit: String, param: String },

    #[error("dependency cycle between units: {}", .members.join(" -> "))]
    CyclicDependency { members: Vec<String> },
}

/// Units in an order where every unit follows all of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    units: Vec<DeploymentUnit>,
}

impl DeploymentPlan {
    /// Sort `units` topologically.
    ///
    /// Among units that are ready at the same time the one defined first wins,
    /// so a definition order that is already valid is kept as is.
    pub fn build(units: Vec<DeploymentUnit>) -> Result<Self, PlanError> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.name.as_str(), i).is_some() {
                return Err(PlanError::DuplicateUnit(unit.name.clone()));
            }
        }

        // deps[i] holds the indices unit i waits on, dependents[i] the ones waiting on it.
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(units.len());
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];

        for (i, unit) in units.iter().enumerate() {
            let mut resolved = Vec::with_capacity(unit.dependencies.len());
            for dependency in &unit.dependencies {
                let Some(&d) = index.get(dependency.as_str()) else {
                    return Err(PlanError::UnresolvedDependency {
                        unit: unit.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if !resolved.contains(&d) {
                    resolved.push(d);
                    dependents[d].push(i);
                }
            }

            if let Some(arg) = unit
                .constructor_args
                .iter()
                .find(|arg| !unit.dependencies.contains(&arg.from))
            {
                return Err(PlanError::UndeclaredArgument {
                    unit: unit.name.clone(),
                    param: arg.param.clone(),
                    dependency: arg.from.clone(),
                });
            }

            let mut params = HashSet::with_capacity(unit.constructor_args.len());
            if let Some(arg) = unit
                .constructor_args
                .iter()
                .find(|arg| !params.insert(arg.param.as_str()))
            {
                return Err(PlanError::DuplicateArgument {
                    unit: unit.name.clone(),
                    param: arg.param.clone(),
                });
            }

            deps.push(resolved);
        }

        let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..units.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(units.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < units.len() {
            let members = find_cycle(&deps, &pending)
                .into_iter()
                .map(|i| units[i].name.clone())
                .collect();
            return Err(PlanError::CyclicDependency { members });
        }

        let mut slots: Vec<Option<DeploymentUnit>> = units.into_iter().map(Some).collect();
        let units = order.into_iter().filter_map(|i| slots[i].take()).collect();

        Ok(Self { units })
    }

    pub fn units(&self) -> &[DeploymentUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|unit| unit.name.as_str())
    }
}

impl<'a> IntoIterator for &'a DeploymentPlan {
    type Item = &'a DeploymentUnit;
    type IntoIter = std::slice::Iter<'a, DeploymentUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Walk unresolved dependency edges from a stalled unit until one repeats.
///
/// Every unit left with a non-zero `pending` count still waits on at least one
/// other stalled unit, so the walk always closes a loop.
fn find_cycle(deps: &[Vec<usize>], pending: &[usize]) -> Vec<usize> {
    let Some(start) = (0..deps.len()).find(|&i| pending[i] > 0) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = start;

    while seen.insert(current) {
        path.push(current);
        match deps[current].iter().copied().find(|&d| pending[d] > 0) {
            Some(next) => current = next,
            None => return path,
        }
    }

    // `current` is where the walk closed. Reverse so each member precedes its dependent.
    let first = path.iter().position(|&i| i == current).unwrap_or(0);
    let mut cycle = path.split_off(first);
    cycle.reverse();
    cycle
}
