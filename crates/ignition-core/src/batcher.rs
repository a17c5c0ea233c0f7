//! Dependency-level batching.

use std::collections::{BTreeMap, HashMap};

use ignition_types::{ExecutionStatus, FutureId};

use crate::module::IgnitionModule;
use crate::reducer::DeploymentState;

/// Ordered batches of future ids still to run.
///
/// A future's level is 0 without dependencies and otherwise one more than
/// its deepest dependency, counted over the whole module so that completed
/// work still pushes its dependents down. Futures that already succeeded are
/// left out; levels that end up empty are dropped. Ids in a batch are sorted.
pub fn compute_batches(module: &IgnitionModule, state: &DeploymentState) -> Vec<Vec<FutureId>> {
    let mut levels: HashMap<&str, usize> = HashMap::new();
    for id in module.futures.keys() {
        level_of(module, id, &mut levels);
    }

    let mut batches: BTreeMap<usize, Vec<FutureId>> = BTreeMap::new();
    for id in module.futures.keys() {
        if state.status_of(id) == Some(ExecutionStatus::Success) {
            continue;
        }
        let level = levels.get(id.as_str()).copied().unwrap_or_default();
        batches.entry(level).or_default().push(id.clone());
    }
    batches.into_values().collect()
}

fn level_of<'a>(module: &'a IgnitionModule, id: &'a str, levels: &mut HashMap<&'a str, usize>) -> usize {
    if let Some(level) = levels.get(id) {
        return *level;
    }
    // Module construction rejects unknown and forward references, so the
    // recursion terminates.
    let level = module
        .future(id)
        .map(|future| {
            future
                .dependencies
                .iter()
                .map(|dep| level_of(module, dep, levels) + 1)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    levels.insert(id, level);
    level
}
