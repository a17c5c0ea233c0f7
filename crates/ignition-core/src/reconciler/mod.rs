//! Reconciliation of a module against a recorded deployment.
//!
//! Before a run resumes an existing deployment, every future that already
//! has an execution state is checked against what was recorded for it:
//!
//! 1. the future kind must be unchanged;
//! 2. dependencies may not be added on futures that have not completed;
//! 3. the strategy, and then every kind-specific input (re-resolved against
//!    the current parameters and accounts), must be unchanged.
//!
//! The first failing check is reported for each future. Recorded states that
//! no longer have a future in the module are warnings only.

mod futures;
mod helpers;

use ignition_store::DeploymentLoader;
use ignition_types::{ExecutionState, ExecutionStatus, FutureId};
use serde::Serialize;
use tracing::debug;

use crate::artifacts::ArtifactResolver;
use crate::module::{Future, IgnitionModule};
use crate::reducer::DeploymentState;
use crate::resolve::ResolveContext;

use helpers::{compare, FieldCheck};

/// Everything reconciliation looks at besides the module.
pub struct ReconcileContext<'a> {
    pub deployment: &'a DeploymentState,
    pub resolve: ResolveContext<'a>,
    pub resolver: &'a dyn ArtifactResolver,
    pub loader: &'a dyn DeploymentLoader,
    /// Strategy the run would use for new futures.
    pub strategy: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationFailure {
    pub future_id: FutureId,
    pub failure: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub failures: Vec<ReconciliationFailure>,
    /// Recorded futures the module no longer declares.
    pub missing_execution_states: Vec<FutureId>,
}

impl ReconciliationResult {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn reconcile(module: &IgnitionModule, ctx: &ReconcileContext<'_>) -> ReconciliationResult {
    let mut result = ReconciliationResult::default();

    for future in module.futures.values() {
        let Some(exec) = ctx.deployment.get(&future.id) else {
            continue;
        };
        if let Err(failure) = reconcile_future(future, exec, ctx) {
            debug!(future = %future.id, %failure, "Reconciliation failed");
            result.failures.push(ReconciliationFailure {
                future_id: future.id.clone(),
                failure,
            });
        }
    }

    result.missing_execution_states = ctx
        .deployment
        .execution_states
        .keys()
        .filter(|id| !module.futures.contains_key(*id))
        .cloned()
        .collect();
    result
}

fn reconcile_future(future: &Future, exec: &ExecutionState, ctx: &ReconcileContext<'_>) -> FieldCheck {
    if future.kind != exec.future_kind {
        return Err(format!(
            "Future kind has been changed from {} to {}",
            exec.future_kind, future.kind
        ));
    }
    reconcile_dependencies(future, exec, ctx.deployment)?;
    compare("Strategy", &exec.strategy.as_str(), &ctx.strategy)?;
    futures::reconcile_fields(future, exec, ctx)
}

/// A dependency added after the future started is only acceptable when the
/// new dependency already succeeded, since the future may have run without it.
fn reconcile_dependencies(future: &Future, exec: &ExecutionState, deployment: &DeploymentState) -> FieldCheck {
    for dep in future.dependencies.difference(&exec.dependencies) {
        if deployment.status_of(dep) != Some(ExecutionStatus::Success) {
            return Err(format!(
                "A dependency on {} has been added, but {} has already started and {} has not completed",
                dep, future.id, dep
            ));
        }
    }
    Ok(())
}
