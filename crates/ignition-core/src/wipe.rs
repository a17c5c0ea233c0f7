//! Forgetting a future so that the next run executes it from scratch.

use anyhow::anyhow;
use ignition_types::JournalMessage;
use tracing::info;

use crate::errors::IgnitionError;
use crate::reducer::DeploymentStateCell;

/// Journal a `Wipe` for `future_id`.
///
/// Refused when the future has no execution state, or when another future
/// that depends on it has already started: its recorded inputs were
/// resolved from the state being wiped.
pub fn wipe(cell: &mut DeploymentStateCell, future_id: &str) -> Result<(), IgnitionError> {
    if cell.state().get(future_id).is_none() {
        return Err(anyhow!("Cannot wipe {} as it has no execution state", future_id).into());
    }

    let dependents: Vec<&str> = cell
        .state()
        .execution_states
        .values()
        .filter(|s| s.dependencies.contains(future_id))
        .map(|s| s.id.as_str())
        .collect();
    if !dependents.is_empty() {
        return Err(anyhow!(
            "Cannot wipe {} as there are dependent futures that have already started: {}",
            future_id,
            dependents.join(", ")
        )
        .into());
    }

    cell.apply(JournalMessage::Wipe {
        future_id: future_id.to_string(),
    })?;
    info!(future = future_id, "Wiped execution state");
    Ok(())
}
