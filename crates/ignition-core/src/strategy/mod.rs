//! Execution strategies.
//!
//! A strategy turns one execution state into the network interactions that
//! complete it. Each run of a future builds a fresh [`StrategyProcedure`]
//! and drives it from the start: the processor answers every request it
//! already has a recorded outcome for, so the procedure fast-forwards to the
//! first interaction that still needs the network. Nothing about a
//! procedure's progress lives outside the journal.

pub mod basic;

use std::fmt;
use std::sync::Arc;

use ethers_core::types::H256;
use ignition_types::{
    Artifact, ExecutionResult, ExecutionState, NetworkInteraction, NetworkInteractionRequest,
    RawCallResult, TransactionReceipt,
};

use crate::abi::{decode_error, parse_abi};
use crate::errors::StrategyError;

pub use basic::BasicStrategy;

/// The answer to a request, fed back into the procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Confirmed {
        tx_hash: H256,
        receipt: TransactionReceipt,
    },
    StaticCall(RawCallResult),
}

impl InteractionOutcome {
    /// Outcome recorded in a completed interaction.
    pub fn from_interaction(interaction: &NetworkInteraction) -> Option<Self> {
        match interaction {
            NetworkInteraction::Onchain(o) => o.confirmed_transaction().and_then(|tx| {
                tx.receipt.as_ref().map(|receipt| InteractionOutcome::Confirmed {
                    tx_hash: tx.hash,
                    receipt: receipt.clone(),
                })
            }),
            NetworkInteraction::StaticCall(c) => {
                c.result.clone().map(InteractionOutcome::StaticCall)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyStep {
    Request(NetworkInteractionRequest),
    Done(ExecutionResult),
}

/// A resumable procedure for a single future.
pub trait StrategyProcedure: Send {
    /// Advance the procedure. `outcome` answers the previous request and is
    /// `None` on the first call.
    fn resume(&mut self, outcome: Option<InteractionOutcome>) -> Result<StrategyStep, StrategyError>;
}

pub trait ExecutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// A procedure positioned before its first request.
    fn procedure(
        &self,
        state: &ExecutionState,
        artifact: Option<&Artifact>,
    ) -> Result<Box<dyn StrategyProcedure>, StrategyError>;

    /// Inspect the `eth_call` simulation of a transaction about to be sent.
    /// `Some` ends the future without sending.
    fn on_simulation(
        &self,
        simulation: &RawCallResult,
        artifact: Option<&Artifact>,
    ) -> Result<Option<ExecutionResult>, StrategyError> {
        if simulation.success {
            return Ok(None);
        }
        let abi = artifact.map(parse_abi).transpose()?;
        let error = decode_error(&simulation.return_data, abi.as_ref())?;
        Ok(Some(ExecutionResult::SimulationError { error }))
    }
}

impl fmt::Debug for dyn ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionStrategy").field(&self.name()).finish()
    }
}

/// Strategies that ship with the crate, by the name journaled for a future.
pub fn strategy_by_name(name: &str) -> Result<Arc<dyn ExecutionStrategy>, StrategyError> {
    match name {
        BasicStrategy::NAME => Ok(Arc::new(BasicStrategy)),
        other => Err(StrategyError::UnknownStrategy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode_revert_reason;
    use ethers_core::types::Bytes;
    use ignition_types::EvmExecutionError;

    #[test]
    fn test_lookup() {
        assert_eq!(strategy_by_name("basic").unwrap().name(), "basic");
        assert!(matches!(
            strategy_by_name("create2"),
            Err(StrategyError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_simulation_revert_is_decoded() -> Result<(), StrategyError> {
        let strategy = BasicStrategy;
        let ok = RawCallResult {
            return_data: Bytes::new(),
            success: true,
        };
        assert_eq!(strategy.on_simulation(&ok, None)?, None);

        let reverted = RawCallResult {
            return_data: encode_revert_reason("not owner"),
            success: false,
        };
        assert_eq!(
            strategy.on_simulation(&reverted, None)?,
            Some(ExecutionResult::SimulationError {
                error: EvmExecutionError::RevertWithReason {
                    message: "not owner".to_string()
                }
            })
        );
        Ok(())
    }
}
