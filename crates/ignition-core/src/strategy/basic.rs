//! The default strategy: one interaction per future, sent as-is.

use ethers_core::abi::Abi;
use ethers_core::types::U256;
use ignition_types::{
    Artifact, ExecutionDetails, ExecutionResult, ExecutionState, NameOrIndex,
    NetworkInteractionRequest, ReceiptStatus, SuccessOutput,
};

use super::{ExecutionStrategy, InteractionOutcome, StrategyProcedure, StrategyStep};
use crate::abi::{decode_error, decode_static_call_result, encode_deployment, encode_function_call, parse_abi};
use crate::errors::StrategyError;

/// Every future of the basic strategy uses this interaction id.
const INTERACTION_ID: u32 = 1;

pub struct BasicStrategy;

impl BasicStrategy {
    pub const NAME: &'static str = "basic";
}

/// What to do with the outcome of the single interaction.
enum Completion {
    Deployment,
    Call,
    SendData,
    StaticCall {
        artifact: Artifact,
        abi: Abi,
        function_name: String,
        name_or_index: NameOrIndex,
    },
}

enum Phase {
    Start,
    Waiting,
    Finished,
}

struct BasicProcedure {
    future_id: String,
    phase: Phase,
    request: Option<NetworkInteractionRequest>,
    completion: Option<Completion>,
    /// Result for futures that need no interaction.
    immediate: Option<ExecutionResult>,
}

fn require_artifact<'a>(future_id: &str, artifact: Option<&'a Artifact>) -> Result<&'a Artifact, StrategyError> {
    artifact.ok_or_else(|| StrategyError::Abi(format!("No artifact available for {}", future_id)))
}

impl ExecutionStrategy for BasicStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn procedure(
        &self,
        state: &ExecutionState,
        artifact: Option<&Artifact>,
    ) -> Result<Box<dyn StrategyProcedure>, StrategyError> {
        let mut procedure = BasicProcedure {
            future_id: state.id.clone(),
            phase: Phase::Start,
            request: None,
            completion: None,
            immediate: None,
        };

        match &state.details {
            ExecutionDetails::Deployment(d) => {
                let artifact = require_artifact(&state.id, artifact)?;
                let data = encode_deployment(artifact, &d.libraries, &d.constructor_args)?;
                procedure.request = Some(NetworkInteractionRequest::Onchain {
                    id: INTERACTION_ID,
                    to: None,
                    data,
                    value: d.value,
                    from: d.from,
                });
                procedure.completion = Some(Completion::Deployment);
            }
            ExecutionDetails::Call(c) => {
                let artifact = require_artifact(&state.id, artifact)?;
                let data = encode_function_call(artifact, &c.function_name, &c.args)?;
                procedure.request = Some(NetworkInteractionRequest::Onchain {
                    id: INTERACTION_ID,
                    to: Some(c.contract_address),
                    data,
                    value: c.value,
                    from: c.from,
                });
                procedure.completion = Some(Completion::Call);
            }
            ExecutionDetails::StaticCall(c) => {
                let artifact = require_artifact(&state.id, artifact)?;
                let data = encode_function_call(artifact, &c.function_name, &c.args)?;
                procedure.request = Some(NetworkInteractionRequest::StaticCall {
                    id: INTERACTION_ID,
                    to: c.contract_address,
                    data,
                    value: U256::zero(),
                    from: c.from,
                });
                procedure.completion = Some(Completion::StaticCall {
                    artifact: artifact.clone(),
                    abi: parse_abi(artifact)?,
                    function_name: c.function_name.clone(),
                    name_or_index: c.name_or_index.clone(),
                });
            }
            ExecutionDetails::SendData(s) => {
                procedure.request = Some(NetworkInteractionRequest::Onchain {
                    id: INTERACTION_ID,
                    to: Some(s.to),
                    data: s.data.clone(),
                    value: s.value,
                    from: s.from,
                });
                procedure.completion = Some(Completion::SendData);
            }
            ExecutionDetails::ContractAt(c) => {
                procedure.immediate = Some(ExecutionResult::Success {
                    output: SuccessOutput::ContractAt { address: c.address },
                });
            }
            ExecutionDetails::ReadEventArgument(r) => {
                procedure.immediate = Some(ExecutionResult::Success {
                    output: SuccessOutput::ReadEventArgument {
                        value: r.result.clone(),
                    },
                });
            }
        }
        Ok(Box::new(procedure))
    }
}

impl BasicProcedure {
    fn complete(&self, outcome: InteractionOutcome) -> Result<ExecutionResult, StrategyError> {
        let completion = self.completion.as_ref().ok_or_else(|| {
            StrategyError::UnexpectedOutcome(format!("{} expects no interaction", self.future_id))
        })?;
        match (completion, outcome) {
            (_, InteractionOutcome::Confirmed { tx_hash, receipt })
                if receipt.status == ReceiptStatus::Failure =>
            {
                Ok(ExecutionResult::RevertedTransaction { tx_hash })
            }
            (Completion::Deployment, InteractionOutcome::Confirmed { tx_hash, receipt }) => {
                let address = receipt.contract_address.ok_or_else(|| {
                    StrategyError::UnexpectedOutcome(format!(
                        "Deployment transaction {:#x} of {} has no contract address",
                        tx_hash, self.future_id
                    ))
                })?;
                Ok(ExecutionResult::Success {
                    output: SuccessOutput::Deployment { address },
                })
            }
            (Completion::Call, InteractionOutcome::Confirmed { .. }) => Ok(ExecutionResult::Success {
                output: SuccessOutput::Call,
            }),
            (Completion::SendData, InteractionOutcome::Confirmed { .. }) => {
                Ok(ExecutionResult::Success {
                    output: SuccessOutput::SendData,
                })
            }
            (
                Completion::StaticCall {
                    artifact,
                    abi,
                    function_name,
                    name_or_index,
                },
                InteractionOutcome::StaticCall(raw),
            ) => {
                if !raw.success {
                    let error = decode_error(&raw.return_data, Some(abi))?;
                    return Ok(ExecutionResult::StaticCallError { error });
                }
                let value =
                    decode_static_call_result(artifact, function_name, &raw.return_data, name_or_index)?;
                Ok(ExecutionResult::Success {
                    output: SuccessOutput::StaticCall { value },
                })
            }
            (_, other) => Err(StrategyError::UnexpectedOutcome(format!(
                "{} received {:?}",
                self.future_id, other
            ))),
        }
    }
}

impl StrategyProcedure for BasicProcedure {
    fn resume(&mut self, outcome: Option<InteractionOutcome>) -> Result<StrategyStep, StrategyError> {
        match self.phase {
            Phase::Start => {
                if let Some(result) = self.immediate.take() {
                    self.phase = Phase::Finished;
                    return Ok(StrategyStep::Done(result));
                }
                let request = self.request.clone().ok_or_else(|| {
                    StrategyError::UnexpectedOutcome(format!("{} has nothing to do", self.future_id))
                })?;
                self.phase = Phase::Waiting;
                Ok(StrategyStep::Request(request))
            }
            Phase::Waiting => {
                let outcome = outcome.ok_or_else(|| {
                    StrategyError::UnexpectedOutcome(format!(
                        "{} was resumed without the outcome of its interaction",
                        self.future_id
                    ))
                })?;
                let result = self.complete(outcome)?;
                self.phase = Phase::Finished;
                Ok(StrategyStep::Done(result))
            }
            Phase::Finished => Err(StrategyError::UnexpectedOutcome(format!(
                "{} was resumed after it finished",
                self.future_id
            ))),
        }
    }
}
