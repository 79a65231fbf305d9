//! Inbound delivery: proven execution, trusted execution and retry.
//!
//! Every path ends in `deliver`, which writes the message's
//! status before the external call and settles it from the call's outcome. A
//! reverting or gas-exhausted callee is recorded as failed and does not abort
//! the operation.

use super::executor::{decode_revert_reason, CallExecutor, CallOutcome, ExecutionOutcome};
use super::{BridgeError, MessageBridge};
use crate::crypto::hash::keccak256;
use crate::events::Event;
use crate::oracle::ProofVerifier;
use crate::types::context::CallContext;
use crate::types::message::Message;
use alloy_primitives::B256;
use tracing::{debug, info, warn};

impl<O: ProofVerifier> MessageBridge<O> {
    /// Deliver `message` after checking its inclusion in the root finalized
    /// for `(message.source_chain_id, block_number)`.
    pub fn execute_message<E: CallExecutor>(
        &mut self,
        ctx: &CallContext,
        message: &Message,
        proof: &[B256],
        block_number: u64,
        executor: &mut E,
    ) -> Result<ExecutionOutcome, BridgeError> {
        let _guard = self.lock.try_enter().ok_or(BridgeError::Reentrant)?;
        self.check_not_paused()?;
        // A losing relayer in a race learns so before anything else is checked
        self.check_not_delivered(message)?;
        self.check_relayer(&ctx.caller)?;
        self.check_destination(message)?;

        let hash = message.hash();
        let leaf = keccak256(hash.as_slice());
        if !self
            .oracle
            .verify_proof(message.source_chain_id, block_number, proof, leaf)?
        {
            return Err(BridgeError::InvalidProof { hash });
        }

        Ok(self.deliver(ctx, message, hash, executor))
    }

    /// Deliver without a proof. Only allow-listed relayers, and only while the
    /// allow-list is enabled.
    pub fn execute_message_trusted<E: CallExecutor>(
        &mut self,
        ctx: &CallContext,
        message: &Message,
        executor: &mut E,
    ) -> Result<ExecutionOutcome, BridgeError> {
        let _guard = self.lock.try_enter().ok_or(BridgeError::Reentrant)?;
        self.check_not_paused()?;
        self.check_not_delivered(message)?;
        if !self.allow_list.permits_trusted(&ctx.caller) {
            return Err(BridgeError::UnauthorizedRelayer { caller: ctx.caller });
        }
        self.check_destination(message)?;

        let hash = message.hash();
        Ok(self.deliver(ctx, message, hash, executor))
    }

    /// Re-run a failed delivery. The proof was checked on the first attempt
    /// and is not required again.
    pub fn retry_message<E: CallExecutor>(
        &mut self,
        ctx: &CallContext,
        message: &Message,
        executor: &mut E,
    ) -> Result<ExecutionOutcome, BridgeError> {
        let _guard = self.lock.try_enter().ok_or(BridgeError::Reentrant)?;
        self.check_not_paused()?;
        self.check_relayer(&ctx.caller)?;

        let hash = message.hash();
        let retryable = self.delivered.get(&message.key()) == Some(&hash)
            && self
                .statuses
                .get(&hash)
                .is_some_and(|status| status.is_retryable());
        if !retryable {
            return Err(BridgeError::MessageNotFound { hash });
        }

        debug!(%hash, source_chain_id = message.source_chain_id, nonce = message.nonce, "Retrying message");
        Ok(self.deliver(ctx, message, hash, executor))
    }

    /// Any recorded attempt, successful or failed, closes the first-delivery
    /// paths for that `(source_chain_id, nonce)`; failures go through retry.
    fn check_not_delivered(&self, message: &Message) -> Result<(), BridgeError> {
        if self.delivered.contains_key(&message.key()) {
            return Err(BridgeError::MessageAlreadyExecuted {
                source_chain_id: message.source_chain_id,
                nonce: message.nonce,
            });
        }
        Ok(())
    }

    fn check_destination(&self, message: &Message) -> Result<(), BridgeError> {
        if message.dest_chain_id != self.chain_id {
            return Err(BridgeError::InvalidDestination {
                chain_id: message.dest_chain_id,
            });
        }
        Ok(())
    }

    fn deliver<E: CallExecutor>(
        &mut self,
        ctx: &CallContext,
        message: &Message,
        hash: B256,
        executor: &mut E,
    ) -> ExecutionOutcome {
        // Claim the message before handing control to the target
        self.delivered.insert(message.key(), hash);
        let status = self.statuses.entry(hash).or_default();
        status.attempts += 1;
        status.executed = true;
        status.failed = false;
        status.executed_at = ctx.timestamp;

        let gas_limit = message.gas_limit;
        let outcome = match executor.call(message.target, &message.call_input(), gas_limit) {
            CallOutcome::Success { gas_used, .. } | CallOutcome::Revert { gas_used, .. }
                if gas_used > gas_limit =>
            {
                Err((B256::ZERO, "out of gas".to_string()))
            }
            CallOutcome::Success { output, .. } => Ok(keccak256(&output)),
            CallOutcome::Revert { output, .. } => {
                Err((keccak256(&output), decode_revert_reason(&output)))
            }
            CallOutcome::OutOfGas => Err((B256::ZERO, "out of gas".to_string())),
        };

        let status = self.statuses.entry(hash).or_default();
        match outcome {
            Ok(result_hash) => {
                status.result_hash = result_hash;
                status.failure_reason = None;

                info!(
                    %hash,
                    source_chain_id = message.source_chain_id,
                    nonce = message.nonce,
                    target = %message.target,
                    "Message executed"
                );
                self.events.emit(Event::MessageExecuted {
                    hash,
                    source_chain_id: message.source_chain_id,
                    nonce: message.nonce,
                    result_hash,
                });
                ExecutionOutcome::Executed { result_hash }
            }
            Err((result_hash, reason)) => {
                status.executed = false;
                status.failed = true;
                status.result_hash = result_hash;
                status.failure_reason = Some(reason.clone());
                let attempts = status.attempts;

                warn!(
                    %hash,
                    source_chain_id = message.source_chain_id,
                    nonce = message.nonce,
                    attempts,
                    %reason,
                    "Message delivery failed"
                );
                self.events.emit(Event::MessageFailed {
                    hash,
                    source_chain_id: message.source_chain_id,
                    nonce: message.nonce,
                    reason: reason.clone(),
                });
                ExecutionOutcome::Failed { reason }
            }
        }
    }
}
