//! Signature aggregation and finalization.
//!
//! Two paths reach the same record: validators sign a pending update one at a
//! time, or anyone submits a pre-assembled batch. Aggregation is idempotent
//! per signer and independent of arrival order; each update finalizes once.

use super::{BridgeOracle, OracleError};
use crate::crypto::sig::{recover_signer, state_root_digest, EcdsaSignature};
use crate::events::Event;
use crate::registry::ValidatorSet;
use crate::types::context::CallContext;
use crate::types::oracle::{PendingUpdate, StateRootRecord};
use alloy_primitives::{Address, B256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

impl<V: ValidatorSet> BridgeOracle<V> {
    /// Open a pending update for `(chain_id, block_number, root)` carrying the
    /// caller's signature. Returns the update id.
    ///
    /// An expired update for the same tuple is replaced; a live one is
    /// [`OracleError::UpdateAlreadyExists`].
    pub fn propose_state_root(
        &mut self,
        ctx: &CallContext,
        chain_id: u64,
        block_number: u64,
        root: B256,
        signature: &EcdsaSignature,
    ) -> Result<B256, OracleError> {
        let proposer = ctx.caller;

        // 1. Role, chain and freshness
        self.check_validator(&proposer)?;
        self.check_chain(chain_id)?;
        self.check_block_advances(chain_id, block_number)?;

        // 2. One live proposal per tuple
        let update_id = Self::update_id(chain_id, block_number, &root);
        if let Some(existing) = self.pending.get(&update_id) {
            if !existing.is_expired(ctx.timestamp, self.update_timeout) {
                return Err(OracleError::UpdateAlreadyExists { update_id });
            }
        }

        // 3. The signature must come from the caller
        self.check_signature(&proposer, chain_id, block_number, &root, signature)?;

        let mut update = PendingUpdate::new(update_id, chain_id, block_number, root, proposer, ctx.timestamp);
        update.add_signer(proposer);
        self.pending.insert(update_id, update);
        self.validators.record_activity(&proposer, ctx.timestamp);

        debug!(%update_id, chain_id, block_number, %root, %proposer, "State root proposed");
        self.events.emit(Event::StateRootProposed {
            update_id,
            chain_id,
            block_number,
            root,
            proposer,
        });
        self.events.emit(Event::StateRootSigned {
            update_id,
            signer: proposer,
            signatures: 1,
        });

        self.finalize_if_ready(&update_id, ctx.timestamp);
        Ok(update_id)
    }

    /// Add the caller's signature to a pending update. Returns true if this
    /// signature finalized it.
    pub fn sign_state_root(
        &mut self,
        ctx: &CallContext,
        update_id: B256,
        signature: &EcdsaSignature,
    ) -> Result<bool, OracleError> {
        let signer = ctx.caller;
        self.check_validator(&signer)?;

        let (chain_id, block_number, root) = self.signable_update(&update_id, ctx.timestamp)?;
        if self
            .pending
            .get(&update_id)
            .is_some_and(|update| update.has_signed(&signer))
        {
            return Err(OracleError::AlreadySigned { update_id, signer });
        }
        self.check_signature(&signer, chain_id, block_number, &root, signature)?;

        let signatures = match self.pending.get_mut(&update_id) {
            Some(update) => {
                update.add_signer(signer);
                update.signature_count() as u32
            }
            None => return Err(OracleError::UpdateNotFound { update_id }),
        };
        self.validators.record_activity(&signer, ctx.timestamp);

        debug!(%update_id, %signer, signatures, "State root signed");
        self.events.emit(Event::StateRootSigned {
            update_id,
            signer,
            signatures,
        });

        Ok(self.finalize_if_ready(&update_id, ctx.timestamp))
    }

    /// Re-run the threshold check on a pending update, e.g. after the active
    /// set shrank or the threshold was lowered. Callable by anyone.
    pub fn try_finalize(&mut self, ctx: &CallContext, update_id: B256) -> Result<bool, OracleError> {
        self.signable_update(&update_id, ctx.timestamp)?;
        Ok(self.finalize_if_ready(&update_id, ctx.timestamp))
    }

    /// Finalize from a pre-assembled signature set. Unrecoverable signatures,
    /// signatures from inactive validators and repeated signers are discarded.
    /// Returns the number of distinct signers that backed the root.
    pub fn submit_threshold_signature(
        &mut self,
        ctx: &CallContext,
        chain_id: u64,
        block_number: u64,
        root: B256,
        signatures: &[EcdsaSignature],
    ) -> Result<usize, OracleError> {
        self.check_chain(chain_id)?;
        self.check_block_advances(chain_id, block_number)?;

        let digest = state_root_digest(chain_id, block_number, &root);
        let mut seen = HashSet::with_capacity(signatures.len());
        let mut signers = Vec::with_capacity(signatures.len());
        for (index, signature) in signatures.iter().enumerate() {
            let signer = match recover_signer(&digest, signature) {
                Ok(signer) => signer,
                Err(err) => {
                    warn!(chain_id, block_number, index, error = %err, "Discarding unrecoverable signature");
                    continue;
                }
            };
            if !self.validators.is_active(&signer) {
                warn!(chain_id, block_number, index, %signer, "Discarding signature from inactive validator");
                continue;
            }
            if !seen.insert(signer) {
                debug!(chain_id, block_number, index, %signer, "Discarding duplicate signer");
                continue;
            }
            signers.push(signer);
        }

        let required = self.required_signatures();
        if signers.len() < required {
            return Err(OracleError::InsufficientSignatures {
                valid: signers.len(),
                required,
            });
        }

        for signer in &signers {
            self.validators.record_activity(signer, ctx.timestamp);
        }
        let update_id = Self::update_id(chain_id, block_number, &root);
        if let Some(update) = self.pending.get_mut(&update_id) {
            update.executed = true;
        }
        self.finalize(chain_id, block_number, root, signers.len() as u32, ctx.timestamp);
        Ok(signers.len())
    }

    /// Write a finalized record and advance the chain's latest pointers.
    pub(crate) fn finalize(
        &mut self,
        chain_id: u64,
        block_number: u64,
        root: B256,
        confirmations: u32,
        timestamp: u64,
    ) {
        self.records.insert(
            (chain_id, block_number),
            StateRootRecord {
                chain_id,
                block_number,
                root,
                confirmations,
                finalized: true,
                timestamp,
            },
        );

        let latest = self.latest_block.entry(chain_id).or_insert(0);
        if block_number > *latest {
            *latest = block_number;
            self.latest_root.insert(chain_id, root);
        }

        info!(chain_id, block_number, %root, confirmations, "State root finalized");
        self.events.emit(Event::StateRootFinalized {
            chain_id,
            block_number,
            root,
            confirmations,
        });
    }

    /// The tuple of a pending update that may still gather signatures.
    fn signable_update(&self, update_id: &B256, now: u64) -> Result<(u64, u64, B256), OracleError> {
        let update = self
            .pending
            .get(update_id)
            .ok_or(OracleError::UpdateNotFound { update_id: *update_id })?;
        if update.executed {
            return Err(OracleError::UpdateAlreadyExecuted { update_id: *update_id });
        }
        if update.is_expired(now, self.update_timeout) {
            return Err(OracleError::UpdateExpired {
                update_id: *update_id,
                expired_at: update.expires_at(self.update_timeout),
            });
        }
        // Another root may have finalized this height or a later one meanwhile
        self.check_block_advances(update.chain_id, update.block_number)?;
        Ok((update.chain_id, update.block_number, update.root))
    }

    fn check_signature(
        &self,
        caller: &Address,
        chain_id: u64,
        block_number: u64,
        root: &B256,
        signature: &EcdsaSignature,
    ) -> Result<(), OracleError> {
        let digest = state_root_digest(chain_id, block_number, root);
        match recover_signer(&digest, signature) {
            Ok(signer) if signer == *caller => Ok(()),
            Ok(signer) => {
                debug!(%caller, %signer, "Signature recovered to a different address");
                Err(OracleError::InvalidSignature { caller: *caller })
            }
            Err(err) => {
                debug!(%caller, error = %err, "Signature recovery failed");
                Err(OracleError::InvalidSignature { caller: *caller })
            }
        }
    }

    fn finalize_if_ready(&mut self, update_id: &B256, now: u64) -> bool {
        let required = self.required_signatures();
        let Some(update) = self.pending.get_mut(update_id) else {
            return false;
        };
        if update.executed || update.signature_count() < required {
            return false;
        }
        update.executed = true;
        let (chain_id, block_number, root) = (update.chain_id, update.block_number, update.root);
        let confirmations = update.signature_count() as u32;

        self.finalize(chain_id, block_number, root, confirmations, now);
        true
    }
}
