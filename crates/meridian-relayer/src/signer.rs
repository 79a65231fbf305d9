//! Validator attestation of source-chain state roots.
//!
//! A [`ValidatorAgent`] wraps whatever holds the validator's key and turns
//! "I observed root R at block N" into the right oracle call: a proposal if no
//! live update exists for that root, a co-signature if one does.

use crate::error::RelayerError;
use alloy_primitives::{Address, B256};
use meridian_core::registry::ValidatorSet;
use meridian_core::{BridgeOracle, CallContext, CryptoError, EcdsaSignature, ValidatorKey};
use tracing::{debug, info};

/// Anything that can produce a validator's state-root signature.
pub trait SigningService {
    fn address(&self) -> Address;

    fn sign_state_root(
        &self,
        chain_id: u64,
        block_number: u64,
        root: &B256,
    ) -> Result<EcdsaSignature, CryptoError>;
}

impl SigningService for ValidatorKey {
    fn address(&self) -> Address {
        ValidatorKey::address(self)
    }

    fn sign_state_root(
        &self,
        chain_id: u64,
        block_number: u64,
        root: &B256,
    ) -> Result<EcdsaSignature, CryptoError> {
        ValidatorKey::sign_state_root(self, chain_id, block_number, root)
    }
}

/// What [`ValidatorAgent::attest`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attestation {
    /// Opened a new pending update.
    Proposed { update_id: B256, finalized: bool },
    /// Added a signature to an existing pending update.
    Signed { update_id: B256, finalized: bool },
    /// This validator already signed the live update.
    AlreadySigned { update_id: B256 },
    /// The block is already finalized; nothing to do.
    AlreadyFinalized,
    /// The source head is not yet `confirmation_blocks` past the block.
    NotMature { block_number: u64, source_head: u64 },
}

pub struct ValidatorAgent<S> {
    signer: S,
}

impl<S: SigningService> ValidatorAgent<S> {
    pub fn new(signer: S) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Attest `root` at `(chain_id, block_number)` given the observed source
    /// head, proposing or co-signing as the oracle's pending state requires.
    pub fn attest<V: ValidatorSet>(
        &self,
        oracle: &mut BridgeOracle<V>,
        chain_id: u64,
        block_number: u64,
        root: B256,
        source_head: u64,
        now: u64,
    ) -> Result<Attestation, RelayerError> {
        if !oracle.is_block_mature(block_number, source_head) {
            debug!(chain_id, block_number, source_head, "Block not yet mature");
            return Ok(Attestation::NotMature {
                block_number,
                source_head,
            });
        }
        if oracle.is_finalized(chain_id, block_number) {
            return Ok(Attestation::AlreadyFinalized);
        }

        let me = self.signer.address();
        let ctx = CallContext::new(me, now);
        let update_id = BridgeOracle::<V>::update_id(chain_id, block_number, &root);
        let live = oracle
            .pending_update(&update_id)
            .filter(|update| !update.executed && !update.is_expired(now, oracle.update_timeout()))
            .map(|update| update.has_signed(&me));

        let signature = match live {
            Some(true) => return Ok(Attestation::AlreadySigned { update_id }),
            _ => self.signer.sign_state_root(chain_id, block_number, &root)?,
        };

        let attestation = if live.is_some() {
            let finalized = oracle.sign_state_root(&ctx, update_id, &signature)?;
            Attestation::Signed {
                update_id,
                finalized,
            }
        } else {
            oracle.propose_state_root(&ctx, chain_id, block_number, root, &signature)?;
            Attestation::Proposed {
                update_id,
                finalized: oracle.is_finalized(chain_id, block_number),
            }
        };

        info!(chain_id, block_number, %root, validator = %me, ?attestation, "State root attested");
        Ok(attestation)
    }
}
