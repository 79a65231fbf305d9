//! Threshold-signed state roots and merkle proof verification against them.
//!
//! Validators attest `(chain_id, block_number, root)` tuples. Once enough
//! distinct active validators have signed the same tuple, the root is recorded
//! as finalized and proofs can be checked against it. A finalized record is
//! never mutated; `latest_finalized_block` only moves forward.

pub mod aggregation;
pub mod threshold;

pub use threshold::threshold_count;

use crate::access::Ownable;
use crate::config::{ConfigError, OracleConfig, BPS_DENOMINATOR};
use crate::crypto::sig::state_root_message_hash;
use crate::error::ErrorCategory;
use crate::events::{Event, EventLog};
use crate::merkle::{verify_indexed, verify_sorted};
use crate::registry::{ValidatorRegistry, ValidatorSet};
use crate::types::context::CallContext;
use crate::types::oracle::{PendingUpdate, StateRootRecord};
use alloy_primitives::{Address, B256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("Caller {caller} is not the oracle owner")]
    Unauthorized { caller: Address },

    #[error("{address} is not an active validator")]
    NotValidator { address: Address },

    #[error("Chain {chain_id} is not supported")]
    ChainNotSupported { chain_id: u64 },

    #[error("Chain {chain_id} is already supported")]
    ChainAlreadySupported { chain_id: u64 },

    #[error("Block {block_number} on chain {chain_id} is not after the latest finalized block {latest}")]
    InvalidBlockNumber {
        chain_id: u64,
        block_number: u64,
        latest: u64,
    },

    #[error("Signature does not recover to the calling validator {caller}")]
    InvalidSignature { caller: Address },

    #[error("{signer} has already signed update {update_id}")]
    AlreadySigned { update_id: B256, signer: Address },

    #[error("Update {update_id} stopped accepting signatures at {expired_at}")]
    UpdateExpired { update_id: B256, expired_at: u64 },

    #[error("Update {update_id} does not exist")]
    UpdateNotFound { update_id: B256 },

    #[error("Update {update_id} is already pending")]
    UpdateAlreadyExists { update_id: B256 },

    #[error("Update {update_id} has already been finalized")]
    UpdateAlreadyExecuted { update_id: B256 },

    #[error("Insufficient signatures: {valid} valid, {required} required")]
    InsufficientSignatures { valid: usize, required: usize },

    #[error("No finalized state root for block {block_number} on chain {chain_id}")]
    StateRootNotFinalized { chain_id: u64, block_number: u64 },

    #[error("Invalid oracle configuration: {0}")]
    InvalidConfiguration(String),
}

impl OracleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::NotValidator { .. } => ErrorCategory::Authorization,
            Self::ChainNotSupported { .. }
            | Self::InvalidBlockNumber { .. }
            | Self::InvalidConfiguration(_) => ErrorCategory::Validation,
            Self::InvalidSignature { .. }
            | Self::AlreadySigned { .. }
            | Self::UpdateExpired { .. }
            | Self::InsufficientSignatures { .. }
            | Self::StateRootNotFinalized { .. } => ErrorCategory::Consensus,
            Self::ChainAlreadySupported { .. }
            | Self::UpdateNotFound { .. }
            | Self::UpdateAlreadyExists { .. }
            | Self::UpdateAlreadyExecuted { .. } => ErrorCategory::State,
        }
    }
}

/// Checks inclusion proofs against finalized roots. The message bridge
/// depends on this seam rather than on the oracle type.
pub trait ProofVerifier {
    /// Sorted-pair keccak proof of `leaf` under the root finalized for
    /// `(chain_id, block_number)`.
    fn verify_proof(
        &self,
        chain_id: u64,
        block_number: u64,
        proof: &[B256],
        leaf: B256,
    ) -> Result<bool, OracleError>;
}

/// The state-root oracle, generic over where its active set comes from.
#[derive(Debug)]
pub struct BridgeOracle<V: ValidatorSet = ValidatorRegistry> {
    access: Ownable,
    validators: V,
    confirmation_blocks: u64,
    update_timeout: u64,
    threshold_bps: u32,
    supported_chains: Vec<u64>,
    records: HashMap<(u64, u64), StateRootRecord>,
    latest_block: HashMap<u64, u64>,
    latest_root: HashMap<u64, B256>,
    pending: HashMap<B256, PendingUpdate>,
    events: EventLog,
}

impl<V: ValidatorSet> BridgeOracle<V> {
    pub fn new(config: OracleConfig, validators: V) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut supported_chains = Vec::with_capacity(config.supported_chains.len());
        for chain_id in config.supported_chains {
            if !supported_chains.contains(&chain_id) {
                supported_chains.push(chain_id);
            }
        }
        Ok(Self {
            access: Ownable::new(config.owner),
            validators,
            confirmation_blocks: config.confirmation_blocks,
            update_timeout: config.update_timeout,
            threshold_bps: config.threshold_bps,
            supported_chains,
            records: HashMap::new(),
            latest_block: HashMap::new(),
            latest_root: HashMap::new(),
            pending: HashMap::new(),
            events: EventLog::default(),
        })
    }

    /// Pending-update key: `keccak256(chain_id ‖ block_number ‖ root)` with
    /// both integers as 32-byte big-endian words.
    pub fn update_id(chain_id: u64, block_number: u64, root: &B256) -> B256 {
        state_root_message_hash(chain_id, block_number, root)
    }

    fn check_owner(&self, caller: &Address) -> Result<(), OracleError> {
        if !self.access.is_owner(caller) {
            return Err(OracleError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn check_validator(&self, address: &Address) -> Result<(), OracleError> {
        if !self.validators.is_active(address) {
            return Err(OracleError::NotValidator { address: *address });
        }
        Ok(())
    }

    fn check_chain(&self, chain_id: u64) -> Result<(), OracleError> {
        if !self.is_chain_supported(chain_id) {
            return Err(OracleError::ChainNotSupported { chain_id });
        }
        Ok(())
    }

    fn check_block_advances(&self, chain_id: u64, block_number: u64) -> Result<(), OracleError> {
        let latest = self.latest_finalized_block(chain_id);
        if block_number <= latest {
            return Err(OracleError::InvalidBlockNumber {
                chain_id,
                block_number,
                latest,
            });
        }
        Ok(())
    }

    // --- Governance ---

    pub fn add_chain(&mut self, ctx: &CallContext, chain_id: u64) -> Result<(), OracleError> {
        self.check_owner(&ctx.caller)?;
        if chain_id == 0 {
            return Err(OracleError::InvalidConfiguration(
                "chain id 0 is reserved".into(),
            ));
        }
        if self.is_chain_supported(chain_id) {
            return Err(OracleError::ChainAlreadySupported { chain_id });
        }
        self.supported_chains.push(chain_id);
        info!(chain_id, "Chain added");
        self.events.emit(Event::ChainAdded { chain_id });
        Ok(())
    }

    /// Stop accepting new roots for `chain_id`. Finalized records stay
    /// readable and provable.
    pub fn remove_chain(&mut self, ctx: &CallContext, chain_id: u64) -> Result<(), OracleError> {
        self.check_owner(&ctx.caller)?;
        self.check_chain(chain_id)?;
        self.supported_chains.retain(|c| *c != chain_id);
        info!(chain_id, "Chain removed");
        self.events.emit(Event::ChainRemoved { chain_id });
        Ok(())
    }

    pub fn set_configuration(
        &mut self,
        ctx: &CallContext,
        confirmation_blocks: u64,
        update_timeout: u64,
        threshold_bps: u32,
    ) -> Result<(), OracleError> {
        self.check_owner(&ctx.caller)?;
        if threshold_bps == 0 || threshold_bps > BPS_DENOMINATOR {
            return Err(OracleError::InvalidConfiguration(format!(
                "threshold {} bps is outside 1..={}",
                threshold_bps, BPS_DENOMINATOR
            )));
        }
        if update_timeout == 0 {
            return Err(OracleError::InvalidConfiguration(
                "update timeout must be non-zero".into(),
            ));
        }

        self.confirmation_blocks = confirmation_blocks;
        self.update_timeout = update_timeout;
        self.threshold_bps = threshold_bps;

        info!(confirmation_blocks, update_timeout, threshold_bps, "Oracle configuration updated");
        self.events.emit(Event::OracleConfigurationUpdated {
            confirmation_blocks,
            update_timeout,
            threshold_bps,
        });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> Result<(), OracleError> {
        self.check_owner(&ctx.caller)?;
        let previous_owner = self.access.owner();
        self.access.transfer(new_owner);
        self.events.emit(Event::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    /// Drop unfinalized updates that can no longer be signed. Returns how many
    /// were removed.
    pub fn prune_expired_updates(&mut self, now: u64) -> usize {
        let timeout = self.update_timeout;
        let before = self.pending.len();
        self.pending
            .retain(|_, update| update.executed || !update.is_expired(now, timeout));
        let pruned = before - self.pending.len();
        if pruned > 0 {
            info!(pruned, "Pruned expired state root updates");
        }
        pruned
    }

    // --- Proof verification ---

    fn finalized_root(&self, chain_id: u64, block_number: u64) -> Result<B256, OracleError> {
        self.records
            .get(&(chain_id, block_number))
            .filter(|record| record.finalized)
            .map(|record| record.root)
            .ok_or(OracleError::StateRootNotFinalized {
                chain_id,
                block_number,
            })
    }

    /// Sorted-pair proof of `leaf` under the root finalized for
    /// `(chain_id, block_number)`.
    pub fn verify_proof(
        &self,
        chain_id: u64,
        block_number: u64,
        proof: &[B256],
        leaf: B256,
    ) -> Result<bool, OracleError> {
        let root = self.finalized_root(chain_id, block_number)?;
        Ok(verify_sorted(proof, &root, leaf))
    }

    /// Positional proof: bit `i` of `index` set means the running hash is the
    /// right child at level `i`.
    pub fn verify_proof_with_index(
        &self,
        chain_id: u64,
        block_number: u64,
        proof: &[B256],
        leaf: B256,
        index: u64,
    ) -> Result<bool, OracleError> {
        let root = self.finalized_root(chain_id, block_number)?;
        Ok(verify_indexed(proof, &root, leaf, index))
    }

    /// Sorted-pair proof against the most recently finalized root of `chain_id`.
    pub fn verify_proof_latest(&self, chain_id: u64, proof: &[B256], leaf: B256) -> Result<bool, OracleError> {
        let root = self
            .latest_state_root(chain_id)
            .ok_or(OracleError::StateRootNotFinalized {
                chain_id,
                block_number: self.latest_finalized_block(chain_id),
            })?;
        Ok(verify_sorted(proof, &root, leaf))
    }

    // --- Reads ---

    pub fn state_root(&self, chain_id: u64, block_number: u64) -> Option<&StateRootRecord> {
        self.records.get(&(chain_id, block_number))
    }

    pub fn latest_state_root(&self, chain_id: u64) -> Option<B256> {
        self.latest_root.get(&chain_id).copied()
    }

    /// Zero until the first root for `chain_id` finalizes.
    pub fn latest_finalized_block(&self, chain_id: u64) -> u64 {
        self.latest_block.get(&chain_id).copied().unwrap_or(0)
    }

    pub fn is_finalized(&self, chain_id: u64, block_number: u64) -> bool {
        self.records
            .get(&(chain_id, block_number))
            .is_some_and(|record| record.finalized)
    }

    pub fn pending_update(&self, update_id: &B256) -> Option<&PendingUpdate> {
        self.pending.get(update_id)
    }

    pub fn supported_chains(&self) -> &[u64] {
        &self.supported_chains
    }

    pub fn is_chain_supported(&self, chain_id: u64) -> bool {
        self.supported_chains.contains(&chain_id)
    }

    pub fn required_signatures(&self) -> usize {
        threshold_count(self.validators.active_validator_count(), self.threshold_bps)
    }

    /// Has `block_number` reached `confirmation_blocks` depth given the
    /// source chain's current head?
    pub fn is_block_mature(&self, block_number: u64, source_head: u64) -> bool {
        source_head >= block_number.saturating_add(self.confirmation_blocks)
    }

    pub fn confirmation_blocks(&self) -> u64 {
        self.confirmation_blocks
    }

    pub fn update_timeout(&self) -> u64 {
        self.update_timeout
    }

    pub fn threshold_bps(&self) -> u32 {
        self.threshold_bps
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn validators(&self) -> &V {
        &self.validators
    }

    pub fn validators_mut(&mut self) -> &mut V {
        &mut self.validators
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }
}

impl<V: ValidatorSet> ProofVerifier for BridgeOracle<V> {
    fn verify_proof(
        &self,
        chain_id: u64,
        block_number: u64,
        proof: &[B256],
        leaf: B256,
    ) -> Result<bool, OracleError> {
        BridgeOracle::verify_proof(self, chain_id, block_number, proof, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::{MerkleScheme, MerkleTree};
    use std::collections::HashSet;

    const OWNER: Address = Address::repeat_byte(0xEE);

    /// Fixed active set for exercising the oracle without a registry.
    #[derive(Debug, Default)]
    struct StaticSet {
        active: HashSet<Address>,
    }

    impl ValidatorSet for StaticSet {
        fn is_active(&self, validator: &Address) -> bool {
            self.active.contains(validator)
        }

        fn active_validator_count(&self) -> usize {
            self.active.len()
        }

        fn record_activity(&mut self, _validator: &Address, _timestamp: u64) {}
    }

    fn oracle(active: usize) -> BridgeOracle<StaticSet> {
        let mut config = OracleConfig::new(OWNER);
        config.supported_chains = vec![31337];
        let set = StaticSet {
            active: (1..=active as u8).map(Address::repeat_byte).collect(),
        };
        BridgeOracle::new(config, set).unwrap()
    }

    fn owner() -> CallContext {
        CallContext::new(OWNER, 0)
    }

    #[test]
    fn test_required_signatures_follows_active_set() {
        let mut oracle = oracle(3);
        assert_eq!(oracle.required_signatures(), 3);
        oracle.set_configuration(&owner(), 12, 3_600, 5_000).unwrap();
        assert_eq!(oracle.required_signatures(), 2);
        oracle.validators_mut().active.clear();
        assert_eq!(oracle.required_signatures(), 1);
    }

    #[test]
    fn test_set_configuration_rejects_bad_threshold() {
        let mut oracle = oracle(1);
        assert!(matches!(
            oracle.set_configuration(&owner(), 12, 3_600, 0),
            Err(OracleError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            oracle.set_configuration(&owner(), 12, 3_600, 10_001),
            Err(OracleError::InvalidConfiguration(_))
        ));
        assert_eq!(oracle.threshold_bps(), 6_667);
    }

    #[test]
    fn test_chain_admin_is_owner_only() {
        let mut oracle = oracle(1);
        let stranger = CallContext::new(Address::repeat_byte(0x99), 0);
        assert!(matches!(
            oracle.add_chain(&stranger, 5),
            Err(OracleError::Unauthorized { .. })
        ));

        oracle.add_chain(&owner(), 5).unwrap();
        assert_eq!(oracle.supported_chains(), &[31337, 5]);
        assert_eq!(
            oracle.add_chain(&owner(), 5),
            Err(OracleError::ChainAlreadySupported { chain_id: 5 })
        );

        oracle.remove_chain(&owner(), 31337).unwrap();
        assert!(!oracle.is_chain_supported(31337));
        assert_eq!(
            oracle.remove_chain(&owner(), 31337),
            Err(OracleError::ChainNotSupported { chain_id: 31337 })
        );
    }

    #[test]
    fn test_verify_proof_requires_finalized_root() {
        let oracle = oracle(1);
        assert_eq!(
            oracle.verify_proof(31337, 10, &[], B256::ZERO),
            Err(OracleError::StateRootNotFinalized {
                chain_id: 31337,
                block_number: 10
            })
        );
        assert!(oracle.verify_proof_latest(31337, &[], B256::ZERO).is_err());
    }

    #[test]
    fn test_proofs_against_finalized_root() {
        let mut oracle = oracle(1);
        let leaves: Vec<B256> = (0u8..5).map(B256::repeat_byte).collect();
        let sorted = MerkleTree::build(leaves.clone(), MerkleScheme::SortedPair).unwrap();
        oracle.finalize(31337, 100, sorted.root(), 1, 0);

        let proof = sorted.proof(3).unwrap();
        assert_eq!(oracle.verify_proof(31337, 100, &proof, leaves[3]), Ok(true));
        assert_eq!(oracle.verify_proof_latest(31337, &proof, leaves[3]), Ok(true));
        assert_eq!(oracle.verify_proof(31337, 100, &proof, leaves[2]), Ok(false));

        let mut tampered = proof.clone();
        tampered[0].0[0] ^= 0x01;
        assert_eq!(oracle.verify_proof(31337, 100, &tampered, leaves[3]), Ok(false));

        let indexed = MerkleTree::build(leaves.clone(), MerkleScheme::Indexed).unwrap();
        oracle.finalize(31337, 101, indexed.root(), 1, 0);
        let proof = indexed.proof(3).unwrap();
        assert_eq!(
            oracle.verify_proof_with_index(31337, 101, &proof, leaves[3], 3),
            Ok(true)
        );
        assert_eq!(
            oracle.verify_proof_with_index(31337, 101, &proof, leaves[3], 2),
            Ok(false)
        );
    }

    #[test]
    fn test_block_maturity() {
        let oracle = oracle(1);
        assert!(!oracle.is_block_mature(100, 111));
        assert!(oracle.is_block_mature(100, 112));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            OracleError::InsufficientSignatures { valid: 0, required: 1 }.category(),
            ErrorCategory::Consensus
        );
        assert_eq!(
            OracleError::NotValidator { address: Address::ZERO }.category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            OracleError::InvalidSignature { caller: Address::ZERO }.category(),
            ErrorCategory::Consensus
        );
    }
}
