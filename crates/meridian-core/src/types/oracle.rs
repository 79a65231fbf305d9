use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A state root the committee has agreed on for `(chain_id, block_number)`.
///
/// Created already finalized at the moment quorum is reached and never mutated
/// afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRootRecord {
    pub chain_id: u64,
    pub block_number: u64,
    pub root: B256,
    /// Distinct signers that backed the root when it finalized.
    pub confirmations: u32,
    pub finalized: bool,
    pub timestamp: u64,
}

/// Signatures being gathered for one `(chain_id, block_number, root)` tuple.
///
/// Invariant: `signers` has no duplicates. It is the only record of who
/// signed, so a deserialized update still rejects repeat signers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub id: B256,
    pub chain_id: u64,
    pub block_number: u64,
    pub root: B256,
    pub proposer: Address,
    pub proposed_at: u64,
    pub signers: Vec<Address>,
    pub executed: bool,
}

impl PendingUpdate {
    pub fn new(
        id: B256,
        chain_id: u64,
        block_number: u64,
        root: B256,
        proposer: Address,
        proposed_at: u64,
    ) -> Self {
        Self {
            id,
            chain_id,
            block_number,
            root,
            proposer,
            proposed_at,
            signers: Vec::new(),
            executed: false,
        }
    }

    /// Record a signer. Returns false if the address already signed.
    pub fn add_signer(&mut self, signer: Address) -> bool {
        if self.has_signed(&signer) {
            return false;
        }
        self.signers.push(signer);
        true
    }

    pub fn has_signed(&self, signer: &Address) -> bool {
        self.signers.contains(signer)
    }

    pub fn signature_count(&self) -> usize {
        self.signers.len()
    }

    /// The last timestamp at which the update still accepts signatures.
    pub fn expires_at(&self, update_timeout: u64) -> u64 {
        self.proposed_at.saturating_add(update_timeout)
    }

    pub fn is_expired(&self, now: u64, update_timeout: u64) -> bool {
        now > self.expires_at(update_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> PendingUpdate {
        PendingUpdate::new(B256::ZERO, 1, 10, B256::repeat_byte(1), Address::ZERO, 100)
    }

    #[test]
    fn test_add_signer_is_idempotent() {
        let mut u = update();
        let a = Address::repeat_byte(0xA);
        assert!(u.add_signer(a));
        assert!(!u.add_signer(a));
        assert_eq!(u.signature_count(), 1);
        assert!(u.has_signed(&a));
    }

    #[test]
    fn test_signer_dedup_survives_serde_round_trip() {
        let mut u = update();
        let a = Address::repeat_byte(0xA);
        assert!(u.add_signer(a));

        let json = serde_json::to_string(&u).unwrap();
        let mut restored: PendingUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, u);
        assert!(restored.has_signed(&a));
        assert!(!restored.add_signer(a));
        assert_eq!(restored.signature_count(), 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let u = update();
        // now == proposed_at + timeout is still signable
        assert!(!u.is_expired(160, 60));
        assert!(u.is_expired(161, 60));
    }
}
