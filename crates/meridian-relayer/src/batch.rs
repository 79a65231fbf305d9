//! Outbound message batches and their inclusion proofs.
//!
//! The source chain commits to a batch of sent messages as a sorted-pair
//! keccak merkle tree over `keccak256(message_hash)` leaves. Once validators
//! finalize that root on the destination, each message is delivered with its
//! branch from [`OutboundBatch::delivery`].

use crate::error::RelayerError;
use alloy_primitives::B256;
use meridian_core::oracle::ProofVerifier;
use meridian_core::{Message, MerkleScheme, MerkleTree, MessageBridge};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Everything a relayer needs to deliver one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message: Message,
    pub proof: Vec<B256>,
    /// Source block whose finalized root commits to the batch.
    pub block_number: u64,
}

impl Delivery {
    pub fn hash(&self) -> B256 {
        self.message.hash()
    }
}

#[derive(Clone, Debug)]
pub struct OutboundBatch {
    source_chain_id: u64,
    messages: Vec<Message>,
    tree: MerkleTree,
}

impl OutboundBatch {
    /// Build a batch from messages that share a source chain, in the given
    /// order.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, RelayerError> {
        let first = messages.first().ok_or(RelayerError::EmptyBatch)?;
        let source_chain_id = first.source_chain_id;
        if let Some(other) = messages
            .iter()
            .find(|message| message.source_chain_id != source_chain_id)
        {
            return Err(RelayerError::MixedSourceChains {
                expected: source_chain_id,
                found: other.source_chain_id,
            });
        }

        let leaves = messages.iter().map(Message::leaf).collect();
        let tree = MerkleTree::build(leaves, MerkleScheme::SortedPair)?;
        Ok(Self {
            source_chain_id,
            messages,
            tree,
        })
    }

    /// Collect the messages a source-side bridge sent with the given nonces.
    pub fn from_bridge<O: ProofVerifier>(
        bridge: &MessageBridge<O>,
        nonces: Range<u64>,
    ) -> Result<Self, RelayerError> {
        let messages = nonces
            .map(|nonce| {
                bridge
                    .sent_message(nonce)
                    .cloned()
                    .ok_or(RelayerError::NonceNotSent { nonce })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_messages(messages)
    }

    /// The root validators attest to.
    pub fn root(&self) -> B256 {
        self.tree.root()
    }

    pub fn source_chain_id(&self) -> u64 {
        self.source_chain_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn proof(&self, hash: &B256) -> Result<Vec<B256>, RelayerError> {
        let index = self
            .messages
            .iter()
            .position(|message| message.hash() == *hash)
            .ok_or(RelayerError::MessageNotInBatch { hash: *hash })?;
        Ok(self.tree.proof(index)?)
    }

    /// The delivery for one message, against the root finalized at
    /// `block_number`.
    pub fn delivery(&self, hash: &B256, block_number: u64) -> Result<Delivery, RelayerError> {
        let proof = self.proof(hash)?;
        let message = self
            .messages
            .iter()
            .find(|message| message.hash() == *hash)
            .cloned()
            .ok_or(RelayerError::MessageNotInBatch { hash: *hash })?;
        Ok(Delivery {
            message,
            proof,
            block_number,
        })
    }

    pub fn deliveries(&self, block_number: u64) -> Result<Vec<Delivery>, RelayerError> {
        self.messages
            .iter()
            .enumerate()
            .map(|(index, message)| -> Result<Delivery, RelayerError> {
                Ok(Delivery {
                    message: message.clone(),
                    proof: self.tree.proof(index)?,
                    block_number,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};
    use meridian_core::merkle::verify_sorted;
    use meridian_core::{BridgeConfig, BridgeOracle, CallContext, OracleConfig, RegistryConfig, ValidatorRegistry};

    const OWNER: Address = Address::repeat_byte(0xEE);

    fn source_bridge(sends: u8) -> MessageBridge {
        let registry = ValidatorRegistry::new(RegistryConfig::new(OWNER)).unwrap();
        let oracle = BridgeOracle::new(OracleConfig::new(OWNER), registry).unwrap();
        let mut bridge = MessageBridge::new(BridgeConfig::new(OWNER, 31337), oracle).unwrap();
        let fee = bridge.estimate_fee(5, 0).unwrap();
        for n in 0..sends {
            let ctx = CallContext::new(Address::repeat_byte(n + 1), 10).with_value(fee);
            bridge
                .send_message(&ctx, 5, Address::repeat_byte(0x22), Bytes::from(vec![n]), 0)
                .unwrap();
        }
        bridge
    }

    #[test]
    fn test_batch_from_bridge_proves_every_message() {
        let bridge = source_bridge(5);
        let batch = OutboundBatch::from_bridge(&bridge, 0..5).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.source_chain_id(), 31337);

        for delivery in batch.deliveries(900).unwrap() {
            assert_eq!(delivery.block_number, 900);
            assert!(verify_sorted(&delivery.proof, &batch.root(), delivery.message.leaf()));
            assert_eq!(batch.delivery(&delivery.hash(), 900).unwrap(), delivery);
        }
    }

    #[test]
    fn test_unsent_nonce_is_rejected() {
        let bridge = source_bridge(2);
        assert_eq!(
            OutboundBatch::from_bridge(&bridge, 0..3).unwrap_err(),
            RelayerError::NonceNotSent { nonce: 2 }
        );
        assert_eq!(
            OutboundBatch::from_bridge(&bridge, 0..0).unwrap_err(),
            RelayerError::EmptyBatch
        );
    }

    #[test]
    fn test_mixed_source_chains_are_rejected() {
        let bridge = source_bridge(2);
        let mut messages: Vec<Message> = (0..2).map(|n| bridge.sent_message(n).unwrap().clone()).collect();
        messages[1].source_chain_id = 1;
        assert_eq!(
            OutboundBatch::from_messages(messages).unwrap_err(),
            RelayerError::MixedSourceChains {
                expected: 31337,
                found: 1
            }
        );
    }

    #[test]
    fn test_foreign_message_has_no_proof() {
        let bridge = source_bridge(3);
        let batch = OutboundBatch::from_bridge(&bridge, 0..2).unwrap();
        let outside = bridge.sent_message_hash(2).unwrap();
        assert_eq!(
            batch.proof(&outside).unwrap_err(),
            RelayerError::MessageNotInBatch { hash: outside }
        );
    }

    #[test]
    fn test_single_message_batch_root_is_its_leaf() {
        let bridge = source_bridge(1);
        let batch = OutboundBatch::from_bridge(&bridge, 0..1).unwrap();
        let message = &batch.messages()[0];
        assert_eq!(batch.root(), message.leaf());
        assert!(batch.proof(&message.hash()).unwrap().is_empty());
    }
}
