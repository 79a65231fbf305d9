use crate::crypto::hash::{address_word, keccak256, keccak256_concat, u64_word};
use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// A cross-chain execution request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Per-bridge-instance outbound sequence number on the source chain.
    pub nonce: u64,
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub sender: Address,
    pub target: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub timestamp: u64,
}

impl Message {
    /// Content hash identifying this message.
    ///
    /// Every field is laid out as a 32-byte word; the payload enters through
    /// its own keccak256 so the preimage has a fixed length:
    ///
    /// ```text
    /// keccak256(nonce ‖ source ‖ dest ‖ sender ‖ target ‖ keccak256(data) ‖ gas_limit ‖ timestamp)
    /// ```
    pub fn hash(&self) -> B256 {
        let data_hash = keccak256(&self.data);
        keccak256_concat(&[
            &u64_word(self.nonce),
            &u64_word(self.source_chain_id),
            &u64_word(self.dest_chain_id),
            &address_word(&self.sender),
            &address_word(&self.target),
            data_hash.as_slice(),
            &u64_word(self.gas_limit),
            &u64_word(self.timestamp),
        ])
    }

    /// The merkle leaf committing to this message in a source-chain state root:
    /// the keccak256 of its content hash.
    pub fn leaf(&self) -> B256 {
        keccak256(self.hash().as_slice())
    }

    /// Identity of the message on the destination chain.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            source_chain_id: self.source_chain_id,
            nonce: self.nonce,
        }
    }

    /// Calldata handed to the target: the payload followed by the 20-byte
    /// original sender, so the callee can authenticate the true origin.
    pub fn call_input(&self) -> Bytes {
        let mut input = Vec::with_capacity(self.data.len() + 20);
        input.extend_from_slice(&self.data);
        input.extend_from_slice(self.sender.as_slice());
        input.into()
    }
}

/// Inbound tracking key `(source_chain_id, nonce)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey {
    pub source_chain_id: u64,
    pub nonce: u64,
}

/// Delivery state of a message.
///
/// Transitions: `sent` → {`executed` | `failed`}; `failed` → {`executed` |
/// `failed`} via retry. `executed` is terminal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatus {
    pub sent: bool,
    pub executed: bool,
    pub failed: bool,
    pub executed_at: u64,
    /// keccak256 of the callee's return data (success) or revert data (failure).
    pub result_hash: B256,
    pub attempts: u32,
    pub failure_reason: Option<String>,
}

impl MessageStatus {
    /// Executed or failed: a delivery was attempted and recorded.
    pub fn is_terminal(&self) -> bool {
        self.executed || self.failed
    }

    pub fn is_retryable(&self) -> bool {
        self.failed && !self.executed
    }
}
