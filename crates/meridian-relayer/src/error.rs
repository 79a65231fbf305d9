use alloy_primitives::B256;
use meridian_core::merkle::MerkleError;
use meridian_core::{BridgeError, CryptoError, OracleError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayerError {
    #[error("No message was sent with nonce {nonce}")]
    NonceNotSent { nonce: u64 },

    #[error("A batch needs at least one message")]
    EmptyBatch,

    #[error("Batch mixes source chains {expected} and {found}")]
    MixedSourceChains { expected: u64, found: u64 },

    #[error("Message {hash} is not part of this batch")]
    MessageNotInBatch { hash: B256 },

    #[error("Invalid relayer configuration: {0}")]
    InvalidConfig(String),

    #[error("Signer failed: {0}")]
    Signing(#[from] CryptoError),

    #[error("Merkle tree error: {0}")]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
