//! # Meridian Core
//!
//! Validator-attested state roots and cross-chain message passing, as pure
//! state machines.
//!
//! This crate contains **no networking code** and **no async runtime**. Every
//! operation is a synchronous `&mut self` transition that either succeeds or
//! returns a typed error with no state change. Value movements come back as
//! [`Payout`]s for the host to settle and notifications accumulate in each
//! component's [`EventLog`].
//!
//! ## Components
//!
//! - **Validator registry** (`registry` module): stake-backed membership,
//!   liveness bookkeeping and quorum-approved slashing.
//!
//! - **Bridge oracle** (`oracle` module): aggregates secp256k1 signatures from
//!   the active set into finalized `(chain, block) → state root` records and
//!   verifies keccak merkle proofs against them. Trusts that a threshold of the
//!   active validators is honest.
//!
//! - **Message bridge** (`bridge` module): fee-charged outbound messages and
//!   proof-checked inbound delivery with a gas-bounded call, failure recording
//!   and retry.
//!
//! ## Usage
//!
//! ```ignore
//! use meridian_core::{BridgeOracle, MessageBridge, MeridianConfig, ValidatorRegistry};
//!
//! let config = MeridianConfig::load("meridian.json")?;
//! let registry = ValidatorRegistry::new(config.registry)?;
//! let oracle = BridgeOracle::new(config.oracle, registry)?;
//! let bridge = MessageBridge::new(config.bridge, oracle)?;
//! ```

pub mod access;
pub mod bridge;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod merkle;
pub mod oracle;
pub mod registry;
pub mod types;

// Re-export commonly used types for convenience
pub use bridge::{
    decode_revert_reason, BridgeError, CallExecutor, CallOutcome, ExecutionOutcome, MessageBridge,
    SendReceipt,
};
pub use config::{BridgeConfig, ConfigError, MeridianConfig, OracleConfig, RegistryConfig};
pub use crypto::{
    hash::keccak256,
    sig::{recover_signer, state_root_digest, CryptoError, EcdsaSignature, ValidatorKey},
};
pub use error::ErrorCategory;
pub use events::{Event, EventLog};
pub use merkle::{MerkleError, MerkleScheme, MerkleTree};
pub use oracle::{threshold_count, BridgeOracle, OracleError, ProofVerifier};
pub use registry::{RegistryError, ValidatorRegistry, ValidatorSet};
pub use types::{
    CallContext, Message, MessageKey, MessageStatus, Payout, PendingUpdate, SlashProposal, SlashQuorum,
    StateRootRecord, Validator,
};
