use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// A registered validator.
///
/// Invariant: `active` implies `stake >= minimum_stake` of the registry that
/// holds it. Inactive entries are kept so that slash history survives a
/// re-registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub stake: U256,
    /// SEC1-encoded secp256k1 public key as submitted at registration.
    pub public_key: Bytes,
    pub active: bool,
    pub slash_count: u32,
    pub registered_at: u64,
    /// Timestamp of the last accepted signature (or registration).
    pub last_active_at: u64,
}

/// A pending or executed accusation against a validator.
///
/// Invariant: `proposer != target`, and `approvals` holds distinct addresses
/// with the proposer first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashProposal {
    pub id: u64,
    pub proposer: Address,
    pub target: Address,
    pub reason: B256,
    pub approvals: Vec<Address>,
    pub executed: bool,
    pub created_at: u64,
}

impl SlashProposal {
    pub fn has_approved(&self, validator: &Address) -> bool {
        self.approvals.contains(validator)
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }
}

/// How many approvals a slash proposal needs before it executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlashQuorum {
    /// A fixed number of distinct approvals.
    Fixed(u32),
    /// A share of the active set in basis points, rounded up, at least one.
    Bps(u32),
}

impl Default for SlashQuorum {
    fn default() -> Self {
        Self::Fixed(2)
    }
}

impl SlashQuorum {
    /// Approvals required given the current active-set size.
    pub fn required(&self, active_count: usize) -> usize {
        match *self {
            Self::Fixed(n) => n.max(1) as usize,
            Self::Bps(bps) => crate::oracle::threshold_count(active_count, bps),
        }
    }
}
