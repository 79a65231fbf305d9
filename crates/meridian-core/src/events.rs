//! Notifications emitted by state transitions, for relayers and observers.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // --- Validator registry ---
    ValidatorRegistered {
        validator: Address,
        stake: U256,
    },
    StakeIncreased {
        validator: Address,
        amount: U256,
        stake: U256,
    },
    StakeDecreased {
        validator: Address,
        amount: U256,
        stake: U256,
    },
    ValidatorUnregistered {
        validator: Address,
        returned: U256,
    },
    SlashProposed {
        proposal_id: u64,
        proposer: Address,
        target: Address,
        reason: B256,
    },
    SlashApproved {
        proposal_id: u64,
        approver: Address,
        approvals: u32,
    },
    ValidatorSlashed {
        proposal_id: u64,
        validator: Address,
        amount: U256,
        remaining: U256,
        deactivated: bool,
    },

    // --- Oracle ---
    ChainAdded {
        chain_id: u64,
    },
    ChainRemoved {
        chain_id: u64,
    },
    OracleConfigurationUpdated {
        confirmation_blocks: u64,
        update_timeout: u64,
        threshold_bps: u32,
    },
    StateRootProposed {
        update_id: B256,
        chain_id: u64,
        block_number: u64,
        root: B256,
        proposer: Address,
    },
    StateRootSigned {
        update_id: B256,
        signer: Address,
        signatures: u32,
    },
    StateRootFinalized {
        chain_id: u64,
        block_number: u64,
        root: B256,
        confirmations: u32,
    },

    // --- Message bridge ---
    MessageSent {
        hash: B256,
        nonce: u64,
        dest_chain_id: u64,
        sender: Address,
        target: Address,
        data: Bytes,
        gas_limit: u64,
        fee: U256,
    },
    MessageExecuted {
        hash: B256,
        source_chain_id: u64,
        nonce: u64,
        result_hash: B256,
    },
    MessageFailed {
        hash: B256,
        source_chain_id: u64,
        nonce: u64,
        reason: String,
    },
    MessageQueued {
        hash: B256,
    },
    MessageDequeued {
        hash: B256,
    },
    FeesWithdrawn {
        recipient: Address,
        amount: U256,
    },
    BaseFeeUpdated {
        base_fee: U256,
    },
    GasPriceUpdated {
        gas_price: U256,
    },
    ChainFeeMultiplierUpdated {
        chain_id: u64,
        multiplier_bps: u32,
    },
    GasLimitsUpdated {
        min: u64,
        default: u64,
        max: u64,
    },
    RelayerUpdated {
        relayer: Address,
        allowed: bool,
    },
    Paused,
    Unpaused,

    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

/// Append-only notification buffer owned by a component.
///
/// The host drains it after each call and forwards the events to observers.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every buffered event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_log() {
        let mut log = EventLog::default();
        log.emit(Event::Paused);
        log.emit(Event::Unpaused);
        assert_eq!(log.len(), 2);
        assert_eq!(log.drain(), vec![Event::Paused, Event::Unpaused]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(&Event::ChainAdded { chain_id: 5 }).unwrap();
        assert_eq!(json["event"], "chain_added");
        assert_eq!(json["chain_id"], 5);
    }
}
