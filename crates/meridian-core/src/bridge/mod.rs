//! Cross-chain message passing on top of the oracle.
//!
//! Outbound: `send_message` charges a fee, assigns a nonce and records the
//! message hash. Inbound: a relayer presents a message with an inclusion proof
//! against a finalized source-chain root, and the bridge runs the target with
//! the message's gas limit. Failed deliveries are recorded and can be retried.

pub mod executor;
pub mod fees;
pub mod inbound;
pub mod outbound;
pub mod queue;

pub use executor::{decode_revert_reason, CallExecutor, CallOutcome, ExecutionOutcome};
pub use fees::FeeSchedule;
pub use outbound::SendReceipt;
pub use queue::MessageQueue;

use crate::access::{Ownable, ReentrancyLock, RelayerAllowList};
use crate::config::{BridgeConfig, ConfigError};
use crate::error::ErrorCategory;
use crate::events::{Event, EventLog};
use crate::oracle::{BridgeOracle, OracleError, ProofVerifier};
use crate::types::context::{CallContext, Payout};
use crate::types::message::{Message, MessageKey, MessageStatus};
use alloy_primitives::{Address, B256, U256};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Caller {caller} is not the bridge owner")]
    Unauthorized { caller: Address },

    #[error("{caller} is not an authorized relayer")]
    UnauthorizedRelayer { caller: Address },

    #[error("Bridge is paused")]
    Paused,

    #[error("Bridge is already executing a call")]
    Reentrant,

    #[error("Invalid destination chain {chain_id}")]
    InvalidDestination { chain_id: u64 },

    #[error("Destination chain {chain_id} is not supported")]
    ChainNotSupported { chain_id: u64 },

    #[error("Gas limit {gas_limit} outside [{min}, {max}]")]
    InvalidGasLimit { gas_limit: u64, min: u64, max: u64 },

    #[error("Insufficient fee: {provided} provided, {required} required")]
    InsufficientFee { provided: U256, required: U256 },

    #[error("No accumulated fees to withdraw")]
    NoFeesToWithdraw,

    #[error("Message {nonce} from chain {source_chain_id} has already been delivered")]
    MessageAlreadyExecuted { source_chain_id: u64, nonce: u64 },

    #[error("Inclusion proof for message {hash} does not verify")]
    InvalidProof { hash: B256 },

    #[error("No failed delivery recorded for message {hash}")]
    MessageNotFound { hash: B256 },

    #[error("Message {hash} is not queued")]
    MessageNotQueued { hash: B256 },

    #[error("Invalid bridge configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl BridgeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::UnauthorizedRelayer { .. } => ErrorCategory::Authorization,
            Self::InvalidDestination { .. }
            | Self::ChainNotSupported { .. }
            | Self::InvalidGasLimit { .. }
            | Self::InvalidConfiguration(_) => ErrorCategory::Validation,
            Self::InsufficientFee { .. } | Self::NoFeesToWithdraw => ErrorCategory::Economic,
            Self::InvalidProof { .. } => ErrorCategory::Consensus,
            Self::Paused
            | Self::Reentrant
            | Self::MessageAlreadyExecuted { .. }
            | Self::MessageNotFound { .. }
            | Self::MessageNotQueued { .. } => ErrorCategory::State,
            Self::Oracle(err) => err.category(),
        }
    }
}

/// One bridge instance on one chain.
#[derive(Debug)]
pub struct MessageBridge<O: ProofVerifier = BridgeOracle> {
    access: Ownable,
    chain_id: u64,
    oracle: O,
    fees: FeeSchedule,
    allow_list: RelayerAllowList,
    destinations: BTreeSet<u64>,
    paused: bool,
    lock: ReentrancyLock,
    outbound_nonce: u64,
    sent: HashMap<u64, Message>,
    sent_hashes: HashMap<u64, B256>,
    statuses: HashMap<B256, MessageStatus>,
    /// Inbound identity → hash of the message delivered under it.
    delivered: HashMap<MessageKey, B256>,
    queue: MessageQueue,
    accumulated_fees: U256,
    events: EventLog,
}

impl<O: ProofVerifier> MessageBridge<O> {
    pub fn new(config: BridgeConfig, oracle: O) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            access: Ownable::new(config.owner),
            chain_id: config.chain_id,
            oracle,
            fees: FeeSchedule::from_config(&config),
            allow_list: RelayerAllowList::new(config.allow_list_enabled, config.relayers),
            destinations: config.destinations.into_iter().collect(),
            paused: false,
            lock: ReentrancyLock::new(),
            outbound_nonce: 0,
            sent: HashMap::new(),
            sent_hashes: HashMap::new(),
            statuses: HashMap::new(),
            delivered: HashMap::new(),
            queue: MessageQueue::default(),
            accumulated_fees: U256::ZERO,
            events: EventLog::default(),
        })
    }

    fn check_owner(&self, caller: &Address) -> Result<(), BridgeError> {
        if !self.access.is_owner(caller) {
            return Err(BridgeError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn check_relayer(&self, caller: &Address) -> Result<(), BridgeError> {
        if !self.allow_list.permits(caller) {
            return Err(BridgeError::UnauthorizedRelayer { caller: *caller });
        }
        Ok(())
    }

    fn check_not_paused(&self) -> Result<(), BridgeError> {
        if self.paused {
            return Err(BridgeError::Paused);
        }
        Ok(())
    }

    // --- Relayer work queue ---

    /// Add `hash` to the worklist. Returns false if it was already queued.
    pub fn queue_message(&mut self, ctx: &CallContext, hash: B256) -> Result<bool, BridgeError> {
        self.check_relayer(&ctx.caller)?;
        if !self.queue.push(hash) {
            return Ok(false);
        }
        debug!(%hash, queued = self.queue.len(), "Message queued");
        self.events.emit(Event::MessageQueued { hash });
        Ok(true)
    }

    pub fn dequeue_message(&mut self, ctx: &CallContext, hash: B256) -> Result<(), BridgeError> {
        self.check_relayer(&ctx.caller)?;
        if !self.queue.remove(&hash) {
            return Err(BridgeError::MessageNotQueued { hash });
        }
        debug!(%hash, queued = self.queue.len(), "Message dequeued");
        self.events.emit(Event::MessageDequeued { hash });
        Ok(())
    }

    /// Drop the oldest worklist entries beyond `max_len`.
    pub fn prune_queue(&mut self, ctx: &CallContext, max_len: usize) -> Result<Vec<B256>, BridgeError> {
        self.check_owner(&ctx.caller)?;
        let dropped = self.queue.prune(max_len);
        if !dropped.is_empty() {
            info!(dropped = dropped.len(), remaining = self.queue.len(), "Message queue pruned");
        }
        Ok(dropped)
    }

    // --- Governance ---

    pub fn set_base_fee(&mut self, ctx: &CallContext, base_fee: U256) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        self.fees.base_fee = base_fee;
        self.events.emit(Event::BaseFeeUpdated { base_fee });
        Ok(())
    }

    /// Gas price feed update.
    pub fn set_gas_price(&mut self, ctx: &CallContext, gas_price: U256) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        self.fees.gas_price = gas_price;
        debug!(%gas_price, "Gas price updated");
        self.events.emit(Event::GasPriceUpdated { gas_price });
        Ok(())
    }

    pub fn set_chain_fee_multiplier(
        &mut self,
        ctx: &CallContext,
        chain_id: u64,
        multiplier_bps: u32,
    ) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        self.fees.set_multiplier(chain_id, multiplier_bps)?;
        self.events.emit(Event::ChainFeeMultiplierUpdated {
            chain_id,
            multiplier_bps,
        });
        Ok(())
    }

    pub fn set_gas_limits(&mut self, ctx: &CallContext, min: u64, default: u64, max: u64) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        self.fees.set_gas_limits(min, default, max)?;
        self.events.emit(Event::GasLimitsUpdated { min, default, max });
        Ok(())
    }

    /// Pay out every accumulated fee to `recipient`.
    pub fn withdraw_fees(&mut self, ctx: &CallContext, recipient: Address) -> Result<Payout, BridgeError> {
        self.check_owner(&ctx.caller)?;
        if self.accumulated_fees.is_zero() {
            return Err(BridgeError::NoFeesToWithdraw);
        }
        let amount = std::mem::take(&mut self.accumulated_fees);
        info!(%recipient, %amount, "Fees withdrawn");
        self.events.emit(Event::FeesWithdrawn { recipient, amount });
        Ok(Payout::new(recipient, amount))
    }

    pub fn pause(&mut self, ctx: &CallContext) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        if !self.paused {
            self.paused = true;
            info!("Bridge paused");
            self.events.emit(Event::Paused);
        }
        Ok(())
    }

    pub fn unpause(&mut self, ctx: &CallContext) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        if self.paused {
            self.paused = false;
            info!("Bridge unpaused");
            self.events.emit(Event::Unpaused);
        }
        Ok(())
    }

    pub fn set_relayer(&mut self, ctx: &CallContext, relayer: Address, allowed: bool) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        if self.allow_list.set(relayer, allowed) {
            info!(%relayer, allowed, "Relayer updated");
            self.events.emit(Event::RelayerUpdated { relayer, allowed });
        }
        Ok(())
    }

    pub fn set_allow_list_enabled(&mut self, ctx: &CallContext, enabled: bool) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        self.allow_list.set_enabled(enabled);
        info!(enabled, "Relayer allow-list toggled");
        Ok(())
    }

    pub fn add_destination(&mut self, ctx: &CallContext, chain_id: u64) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        if chain_id == 0 || chain_id == self.chain_id {
            return Err(BridgeError::InvalidDestination { chain_id });
        }
        if self.destinations.insert(chain_id) {
            self.events.emit(Event::ChainAdded { chain_id });
        }
        Ok(())
    }

    /// Removing the last destination reopens sending to every chain.
    pub fn remove_destination(&mut self, ctx: &CallContext, chain_id: u64) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        if !self.destinations.remove(&chain_id) {
            return Err(BridgeError::ChainNotSupported { chain_id });
        }
        self.events.emit(Event::ChainRemoved { chain_id });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> Result<(), BridgeError> {
        self.check_owner(&ctx.caller)?;
        let previous_owner = self.access.owner();
        self.access.transfer(new_owner);
        self.events.emit(Event::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    // --- Reads ---

    pub fn message_status(&self, hash: &B256) -> Option<&MessageStatus> {
        self.statuses.get(hash)
    }

    /// Status of whatever was delivered under `(source_chain_id, nonce)`.
    pub fn inbound_status(&self, key: &MessageKey) -> Option<&MessageStatus> {
        self.delivered.get(key).and_then(|hash| self.statuses.get(hash))
    }

    pub fn hash_message(&self, message: &Message) -> B256 {
        message.hash()
    }

    /// Fee `send_message` would charge. A zero gas limit means the default.
    pub fn estimate_fee(&self, dest_chain_id: u64, gas_limit: u64) -> Result<U256, BridgeError> {
        let gas_limit = self.fees.resolve_gas_limit(gas_limit)?;
        Ok(self.fees.fee(dest_chain_id, gas_limit))
    }

    /// The nonce the next outbound message will get.
    pub fn outbound_nonce(&self) -> u64 {
        self.outbound_nonce
    }

    pub fn sent_message_hash(&self, nonce: u64) -> Option<B256> {
        self.sent_hashes.get(&nonce).copied()
    }

    pub fn sent_message(&self, nonce: u64) -> Option<&Message> {
        self.sent.get(&nonce)
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_messages(&self) -> &[B256] {
        self.queue.as_slice()
    }

    pub fn is_queued(&self, hash: &B256) -> bool {
        self.queue.contains(hash)
    }

    pub fn accumulated_fees(&self) -> U256 {
        self.accumulated_fees
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn destinations(&self) -> impl Iterator<Item = &u64> {
        self.destinations.iter()
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn allow_list(&self) -> &RelayerAllowList {
        &self.allow_list
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    pub const OWNER: Address = Address::repeat_byte(0xEE);
    pub const RELAYER: Address = Address::repeat_byte(0xAA);
    pub const LOCAL_CHAIN: u64 = 1;
    pub const REMOTE_CHAIN: u64 = 31337;

    /// Proof checker that accepts exactly the `(chain, block, leaf)` triples
    /// it was told about and treats every other block as unfinalized.
    #[derive(Debug, Default)]
    pub struct FakeVerifier {
        pub finalized: HashMap<(u64, u64), Vec<B256>>,
    }

    impl FakeVerifier {
        pub fn accept(&mut self, chain_id: u64, block_number: u64, leaf: B256) {
            self.finalized.entry((chain_id, block_number)).or_default().push(leaf);
        }
    }

    impl ProofVerifier for FakeVerifier {
        fn verify_proof(
            &self,
            chain_id: u64,
            block_number: u64,
            _proof: &[B256],
            leaf: B256,
        ) -> Result<bool, OracleError> {
            self.finalized
                .get(&(chain_id, block_number))
                .map(|leaves| leaves.contains(&leaf))
                .ok_or(OracleError::StateRootNotFinalized {
                    chain_id,
                    block_number,
                })
        }
    }

    pub fn bridge() -> MessageBridge<FakeVerifier> {
        let mut config = BridgeConfig::new(OWNER, LOCAL_CHAIN);
        config.base_fee = U256::from(1_000u64);
        config.gas_price = U256::from(1u64);
        config.relayers = vec![RELAYER];
        MessageBridge::new(config, FakeVerifier::default()).unwrap()
    }

    pub fn owner() -> CallContext {
        CallContext::new(OWNER, 0)
    }

    pub fn relayer() -> CallContext {
        CallContext::new(RELAYER, 100)
    }

    pub fn inbound(nonce: u64) -> Message {
        Message {
            nonce,
            source_chain_id: REMOTE_CHAIN,
            dest_chain_id: LOCAL_CHAIN,
            sender: Address::repeat_byte(0x11),
            target: Address::repeat_byte(0x22),
            data: alloy_primitives::Bytes::from_static(b"ping"),
            gas_limit: 100_000,
            timestamp: 50,
        }
    }
}
