//! Validator membership, stake and liveness bookkeeping.
//!
//! The registry is the source of the oracle's active set. Every operation
//! checks the caller's role first and mutates nothing on error.

pub mod slashing;

use crate::access::Ownable;
use crate::config::{ConfigError, RegistryConfig, BPS_DENOMINATOR};
use crate::error::ErrorCategory;
use crate::events::{Event, EventLog};
use crate::types::context::{CallContext, Payout};
use crate::types::validator::{SlashProposal, SlashQuorum, Validator};
use alloy_primitives::{Address, Bytes, U256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// What the oracle needs from the validator membership layer.
pub trait ValidatorSet {
    fn is_active(&self, validator: &Address) -> bool;

    fn active_validator_count(&self) -> usize;

    /// Liveness bookkeeping, called on every accepted signature.
    fn record_activity(&mut self, validator: &Address, timestamp: u64);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Caller {caller} is not the registry owner")]
    Unauthorized { caller: Address },

    #[error("{address} is not an active validator")]
    NotValidator { address: Address },

    #[error("Validator {address} is already active")]
    ValidatorAlreadyExists { address: Address },

    #[error("Insufficient stake: {provided} provided, at least {required} required")]
    InsufficientStake { provided: U256, required: U256 },

    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Public key must not be empty")]
    InvalidPublicKey,

    #[error("A validator cannot slash itself or approve its own slash")]
    CannotSlashSelf,

    #[error("Slash proposal {id} does not exist")]
    ProposalNotFound { id: u64 },

    #[error("Slash proposal {id} has already been executed")]
    ProposalAlreadyExecuted { id: u64 },

    #[error("{approver} has already approved slash proposal {id}")]
    AlreadyApproved { id: u64, approver: Address },

    #[error("Validator {address} is still active; unregister instead")]
    ValidatorStillActive { address: Address },

    #[error("No stake left to withdraw for {address}")]
    NothingToWithdraw { address: Address },

    #[error("Invalid registry parameter: {0}")]
    InvalidParameter(String),
}

impl RegistryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::NotValidator { .. } | Self::CannotSlashSelf => {
                ErrorCategory::Authorization
            }
            Self::InsufficientStake { .. } => ErrorCategory::Economic,
            Self::ZeroAmount | Self::InvalidPublicKey | Self::InvalidParameter(_) => {
                ErrorCategory::Validation
            }
            Self::ValidatorAlreadyExists { .. }
            | Self::ProposalNotFound { .. }
            | Self::ProposalAlreadyExecuted { .. }
            | Self::AlreadyApproved { .. }
            | Self::ValidatorStillActive { .. }
            | Self::NothingToWithdraw { .. } => ErrorCategory::State,
        }
    }
}

/// Stake-backed validator membership with quorum-approved slashing.
#[derive(Debug)]
pub struct ValidatorRegistry {
    access: Ownable,
    minimum_stake: U256,
    slash_bps: u32,
    slash_quorum: SlashQuorum,
    validators: HashMap<Address, Validator>,
    /// Active validators in activation order.
    active: Vec<Address>,
    total_staked: U256,
    slashed_total: U256,
    proposals: HashMap<u64, SlashProposal>,
    next_proposal_id: u64,
    events: EventLog,
}

impl ValidatorRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            access: Ownable::new(config.owner),
            minimum_stake: config.minimum_stake,
            slash_bps: config.slash_bps,
            slash_quorum: config.slash_quorum,
            validators: HashMap::new(),
            active: Vec::new(),
            total_staked: U256::ZERO,
            slashed_total: U256::ZERO,
            proposals: HashMap::new(),
            next_proposal_id: 0,
            events: EventLog::default(),
        })
    }

    fn check_owner(&self, caller: &Address) -> Result<(), RegistryError> {
        if !self.access.is_owner(caller) {
            return Err(RegistryError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn check_active(&self, address: &Address) -> Result<(), RegistryError> {
        if !self.is_active(address) {
            return Err(RegistryError::NotValidator { address: *address });
        }
        Ok(())
    }

    /// Register the caller with `stake`. An inactive validator re-registering
    /// keeps its slash history and any residual stake.
    pub fn register(
        &mut self,
        ctx: &CallContext,
        public_key: Bytes,
        stake: U256,
    ) -> Result<(), RegistryError> {
        let address = ctx.caller;

        if self.is_active(&address) {
            return Err(RegistryError::ValidatorAlreadyExists { address });
        }
        if stake < self.minimum_stake {
            return Err(RegistryError::InsufficientStake {
                provided: stake,
                required: self.minimum_stake,
            });
        }
        if public_key.is_empty() {
            return Err(RegistryError::InvalidPublicKey);
        }

        let validator = self.validators.entry(address).or_insert_with(|| Validator {
            address,
            stake: U256::ZERO,
            public_key: Bytes::new(),
            active: false,
            slash_count: 0,
            registered_at: ctx.timestamp,
            last_active_at: ctx.timestamp,
        });
        validator.stake += stake;
        validator.public_key = public_key;
        validator.active = true;
        validator.registered_at = ctx.timestamp;
        validator.last_active_at = ctx.timestamp;
        let total = validator.stake;

        self.active.push(address);
        self.total_staked += stake;

        info!(%address, stake = %total, active = self.active.len(), "Validator registered");
        self.events.emit(Event::ValidatorRegistered {
            validator: address,
            stake: total,
        });
        Ok(())
    }

    /// Add `amount` to the caller's stake, returning the new stake.
    pub fn increase_stake(&mut self, ctx: &CallContext, amount: U256) -> Result<U256, RegistryError> {
        let validator = self.active_validator_mut(&ctx.caller)?;
        if amount.is_zero() {
            return Err(RegistryError::ZeroAmount);
        }

        validator.stake += amount;
        let stake = validator.stake;
        self.total_staked += amount;

        debug!(validator = %ctx.caller, %amount, %stake, "Stake increased");
        self.events.emit(Event::StakeIncreased {
            validator: ctx.caller,
            amount,
            stake,
        });
        Ok(stake)
    }

    /// Withdraw `amount` of the caller's stake. The remainder must stay at or
    /// above the minimum.
    pub fn decrease_stake(&mut self, ctx: &CallContext, amount: U256) -> Result<Payout, RegistryError> {
        let minimum = self.minimum_stake;
        let validator = self.active_validator_mut(&ctx.caller)?;
        if amount.is_zero() {
            return Err(RegistryError::ZeroAmount);
        }

        let remaining = validator
            .stake
            .checked_sub(amount)
            .filter(|remaining| *remaining >= minimum)
            .ok_or(RegistryError::InsufficientStake {
                provided: validator.stake.saturating_sub(amount),
                required: minimum,
            })?;

        validator.stake = remaining;
        self.total_staked -= amount;

        debug!(validator = %ctx.caller, %amount, stake = %remaining, "Stake decreased");
        self.events.emit(Event::StakeDecreased {
            validator: ctx.caller,
            amount,
            stake: remaining,
        });
        Ok(Payout::new(ctx.caller, amount))
    }

    /// Leave the active set and take back the full remaining stake.
    pub fn unregister(&mut self, ctx: &CallContext) -> Result<Payout, RegistryError> {
        let validator = self.active_validator_mut(&ctx.caller)?;
        let returned = validator.stake;
        validator.stake = U256::ZERO;
        validator.active = false;

        self.remove_from_active_set(&ctx.caller);
        self.total_staked -= returned;

        info!(validator = %ctx.caller, %returned, "Validator unregistered");
        self.events.emit(Event::ValidatorUnregistered {
            validator: ctx.caller,
            returned,
        });
        Ok(Payout::new(ctx.caller, returned))
    }

    /// Withdraw the residual stake left behind when slashing deactivated the caller.
    pub fn withdraw_inactive_stake(&mut self, ctx: &CallContext) -> Result<Payout, RegistryError> {
        let address = ctx.caller;
        let validator = self
            .validators
            .get_mut(&address)
            .ok_or(RegistryError::NothingToWithdraw { address })?;
        if validator.active {
            return Err(RegistryError::ValidatorStillActive { address });
        }
        if validator.stake.is_zero() {
            return Err(RegistryError::NothingToWithdraw { address });
        }

        let returned = std::mem::take(&mut validator.stake);
        self.total_staked -= returned;

        info!(%address, %returned, "Residual stake withdrawn");
        self.events.emit(Event::ValidatorUnregistered {
            validator: address,
            returned,
        });
        Ok(Payout::new(address, returned))
    }

    /// Liveness bookkeeping. Unknown addresses are ignored.
    pub fn record_activity(&mut self, address: &Address, timestamp: u64) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.last_active_at = validator.last_active_at.max(timestamp);
        }
    }

    // --- Governance ---

    /// Change the minimum stake. Active validators that fall below the new
    /// minimum are deactivated; their stake stays withdrawable.
    pub fn set_minimum_stake(&mut self, ctx: &CallContext, minimum: U256) -> Result<Vec<Address>, RegistryError> {
        self.check_owner(&ctx.caller)?;
        if minimum.is_zero() {
            return Err(RegistryError::InvalidParameter(
                "minimum stake must be non-zero".into(),
            ));
        }
        self.minimum_stake = minimum;

        let below: Vec<Address> = self
            .active
            .iter()
            .filter(|address| self.validators[*address].stake < minimum)
            .copied()
            .collect();
        for address in &below {
            self.deactivate(address);
        }

        info!(%minimum, deactivated = below.len(), "Minimum stake updated");
        Ok(below)
    }

    pub fn set_slash_params(
        &mut self,
        ctx: &CallContext,
        slash_bps: u32,
        slash_quorum: SlashQuorum,
    ) -> Result<(), RegistryError> {
        self.check_owner(&ctx.caller)?;
        if slash_bps == 0 || slash_bps > BPS_DENOMINATOR {
            return Err(RegistryError::InvalidParameter(format!(
                "slash_bps {} is outside 1..={}",
                slash_bps, BPS_DENOMINATOR
            )));
        }
        match slash_quorum {
            SlashQuorum::Fixed(0) => {
                return Err(RegistryError::InvalidParameter(
                    "fixed slash quorum must be at least 1".into(),
                ))
            }
            SlashQuorum::Bps(bps) if bps == 0 || bps > BPS_DENOMINATOR => {
                return Err(RegistryError::InvalidParameter(format!(
                    "slash quorum {} bps is outside 1..={}",
                    bps, BPS_DENOMINATOR
                )))
            }
            _ => {}
        }

        self.slash_bps = slash_bps;
        self.slash_quorum = slash_quorum;
        info!(slash_bps, ?slash_quorum, "Slash parameters updated");
        Ok(())
    }

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> Result<(), RegistryError> {
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

    pub fn is_active(&self, address: &Address) -> bool {
        self.validators.get(address).is_some_and(|v| v.active)
    }

    pub fn active_validators(&self) -> &[Address] {
        &self.active
    }

    pub fn active_validator_count(&self) -> usize {
        self.active.len()
    }

    pub fn validator_info(&self, address: &Address) -> Option<&Validator> {
        self.validators.get(address)
    }

    /// Active validators whose last recorded activity is older than `cutoff`.
    pub fn inactive_since(&self, cutoff: u64) -> Vec<Address> {
        self.active
            .iter()
            .filter(|address| self.validators[*address].last_active_at < cutoff)
            .copied()
            .collect()
    }

    pub fn total_staked(&self) -> U256 {
        self.total_staked
    }

    pub fn slashed_total(&self) -> U256 {
        self.slashed_total
    }

    pub fn minimum_stake(&self) -> U256 {
        self.minimum_stake
    }

    pub fn slash_quorum(&self) -> SlashQuorum {
        self.slash_quorum
    }

    pub fn slash_bps(&self) -> u32 {
        self.slash_bps
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    // --- Internal ---

    fn active_validator_mut(&mut self, address: &Address) -> Result<&mut Validator, RegistryError> {
        self.validators
            .get_mut(address)
            .filter(|validator| validator.active)
            .ok_or(RegistryError::NotValidator { address: *address })
    }

    fn deactivate(&mut self, address: &Address) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.active = false;
        }
        self.remove_from_active_set(address);
    }

    fn remove_from_active_set(&mut self, address: &Address) {
        self.active.retain(|a| a != address);
    }
}

impl ValidatorSet for ValidatorRegistry {
    fn is_active(&self, validator: &Address) -> bool {
        ValidatorRegistry::is_active(self, validator)
    }

    fn active_validator_count(&self) -> usize {
        ValidatorRegistry::active_validator_count(self)
    }

    fn record_activity(&mut self, validator: &Address, timestamp: u64) {
        ValidatorRegistry::record_activity(self, validator, timestamp)
    }
}
