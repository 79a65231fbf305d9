//! Deployment configuration for the three components.
//!
//! Loaded from JSON; every tunable has a default so a deployment file only
//! needs owners and the local chain id.

use crate::types::validator::SlashQuorum;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Basis-point denominator used by every percentage in the system.
pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub owner: Address,
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: U256,
    /// Share of stake removed by one executed slash.
    #[serde(default = "default_slash_bps")]
    pub slash_bps: u32,
    #[serde(default)]
    pub slash_quorum: SlashQuorum,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub owner: Address,
    /// Source-chain depth a block must reach before validators attest to it.
    #[serde(default = "default_confirmation_blocks")]
    pub confirmation_blocks: u64,
    /// Seconds a pending update accepts signatures after it is proposed.
    #[serde(default = "default_update_timeout")]
    pub update_timeout: u64,
    /// Share of the active set that must sign, in basis points.
    #[serde(default = "default_threshold_bps")]
    pub threshold_bps: u32,
    #[serde(default)]
    pub supported_chains: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub owner: Address,
    /// The chain this bridge instance lives on.
    pub chain_id: u64,
    #[serde(default = "default_base_fee")]
    pub base_fee: U256,
    /// Initial gas price figure; later updates come from the fee feed.
    #[serde(default = "default_gas_price")]
    pub gas_price: U256,
    #[serde(default = "default_min_gas_limit")]
    pub min_gas_limit: u64,
    #[serde(default = "default_gas_limit")]
    pub default_gas_limit: u64,
    #[serde(default = "default_max_gas_limit")]
    pub max_gas_limit: u64,
    #[serde(default = "default_allow_list_enabled")]
    pub allow_list_enabled: bool,
    #[serde(default)]
    pub relayers: Vec<Address>,
    /// Destinations `send_message` accepts. Empty means any chain except
    /// this one and zero.
    #[serde(default)]
    pub destinations: Vec<u64>,
}

/// Full deployment configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeridianConfig {
    pub registry: RegistryConfig,
    pub oracle: OracleConfig,
    pub bridge: BridgeConfig,
}

fn default_minimum_stake() -> U256 {
    // 1 ether
    U256::from(1_000_000_000_000_000_000u128)
}

fn default_slash_bps() -> u32 {
    1_000
}

fn default_confirmation_blocks() -> u64 {
    12
}

fn default_update_timeout() -> u64 {
    3_600
}

fn default_threshold_bps() -> u32 {
    6_667
}

fn default_base_fee() -> U256 {
    // 0.001 ether
    U256::from(1_000_000_000_000_000u128)
}

fn default_gas_price() -> U256 {
    // 1 gwei
    U256::from(1_000_000_000u64)
}

fn default_min_gas_limit() -> u64 {
    21_000
}

fn default_gas_limit() -> u64 {
    200_000
}

fn default_max_gas_limit() -> u64 {
    5_000_000
}

fn default_allow_list_enabled() -> bool {
    true
}

fn validate_bps(field: &'static str, bps: u32) -> Result<(), ConfigError> {
    if bps == 0 || bps > BPS_DENOMINATOR {
        return Err(ConfigError::invalid(
            field,
            format!("{} is outside 1..={}", bps, BPS_DENOMINATOR),
        ));
    }
    Ok(())
}

impl RegistryConfig {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            minimum_stake: default_minimum_stake(),
            slash_bps: default_slash_bps(),
            slash_quorum: SlashQuorum::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_stake.is_zero() {
            return Err(ConfigError::invalid("minimum_stake", "must be non-zero"));
        }
        validate_bps("slash_bps", self.slash_bps)?;
        match self.slash_quorum {
            SlashQuorum::Fixed(0) => Err(ConfigError::invalid(
                "slash_quorum",
                "a fixed quorum needs at least one approval",
            )),
            SlashQuorum::Fixed(_) => Ok(()),
            SlashQuorum::Bps(bps) => validate_bps("slash_quorum", bps),
        }
    }
}

impl OracleConfig {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            confirmation_blocks: default_confirmation_blocks(),
            update_timeout: default_update_timeout(),
            threshold_bps: default_threshold_bps(),
            supported_chains: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bps("threshold_bps", self.threshold_bps)?;
        if self.update_timeout == 0 {
            return Err(ConfigError::invalid("update_timeout", "must be non-zero"));
        }
        if self.supported_chains.contains(&0) {
            return Err(ConfigError::invalid("supported_chains", "chain id 0 is reserved"));
        }
        Ok(())
    }
}

impl BridgeConfig {
    pub fn new(owner: Address, chain_id: u64) -> Self {
        Self {
            owner,
            chain_id,
            base_fee: default_base_fee(),
            gas_price: default_gas_price(),
            min_gas_limit: default_min_gas_limit(),
            default_gas_limit: default_gas_limit(),
            max_gas_limit: default_max_gas_limit(),
            allow_list_enabled: default_allow_list_enabled(),
            relayers: Vec::new(),
            destinations: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::invalid("chain_id", "chain id 0 is reserved"));
        }
        if self.min_gas_limit == 0
            || self.min_gas_limit > self.default_gas_limit
            || self.default_gas_limit > self.max_gas_limit
        {
            return Err(ConfigError::invalid(
                "gas limits",
                format!(
                    "expected 0 < min ({}) <= default ({}) <= max ({})",
                    self.min_gas_limit, self.default_gas_limit, self.max_gas_limit
                ),
            ));
        }
        if self.destinations.iter().any(|d| *d == 0 || *d == self.chain_id) {
            return Err(ConfigError::invalid(
                "destinations",
                "must not contain 0 or the local chain id",
            ));
        }
        Ok(())
    }
}

impl MeridianConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()?;
        self.oracle.validate()?;
        self.bridge.validate()
    }
}
