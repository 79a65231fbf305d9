//! Outbound fee schedule and gas-limit bounds.

use super::BridgeError;
use crate::config::{BridgeConfig, BPS_DENOMINATOR};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `fee = base_fee + gas_limit × gas_price × multiplier_bps(dest) / 10000`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_fee: U256,
    pub gas_price: U256,
    pub min_gas_limit: u64,
    pub default_gas_limit: u64,
    pub max_gas_limit: u64,
    multipliers: HashMap<u64, u32>,
}

impl FeeSchedule {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            base_fee: config.base_fee,
            gas_price: config.gas_price,
            min_gas_limit: config.min_gas_limit,
            default_gas_limit: config.default_gas_limit,
            max_gas_limit: config.max_gas_limit,
            multipliers: HashMap::new(),
        }
    }

    /// Per-destination gas multiplier; 10000 (1x) unless overridden.
    pub fn multiplier_bps(&self, dest_chain_id: u64) -> u32 {
        self.multipliers
            .get(&dest_chain_id)
            .copied()
            .unwrap_or(BPS_DENOMINATOR)
    }

    pub fn set_multiplier(&mut self, dest_chain_id: u64, multiplier_bps: u32) -> Result<(), BridgeError> {
        if multiplier_bps == 0 {
            return Err(BridgeError::InvalidConfiguration(
                "fee multiplier must be non-zero".into(),
            ));
        }
        if multiplier_bps == BPS_DENOMINATOR {
            self.multipliers.remove(&dest_chain_id);
        } else {
            self.multipliers.insert(dest_chain_id, multiplier_bps);
        }
        Ok(())
    }

    /// Zero means "use the default"; anything else must lie in `[min, max]`.
    pub fn resolve_gas_limit(&self, requested: u64) -> Result<u64, BridgeError> {
        let gas_limit = if requested == 0 {
            self.default_gas_limit
        } else {
            requested
        };
        if gas_limit < self.min_gas_limit || gas_limit > self.max_gas_limit {
            return Err(BridgeError::InvalidGasLimit {
                gas_limit,
                min: self.min_gas_limit,
                max: self.max_gas_limit,
            });
        }
        Ok(gas_limit)
    }

    pub fn set_gas_limits(&mut self, min: u64, default: u64, max: u64) -> Result<(), BridgeError> {
        if min == 0 || min > default || default > max {
            return Err(BridgeError::InvalidGasLimit {
                gas_limit: default,
                min,
                max,
            });
        }
        self.min_gas_limit = min;
        self.default_gas_limit = default;
        self.max_gas_limit = max;
        Ok(())
    }

    /// Fee for an already-resolved gas limit.
    pub fn fee(&self, dest_chain_id: u64, gas_limit: u64) -> U256 {
        let gas_cost = U256::from(gas_limit) * self.gas_price * U256::from(self.multiplier_bps(dest_chain_id))
            / U256::from(BPS_DENOMINATOR);
        self.base_fee + gas_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn schedule() -> FeeSchedule {
        let mut config = BridgeConfig::new(Address::ZERO, 1);
        config.base_fee = U256::from(1_000u64);
        config.gas_price = U256::from(2u64);
        FeeSchedule::from_config(&config)
    }

    #[test]
    fn test_fee_formula() {
        let mut fees = schedule();
        assert_eq!(fees.fee(5, 100_000), U256::from(201_000u64));

        fees.set_multiplier(5, 15_000).unwrap();
        assert_eq!(fees.multiplier_bps(5), 15_000);
        assert_eq!(fees.fee(5, 100_000), U256::from(301_000u64));
        // Other destinations keep 1x
        assert_eq!(fees.fee(6, 100_000), U256::from(201_000u64));

        fees.set_multiplier(5, 10_000).unwrap();
        assert_eq!(fees.fee(5, 100_000), U256::from(201_000u64));
        assert!(fees.set_multiplier(5, 0).is_err());
    }

    #[test]
    fn test_gas_limit_resolution() {
        let fees = schedule();
        assert_eq!(fees.resolve_gas_limit(0), Ok(200_000));
        assert_eq!(fees.resolve_gas_limit(21_000), Ok(21_000));
        assert_eq!(fees.resolve_gas_limit(5_000_000), Ok(5_000_000));
        assert_eq!(
            fees.resolve_gas_limit(20_999),
            Err(BridgeError::InvalidGasLimit {
                gas_limit: 20_999,
                min: 21_000,
                max: 5_000_000
            })
        );
        assert!(fees.resolve_gas_limit(5_000_001).is_err());
    }

    #[test]
    fn test_set_gas_limits_requires_ordering() {
        let mut fees = schedule();
        assert!(fees.set_gas_limits(50_000, 40_000, 60_000).is_err());
        assert!(fees.set_gas_limits(0, 0, 60_000).is_err());
        fees.set_gas_limits(30_000, 50_000, 60_000).unwrap();
        assert_eq!(fees.resolve_gas_limit(0), Ok(50_000));
    }
}
