use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// The environment of a single state-mutating call, supplied by the host.
///
/// Every entry point receives one of these instead of reading ambient globals:
/// who is calling, how much value they attached, and the host's clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The address invoking the operation.
    pub caller: Address,
    /// Value attached to the call (fees, stake).
    pub value: U256,
    /// Host timestamp in seconds.
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            value: U256::ZERO,
            timestamp,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A value transfer the host must settle after the call returns
/// (stake withdrawals, fee refunds, fee sweeps).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub recipient: Address,
    pub amount: U256,
}

impl Payout {
    pub fn new(recipient: Address, amount: U256) -> Self {
        Self { recipient, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_zero()
    }
}
