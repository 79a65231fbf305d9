//! The bounded external call made on message delivery.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// `Error(string)` selector.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)` selector.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// What the host's call into a target produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Success { output: Bytes, gas_used: u64 },
    Revert { output: Bytes, gas_used: u64 },
    OutOfGas,
}

/// Runs a message's target with a gas cap. Implemented by the host; the
/// bridge never sees more than the outcome.
pub trait CallExecutor {
    fn call(&mut self, target: Address, input: &[u8], gas_limit: u64) -> CallOutcome;
}

impl<F> CallExecutor for F
where
    F: FnMut(Address, &[u8], u64) -> CallOutcome,
{
    fn call(&mut self, target: Address, input: &[u8], gas_limit: u64) -> CallOutcome {
        self(target, input, gas_limit)
    }
}

/// Result of a delivery attempt. A failed callee is an outcome, not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Executed { result_hash: B256 },
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

/// Turn revert data into a human-readable reason.
///
/// Understands `Error(string)` and `Panic(uint256)`; anything else is shown
/// as hex.
pub fn decode_revert_reason(output: &[u8]) -> String {
    if output.is_empty() {
        return "reverted without reason".to_string();
    }
    if let Some(payload) = output.strip_prefix(&ERROR_SELECTOR) {
        if let Some(reason) = decode_abi_string(payload) {
            return reason;
        }
    }
    if let Some(payload) = output.strip_prefix(&PANIC_SELECTOR) {
        if payload.len() == 32 {
            let code = u64::try_from(U256::from_be_slice(payload)).ok();
            return match code.and_then(|code| Some((code, panic_description(code)?))) {
                Some((code, description)) => format!("panic 0x{:02x}: {}", code, description),
                None => format!("panic 0x{}", hex::encode(payload)),
            };
        }
    }
    format!("reverted: 0x{}", hex::encode(output))
}

fn decode_abi_string(payload: &[u8]) -> Option<String> {
    let offset = read_word_as_usize(payload, 0)?;
    let length = read_word_as_usize(payload, offset)?;
    let start = offset.checked_add(32)?;
    let bytes = payload.get(start..start.checked_add(length)?)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

fn read_word_as_usize(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at.checked_add(32)?)?;
    usize::try_from(U256::from_be_slice(word)).ok()
}

fn panic_description(code: u64) -> Option<&'static str> {
    let description = match code {
        0x00 => "generic compiler panic",
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum value",
        0x22 => "corrupt storage byte array",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "out of memory",
        0x51 => "call to uninitialized function",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_decode_error_string() {
        // Error("Not enough tokens")
        let data = hex!(
            "08c379a0"
            "0000000000000000000000000000000000000000000000000000000000000020"
            "0000000000000000000000000000000000000000000000000000000000000011"
            "4e6f7420656e6f75676820746f6b656e73000000000000000000000000000000"
        );
        assert_eq!(decode_revert_reason(&data), "Not enough tokens");
    }

    #[test]
    fn test_decode_panic() {
        let data = hex!(
            "4e487b71"
            "0000000000000000000000000000000000000000000000000000000000000011"
        );
        assert_eq!(
            decode_revert_reason(&data),
            "panic 0x11: arithmetic overflow or underflow"
        );
    }

    #[test]
    fn test_decode_empty_and_custom() {
        assert_eq!(decode_revert_reason(&[]), "reverted without reason");
        assert_eq!(decode_revert_reason(&hex!("deadbeef")), "reverted: 0xdeadbeef");
    }

    #[test]
    fn test_truncated_error_string_falls_back_to_hex() {
        let data = hex!(
            "08c379a0"
            "0000000000000000000000000000000000000000000000000000000000000020"
            "00000000000000000000000000000000000000000000000000000000000000ff"
        );
        assert!(decode_revert_reason(&data).starts_with("reverted: 0x08c379a0"));
    }

    #[test]
    fn test_closure_executor() {
        let mut seen = Vec::new();
        let mut executor = |target: Address, input: &[u8], gas: u64| {
            seen.push((target, input.to_vec(), gas));
            CallOutcome::OutOfGas
        };
        assert_eq!(
            CallExecutor::call(&mut executor, Address::ZERO, b"x", 7),
            CallOutcome::OutOfGas
        );
        assert_eq!(seen, vec![(Address::ZERO, b"x".to_vec(), 7)]);
    }
}
