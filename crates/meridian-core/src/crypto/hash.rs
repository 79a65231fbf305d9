use alloy_primitives::{Address, B256};
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data.
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// keccak256 over the concatenation of several byte slices, without an
/// intermediate allocation.
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Encode a u64 as a 32-byte big-endian word (ABI `uint256` layout).
pub fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode an address as a left-padded 32-byte word (ABI `address` layout).
pub fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256(&[]),
            B256::from(hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"))
        );
    }

    #[test]
    fn test_keccak256_concat_matches_single_buffer() {
        let joined = keccak256(b"meridianbridge");
        let parts = keccak256_concat(&[b"meridian", b"bridge"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_u64_word_is_big_endian() {
        let word = u64_word(0x0102);
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert!(word[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_address_word_left_padded() {
        let address = Address::repeat_byte(0xAB);
        let word = address_word(&address);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], address.as_slice());
    }
}
