//! secp256k1 signatures over state-root attestations.
//!
//! Signed-message domain, fixed for every deployment:
//!
//! ```text
//! inner  = keccak256(uint256(chain_id) ‖ uint256(block_number) ‖ bytes32(root))
//! digest = keccak256("\x19Ethereum Signed Message:\n32" ‖ inner)
//! ```
//!
//! Signatures are 65 bytes `r ‖ s ‖ v` with `v` in {0, 1, 27, 28}. The signer
//! address is the last 20 bytes of keccak256 over the uncompressed public key
//! (without the 0x04 prefix). High-s signatures are rejected so that a signature
//! has exactly one valid encoding.

use crate::crypto::hash::{keccak256, keccak256_concat, u64_word};
use alloy_primitives::{Address, Bytes, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bytes in a recoverable secp256k1 signature.
pub const SIGNATURE_LEN: usize = 65;

/// Prefix applied to the inner attestation hash before signing.
pub const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Errors produced while decoding or recovering a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature length: expected 65 bytes, got {got}")]
    InvalidSignatureLength { got: usize },

    #[error("Invalid recovery id {v}: expected 0, 1, 27 or 28")]
    InvalidRecoveryId { v: u8 },

    #[error("Malformed signature: r or s is out of range")]
    MalformedSignature,

    #[error("Signature s value is in the upper half of the curve order")]
    HighS,

    #[error("Public key recovery failed")]
    RecoveryFailed,

    #[error("Invalid secret key: {reason}")]
    InvalidSecretKey { reason: String },

    #[error("Signing failed: {reason}")]
    SigningFailed { reason: String },
}

/// A recoverable secp256k1 signature (`r ‖ s ‖ v`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EcdsaSignature(pub [u8; SIGNATURE_LEN]);

impl Serialize for EcdsaSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for EcdsaSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl EcdsaSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CryptoError::InvalidSignatureLength { got: bytes.len() });
        }
        let mut arr = [0u8; SIGNATURE_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// The `v` byte, normalized to a 0/1 recovery id.
    pub fn recovery_id(&self) -> Result<RecoveryId, CryptoError> {
        let v = self.0[64];
        let normalized = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            _ => return Err(CryptoError::InvalidRecoveryId { v }),
        };
        RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidRecoveryId { v })
    }
}

/// Hash of the attested tuple, before the signed-message prefix is applied.
pub fn state_root_message_hash(chain_id: u64, block_number: u64, root: &B256) -> B256 {
    keccak256_concat(&[
        &u64_word(chain_id),
        &u64_word(block_number),
        root.as_slice(),
    ])
}

/// Apply the `\x19Ethereum Signed Message:\n32` prefix to a 32-byte hash.
pub fn to_eth_signed_message_hash(hash: &B256) -> B256 {
    keccak256_concat(&[ETH_SIGNED_MESSAGE_PREFIX, hash.as_slice()])
}

/// The digest a validator signs to attest `root` for `(chain_id, block_number)`.
pub fn state_root_digest(chain_id: u64, block_number: u64, root: &B256) -> B256 {
    to_eth_signed_message_hash(&state_root_message_hash(chain_id, block_number, root))
}

/// Derive the account address of a secp256k1 public key.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the address that produced `signature` over `digest`.
pub fn recover_signer(digest: &B256, signature: &EcdsaSignature) -> Result<Address, CryptoError> {
    let recovery_id = signature.recovery_id()?;
    let sig = Signature::from_slice(&signature.0[..64]).map_err(|_| CryptoError::MalformedSignature)?;

    // normalize_s returns Some only when s was in the upper half
    if sig.normalize_s().is_some() {
        return Err(CryptoError::HighS);
    }

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(public_key_to_address(&key))
}

/// An in-process validator key. Used by tests and by the relayer crate's
/// signing service; production validators keep keys in an external signer.
#[derive(Clone)]
pub struct ValidatorKey {
    signing_key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for ValidatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl ValidatorKey {
    /// Create from 32 secret key bytes.
    pub fn from_bytes(key_bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(key_bytes).map_err(|e| {
            CryptoError::InvalidSecretKey {
                reason: e.to_string(),
            }
        })?;
        let address = public_key_to_address(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Uncompressed SEC1 public key (65 bytes, 0x04-prefixed).
    pub fn public_key(&self) -> Bytes {
        let encoded = self.signing_key.verifying_key().to_encoded_point(false);
        Bytes::copy_from_slice(encoded.as_bytes())
    }

    /// Sign a prehashed 32-byte digest, returning `r ‖ s ‖ v` with `v` in {27, 28}.
    pub fn sign_digest(&self, digest: &B256) -> Result<EcdsaSignature, CryptoError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| CryptoError::SigningFailed {
                reason: e.to_string(),
            })?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(sig.to_bytes().as_slice());
        out[64] = recovery_id.to_byte() + 27;
        Ok(EcdsaSignature(out))
    }

    /// Sign the attestation digest for `(chain_id, block_number, root)`.
    pub fn sign_state_root(
        &self,
        chain_id: u64,
        block_number: u64,
        root: &B256,
    ) -> Result<EcdsaSignature, CryptoError> {
        self.sign_digest(&state_root_digest(chain_id, block_number, root))
    }
}
