//! Merkle inclusion proof verification over keccak256.
//!
//! Two node-combination rules exist and they are NOT interchangeable: a proof
//! produced for one scheme never verifies under the other. A deployment picks
//! exactly one (see [`MerkleScheme`]); the message bridge uses
//! [`MerkleScheme::SortedPair`].

use crate::crypto::hash::keccak256_concat;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The node-combination rule a tree was built with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerkleScheme {
    /// Each pair is hashed in ascending byte order, so a proof is just the list
    /// of siblings and carries no positional information.
    #[default]
    SortedPair,
    /// Bit `i` of the leaf index says whether the running hash is the right
    /// (1) or left (0) child at depth `i`.
    Indexed,
}

/// keccak256 of two nodes in ascending byte order.
pub fn hash_sorted_pair(a: &B256, b: &B256) -> B256 {
    if a <= b {
        keccak256_concat(&[a.as_slice(), b.as_slice()])
    } else {
        keccak256_concat(&[b.as_slice(), a.as_slice()])
    }
}

/// keccak256 of `left ‖ right`.
pub fn hash_ordered_pair(left: &B256, right: &B256) -> B256 {
    keccak256_concat(&[left.as_slice(), right.as_slice()])
}

/// Recompute a root from `leaf` and its siblings with the sorted-pair rule.
pub fn process_proof_sorted(proof: &[B256], leaf: B256) -> B256 {
    proof
        .iter()
        .fold(leaf, |current, sibling| hash_sorted_pair(&current, sibling))
}

/// Recompute a root from `leaf` and its siblings, ordering each pair by the
/// corresponding bit of `index`.
pub fn process_proof_indexed(proof: &[B256], leaf: B256, index: u64) -> B256 {
    let mut current = leaf;
    for (depth, sibling) in proof.iter().enumerate() {
        let is_right = depth < 64 && (index >> depth) & 1 == 1;
        current = if is_right {
            hash_ordered_pair(sibling, &current)
        } else {
            hash_ordered_pair(&current, sibling)
        };
    }
    current
}

/// Verify a sorted-pair inclusion proof against `root`.
pub fn verify_sorted(proof: &[B256], root: &B256, leaf: B256) -> bool {
    process_proof_sorted(proof, leaf) == *root
}

/// Verify an index-ordered inclusion proof against `root`.
pub fn verify_indexed(proof: &[B256], root: &B256, leaf: B256, index: u64) -> bool {
    // Index bits beyond the proof depth would describe a position outside the tree
    if proof.len() < 64 && index >> proof.len() != 0 {
        return false;
    }
    process_proof_indexed(proof, leaf, index) == *root
}
