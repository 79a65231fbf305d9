use crate::merkle::proof::{hash_ordered_pair, hash_sorted_pair, MerkleScheme};
use alloy_primitives::B256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Cannot build a merkle tree without leaves")]
    EmptyTree,

    #[error("Leaf index {index} out of range for a tree of {leaves} leaves")]
    LeafIndexOutOfRange { index: usize, leaves: usize },
}

/// A fully materialized binary merkle tree.
///
/// Levels with an odd node count duplicate their last node, so every node has a
/// sibling and an indexed proof always has exactly `depth` elements.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    scheme: MerkleScheme,
    /// levels[0] are the leaves, the last level holds the root alone.
    levels: Vec<Vec<B256>>,
}

impl MerkleTree {
    pub fn build(leaves: Vec<B256>, scheme: MerkleScheme) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let next: Vec<B256> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    match scheme {
                        MerkleScheme::SortedPair => hash_sorted_pair(left, right),
                        MerkleScheme::Indexed => hash_ordered_pair(left, right),
                    }
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { scheme, levels })
    }

    pub fn scheme(&self) -> MerkleScheme {
        self.scheme
    }

    pub fn root(&self) -> B256 {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[B256] {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Sibling path for the leaf at `index`, bottom-up.
    pub fn proof(&self, index: usize) -> Result<Vec<B256>, MerkleError> {
        let leaves = self.len();
        if index >= leaves {
            return Err(MerkleError::LeafIndexOutOfRange { index, leaves });
        }

        let mut proof = Vec::with_capacity(self.levels.len() - 1);
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = position ^ 1;
            proof.push(*level.get(sibling).unwrap_or(&level[position]));
            position /= 2;
        }
        Ok(proof)
    }

    /// Position of the first leaf equal to `leaf`.
    pub fn position(&self, leaf: &B256) -> Option<usize> {
        self.levels[0].iter().position(|l| l == leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;
    use crate::merkle::proof::{verify_indexed, verify_sorted};

    fn leaves(n: usize) -> Vec<B256> {
        (0..n).map(|i| keccak256(&(i as u64).to_be_bytes())).collect()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert_eq!(
            MerkleTree::build(vec![], MerkleScheme::SortedPair).unwrap_err(),
            MerkleError::EmptyTree
        );
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let l = leaves(1);
        let tree = MerkleTree::build(l.clone(), MerkleScheme::SortedPair).unwrap();
        assert_eq!(tree.root(), l[0]);
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn test_sorted_proofs_verify_for_every_leaf() {
        for n in [2, 3, 5, 8] {
            let l = leaves(n);
            let tree = MerkleTree::build(l.clone(), MerkleScheme::SortedPair).unwrap();
            for (i, leaf) in l.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_sorted(&proof, &tree.root(), *leaf), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_indexed_proofs_verify_for_every_leaf() {
        for n in [2, 3, 7] {
            let l = leaves(n);
            let tree = MerkleTree::build(l.clone(), MerkleScheme::Indexed).unwrap();
            for (i, leaf) in l.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(verify_indexed(&proof, &tree.root(), *leaf, i as u64), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_proof_out_of_range() {
        let tree = MerkleTree::build(leaves(3), MerkleScheme::SortedPair).unwrap();
        assert_eq!(
            tree.proof(3).unwrap_err(),
            MerkleError::LeafIndexOutOfRange { index: 3, leaves: 3 }
        );
    }

    #[test]
    fn test_position_lookup() {
        let l = leaves(4);
        let tree = MerkleTree::build(l.clone(), MerkleScheme::SortedPair).unwrap();
        assert_eq!(tree.position(&l[2]), Some(2));
        assert_eq!(tree.position(&B256::ZERO), None);
    }
}
