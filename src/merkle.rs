//! Merkle index over active lock IDs
//!
//! A binary keccak-256 tree whose leaves are the IDs of currently active
//! locks, in insertion order. Node combination is sort-then-concat:
//! `parent = keccak(min(a,b) ‖ max(a,b))`, which makes proof verification
//! independent of leaf position. Odd rows duplicate their last node; the
//! empty tree has the all-zero root. The root is rebuilt from the leaf list
//! on demand, which at the expected lock counts is cheaper than carrying
//! incremental update state.

use alloy_primitives::B256;

use crate::crypto::hashing::keccak256_concat;

/// Append/remove-capable Merkle tree over 32-byte leaves
#[derive(Debug, Clone, Default)]
pub struct MerkleIndex {
    leaves: Vec<B256>,
}

impl MerkleIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the index holds no leaves
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves in insertion order
    pub fn leaves(&self) -> &[B256] {
        &self.leaves
    }

    /// Whether a leaf is present
    pub fn contains(&self, leaf: &B256) -> bool {
        self.leaves.contains(leaf)
    }

    /// Append a leaf
    pub fn add_leaf(&mut self, leaf: B256) {
        self.leaves.push(leaf);
    }

    /// Remove the first occurrence of `leaf`, shifting later leaves down
    ///
    /// Returns `false` if the leaf is absent.
    pub fn remove_leaf(&mut self, leaf: &B256) -> bool {
        match self.leaves.iter().position(|l| l == leaf) {
            Some(index) => {
                self.leaves.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current root; all zeros for the empty tree
    pub fn root(&self) -> B256 {
        Self::root_of(&self.leaves)
    }

    /// Compute the root of an arbitrary leaf list
    pub fn root_of(leaves: &[B256]) -> B256 {
        if leaves.is_empty() {
            return B256::ZERO;
        }

        let mut level = leaves.to_vec();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().expect("level is non-empty"));
            }
            level = level
                .chunks(2)
                .map(|pair| combine(&pair[0], &pair[1]))
                .collect();
        }
        level[0]
    }

    /// Inclusion proof (sibling path) for the leaf at `index`
    pub fn proof(&self, index: usize) -> Option<Vec<B256>> {
        if index >= self.leaves.len() {
            return None;
        }

        let mut proof = Vec::new();
        let mut idx = index;
        let mut level = self.leaves.clone();

        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().expect("level is non-empty"));
            }
            let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            proof.push(level[sibling]);

            level = level
                .chunks(2)
                .map(|pair| combine(&pair[0], &pair[1]))
                .collect();
            idx /= 2;
        }

        Some(proof)
    }

    /// Verify an inclusion proof against a root
    ///
    /// The sorted combiner makes the fold position-independent, so no leaf
    /// index is required.
    pub fn verify_proof(leaf: &B256, proof: &[B256], root: &B256) -> bool {
        let mut computed = *leaf;
        for sibling in proof {
            computed = combine(&computed, sibling);
        }
        computed == *root
    }
}

/// `keccak(min(a,b) ‖ max(a,b))`
fn combine(a: &B256, b: &B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    keccak256_concat(&[lo.as_slice(), hi.as_slice()])
}
