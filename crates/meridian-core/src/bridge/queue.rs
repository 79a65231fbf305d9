//! Relayer worklist of message hashes.
//!
//! Membership is tracked separately from message status: a hash stays queued
//! until a relayer dequeues it, whatever happened to the message.

use alloy_primitives::B256;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct MessageQueue {
    entries: Vec<B256>,
    positions: HashMap<B256, usize>,
}

impl MessageQueue {
    /// Returns false if the hash was already queued.
    pub fn push(&mut self, hash: B256) -> bool {
        if self.positions.contains_key(&hash) {
            return false;
        }
        self.positions.insert(hash, self.entries.len());
        self.entries.push(hash);
        true
    }

    /// Swap-remove `hash`. Returns false if it was not queued.
    pub fn remove(&mut self, hash: &B256) -> bool {
        let Some(index) = self.positions.remove(hash) else {
            return false;
        };
        self.entries.swap_remove(index);
        if let Some(moved) = self.entries.get(index) {
            self.positions.insert(*moved, index);
        }
        true
    }

    /// Drop entries from the front until at most `max_len` remain, returning
    /// the dropped hashes.
    pub fn prune(&mut self, max_len: usize) -> Vec<B256> {
        if self.entries.len() <= max_len {
            return Vec::new();
        }
        let excess = self.entries.len() - max_len;
        let dropped: Vec<B256> = self.entries.drain(..excess).collect();
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, hash)| (*hash, index))
            .collect();
        dropped
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.positions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[B256] {
        &self.entries
    }
}
