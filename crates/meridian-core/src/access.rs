//! Role gates and the reentrancy lock shared by every component.
//!
//! Each entry point evaluates its capability check before touching state. The
//! checks answer with a boolean; the component maps a refusal onto its own
//! typed authorization error.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single governance owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.owner == *caller
    }

    pub fn transfer(&mut self, new_owner: Address) {
        self.owner = new_owner;
    }
}

/// Relayers permitted to deliver inbound messages.
///
/// When disabled, delivery is open to anyone but the trusted (proof-less)
/// execution path is closed entirely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerAllowList {
    enabled: bool,
    relayers: BTreeSet<Address>,
}

impl RelayerAllowList {
    pub fn new(enabled: bool, relayers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            enabled,
            relayers: relayers.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn contains(&self, relayer: &Address) -> bool {
        self.relayers.contains(relayer)
    }

    /// Returns true if the membership changed.
    pub fn set(&mut self, relayer: Address, allowed: bool) -> bool {
        if allowed {
            self.relayers.insert(relayer)
        } else {
            self.relayers.remove(&relayer)
        }
    }

    /// May `caller` deliver a proven message?
    pub fn permits(&self, caller: &Address) -> bool {
        !self.enabled || self.relayers.contains(caller)
    }

    /// May `caller` deliver a message without a proof?
    pub fn permits_trusted(&self, caller: &Address) -> bool {
        self.enabled && self.relayers.contains(caller)
    }

    pub fn relayers(&self) -> impl Iterator<Item = &Address> {
        self.relayers.iter()
    }
}

/// Advisory lock held for the duration of any entry point that calls into
/// less-trusted code. The guard releases the lock on drop, so every exit path
/// (including `?` early returns) unlocks it.
#[derive(Clone, Debug, Default)]
pub struct ReentrancyLock {
    entered: Arc<AtomicBool>,
}

/// Proof that a [`ReentrancyLock`] is held.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ReentrancyGuard {
    entered: Arc<AtomicBool>,
}

impl ReentrancyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if an outer frame already holds it.
    pub fn try_enter(&self) -> Option<ReentrancyGuard> {
        if self.entered.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ReentrancyGuard {
            entered: Arc::clone(&self.entered),
        })
    }

    pub fn is_locked(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        self.entered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownable_transfer() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let mut ownable = Ownable::new(a);
        assert!(ownable.is_owner(&a));
        ownable.transfer(b);
        assert!(!ownable.is_owner(&a));
        assert!(ownable.is_owner(&b));
    }

    #[test]
    fn test_allow_list_disabled_is_open_but_untrusted() {
        let relayer = Address::repeat_byte(7);
        let list = RelayerAllowList::new(false, [relayer]);
        assert!(list.permits(&Address::repeat_byte(9)));
        assert!(!list.permits_trusted(&relayer));
    }

    #[test]
    fn test_allow_list_enabled_gates_both_paths() {
        let relayer = Address::repeat_byte(7);
        let stranger = Address::repeat_byte(9);
        let list = RelayerAllowList::new(true, [relayer]);
        assert!(list.permits(&relayer));
        assert!(list.permits_trusted(&relayer));
        assert!(!list.permits(&stranger));
        assert!(!list.permits_trusted(&stranger));
    }

    #[test]
    fn test_allow_list_set_reports_change() {
        let relayer = Address::repeat_byte(7);
        let mut list = RelayerAllowList::new(true, []);
        assert!(list.set(relayer, true));
        assert!(!list.set(relayer, true));
        assert!(list.set(relayer, false));
        assert!(!list.contains(&relayer));
    }

    #[test]
    fn test_reentrancy_lock_rejects_nested_entry() {
        let lock = ReentrancyLock::new();
        let guard = lock.try_enter().expect("first entry");
        assert!(lock.is_locked());
        assert!(lock.try_enter().is_none());
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_enter().is_some());
    }

    #[test]
    fn test_reentrancy_lock_released_on_error_path() {
        fn fallible(lock: &ReentrancyLock) -> Result<(), &'static str> {
            let _guard = lock.try_enter().ok_or("reentered")?;
            Err("callee failed")
        }

        let lock = ReentrancyLock::new();
        assert_eq!(fallible(&lock), Err("callee failed"));
        assert!(!lock.is_locked());
    }
}
