//! Manages shared/exclusive locks on pages.

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

use super::{LockMode, TransactionId};
use crate::file::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lock {
    mode: LockMode,
    owner: TransactionId,
}

/// The lock table. Every operation runs inside one critical section, and
/// waiters are woken whenever a lock is released.
///
/// Per page, either a single exclusive lock is held or any number of shared
/// locks from distinct transactions. Lists never stay empty in the table.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<AHashMap<PageId, Vec<Lock>>>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single non-blocking attempt to lock `page_id` for `tx_id`.
    pub fn acquire(&self, tx_id: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        Self::try_grant(&mut table, tx_id, page_id, mode)
    }

    /// Keep trying to lock until granted or `deadline` passes.
    pub fn acquire_until(
        &self,
        tx_id: TransactionId,
        page_id: PageId,
        mode: LockMode,
        deadline: Instant,
    ) -> bool {
        let mut table = self.table.lock();
        loop {
            if Self::try_grant(&mut table, tx_id, page_id, mode) {
                return true;
            }
            if self.released.wait_until(&mut table, deadline).timed_out() {
                // One last look: a release may have raced with the timeout
                return Self::try_grant(&mut table, tx_id, page_id, mode);
            }
        }
    }

    fn try_grant(
        table: &mut AHashMap<PageId, Vec<Lock>>,
        tx_id: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> bool {
        let request = Lock {
            mode,
            owner: tx_id,
        };

        let Some(locks) = table.get_mut(&page_id) else {
            table.insert(page_id, vec![request]);
            return true;
        };

        if locks.len() == 1 {
            let held = locks[0];
            if held.owner == tx_id {
                // Exclusive already covers everything; shared upgrades in place
                if held.mode == LockMode::Shared && mode == LockMode::Exclusive {
                    locks[0].mode = LockMode::Exclusive;
                }
                return true;
            }
            if held.mode == LockMode::Shared && mode == LockMode::Shared {
                locks.push(request);
                return true;
            }
            return false;
        }

        // Several holders are necessarily all shared
        if mode == LockMode::Exclusive {
            return false;
        }
        if !locks.iter().any(|l| l.owner == tx_id) {
            locks.push(request);
        }
        true
    }

    /// Release the lock `tx_id` holds on `page_id`, if any.
    pub fn release(&self, tx_id: TransactionId, page_id: PageId) {
        let mut table = self.table.lock();
        if let Some(locks) = table.get_mut(&page_id) {
            if let Some(pos) = locks.iter().position(|l| l.owner == tx_id) {
                locks.remove(pos);
            }
            if locks.is_empty() {
                table.remove(&page_id);
            }
        }
        drop(table);
        self.released.notify_all();
    }

    /// Release every lock held by `tx_id`.
    pub fn release_all(&self, tx_id: TransactionId) {
        let mut table = self.table.lock();
        table.retain(|_, locks| {
            locks.retain(|l| l.owner != tx_id);
            !locks.is_empty()
        });
        drop(table);
        self.released.notify_all();
    }

    /// Whether `tx_id` holds any lock on `page_id`.
    pub fn holds(&self, tx_id: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tx_id, page_id).is_some()
    }

    /// The mode of the lock `tx_id` holds on `page_id`.
    pub fn lock_mode(&self, tx_id: TransactionId, page_id: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        table
            .get(&page_id)?
            .iter()
            .find(|l| l.owner == tx_id)
            .map(|l| l.mode)
    }

    /// All holders of a lock on `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<(TransactionId, LockMode)> {
        let table = self.table.lock();
        table
            .get(&page_id)
            .map(|locks| locks.iter().map(|l| (l.owner, l.mode)).collect())
            .unwrap_or_default()
    }

    /// Pages on which `tx_id` holds a lock, in no particular order.
    pub fn locked_pages(&self, tx_id: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        table
            .iter()
            .filter(|(_, locks)| locks.iter().any(|l| l.owner == tx_id))
            .map(|(page_id, _)| *page_id)
            .collect()
    }

    /// Number of pages with at least one lock.
    pub fn locked_page_count(&self) -> usize {
        self.table.lock().len()
    }
}
