// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Per-account locks for in-process writers.
//!
//! A unit of work that touches several accounts locks them in ascending id
//! order, so two transfers moving money in opposite directions between the
//! same pair can never wait on each other in a cycle.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

static GLOBAL: Lazy<AccountLocks> = Lazy::new(AccountLocks::default);

#[derive(Default)]
struct Slot {
    busy: Mutex<bool>,
    freed: Condvar,
}

impl Slot {
    fn lock(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while *busy {
            busy = self
                .freed
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *busy = true;
    }

    fn unlock(&self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        *busy = false;
        self.freed.notify_one();
    }
}

#[derive(Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<i64, Arc<Slot>>>,
}

/// Every account lock of one unit of work; released on drop.
pub struct HeldLocks {
    ids: Vec<i64>,
    slots: Vec<Arc<Slot>>,
}

impl HeldLocks {
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        for slot in self.slots.iter().rev() {
            slot.unlock();
        }
    }
}

impl AccountLocks {
    pub fn global() -> &'static AccountLocks {
        &GLOBAL
    }

    fn slot(&self, id: i64) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(id).or_default().clone()
    }

    /// Locks the given accounts in ascending id order, ignoring duplicates.
    pub fn acquire(&self, ids: &[i64]) -> HeldLocks {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut slots = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = self.slot(*id);
            slot.lock();
            slots.push(slot);
        }
        HeldLocks { ids, slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn acquire_sorts_and_dedups() {
        let locks = AccountLocks::default();
        let held = locks.acquire(&[9, 3, 9, 1]);
        assert_eq!(held.ids(), &[1, 3, 9]);
    }

    #[test]
    fn released_on_drop() {
        let locks = AccountLocks::default();
        drop(locks.acquire(&[4]));
        let again = locks.acquire(&[4]);
        assert_eq!(again.ids(), &[4]);
    }

    #[test]
    fn same_account_is_exclusive() {
        let locks = Arc::new(AccountLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _held = locks.acquire(&[7]);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn opposite_order_requests_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::default());
        let a = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _held = locks.acquire(&[1, 2]);
                }
            })
        };
        let b = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _held = locks.acquire(&[2, 1]);
                }
            })
        };
        a.join().unwrap();
        b.join().unwrap();
    }
}
