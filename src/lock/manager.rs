//! Lock manager — per-RID shared/exclusive locks under a no-wait policy
//! (§4.5). The lock id for a record is its base RID, whether the caller is
//! reading through the base slot directly or through its tail chain.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::rid::Rid;

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockState {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

pub struct LockManager {
    locks: Mutex<HashMap<Rid, LockState>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to acquire `mode` on `rid` for `txn`. No waiting: a
    /// conflicting, non-re-entrant request is denied immediately rather
    /// than blocked, per the table in §4.5.
    pub fn acquire(&self, rid: Rid, mode: LockMode, txn: TransactionId) -> bool {
        let mut locks = self.locks.lock();

        let Some(state) = locks.get_mut(&rid) else {
            locks.insert(
                rid,
                LockState {
                    mode,
                    holders: HashSet::from([txn]),
                },
            );
            return true;
        };

        let already_holds = state.holders.contains(&txn);

        match mode {
            LockMode::Shared => match state.mode {
                LockMode::Shared => {
                    state.holders.insert(txn);
                    true
                }
                LockMode::Exclusive => already_holds,
            },
            LockMode::Exclusive => {
                if already_holds {
                    if state.mode == LockMode::Exclusive {
                        true
                    } else if state.holders.len() == 1 {
                        state.mode = LockMode::Exclusive;
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
        }
    }

    pub fn release(&self, rid: Rid, txn: TransactionId) {
        let mut locks = self.locks.lock();
        if let Some(state) = locks.get_mut(&rid) {
            state.holders.remove(&txn);
            if state.holders.is_empty() {
                locks.remove(&rid);
            }
        }
    }

    pub fn release_all(&self, txn: TransactionId) {
        let mut locks = self.locks.lock();
        locks.retain(|_, state| {
            state.holders.remove(&txn);
            !state.holders.is_empty()
        });
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
