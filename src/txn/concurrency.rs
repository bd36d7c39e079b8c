use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use log::debug;

use crate::common::{DbError, Result, TxId};
use crate::storage::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    tx: TxId,
    kind: LockKind,
}

/// Global per-block lock table shared by every transaction of a
/// database. One long-lived instance is owned by the database handle.
///
/// Deadlocks are avoided with wait-die: a requester that conflicts with
/// an older holder aborts (`LockAbort`) and is expected to roll back
/// and retry; a requester that conflicts only with younger holders
/// waits. Waits park on a condvar signalled by `unlock`. Since every
/// wait edge points from an older to a younger transaction, no cycle
/// can form.
pub struct LockTable {
    state: Mutex<HashMap<BlockId, Vec<LockEntry>>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    /// Grants a shared lock on `block`. Any number of transactions may
    /// hold a shared lock at once; the conflict is an exclusive lock
    /// held by someone else.
    pub fn s_lock(&self, block: &BlockId, tx: TxId) -> Result<()> {
        self.acquire(block, tx, LockKind::Shared)
    }

    /// Grants an exclusive lock on `block`. Conflicts with every lock
    /// held by another transaction.
    pub fn x_lock(&self, block: &BlockId, tx: TxId) -> Result<()> {
        self.acquire(block, tx, LockKind::Exclusive)
    }

    fn acquire(&self, block: &BlockId, tx: TxId, kind: LockKind) -> Result<()> {
        let mut locks = self.state.lock().unwrap();
        loop {
            let mut conflicts = false;
            let mut older_conflict = false;
            if let Some(entries) = locks.get(block) {
                for entry in entries.iter().filter(|e| e.tx != tx) {
                    let blocks_us = match kind {
                        LockKind::Shared => entry.kind == LockKind::Exclusive,
                        LockKind::Exclusive => true,
                    };
                    if blocks_us {
                        conflicts = true;
                        if entry.tx < tx {
                            older_conflict = true;
                        }
                    }
                }
            }

            if !conflicts {
                locks
                    .entry(block.clone())
                    .or_default()
                    .push(LockEntry { tx, kind });
                return Ok(());
            }
            if older_conflict {
                // Wait-die: the younger requester dies.
                debug!("tx {tx} aborted requesting {kind:?} lock on [{block}]");
                return Err(DbError::LockAbort);
            }
            locks = self.released.wait(locks).unwrap();
        }
    }

    /// Releases every lock `tx` holds on `block` and wakes waiters.
    pub fn unlock(&self, block: &BlockId, tx: TxId) {
        let mut locks = self.state.lock().unwrap();
        let now_empty = match locks.get_mut(block) {
            Some(entries) => {
                entries.retain(|e| e.tx != tx);
                entries.is_empty()
            }
            None => false,
        };
        if now_empty {
            locks.remove(block);
        }
        self.released.notify_all();
    }

    /// Drops every lock. Intended for tests that need a clean table
    /// without rebuilding the database.
    pub fn reset(&self) {
        self.state.lock().unwrap().clear();
        self.released.notify_all();
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-transaction view of the lock table. Remembers the strongest
/// lock this transaction holds per block so repeated requests stay
/// local, and releases everything at end of transaction (strict
/// two-phase locking).
pub struct ConcurrencyMgr {
    lock_tbl: Arc<LockTable>,
    locks: HashMap<BlockId, LockKind>,
}

impl ConcurrencyMgr {
    pub fn new(lock_tbl: Arc<LockTable>) -> Self {
        Self {
            lock_tbl,
            locks: HashMap::new(),
        }
    }

    /// Obtains a shared lock if this transaction holds nothing on the
    /// block yet.
    pub fn s_lock(&mut self, block: &BlockId, tx: TxId) -> Result<()> {
        if !self.locks.contains_key(block) {
            self.lock_tbl.s_lock(block, tx)?;
            self.locks.insert(block.clone(), LockKind::Shared);
        }
        Ok(())
    }

    /// Obtains an exclusive lock, upgrading through a shared lock when
    /// the transaction does not hold one already. Both table entries
    /// stay until `release_all`.
    pub fn x_lock(&mut self, block: &BlockId, tx: TxId) -> Result<()> {
        if self.locks.get(block) != Some(&LockKind::Exclusive) {
            self.s_lock(block, tx)?;
            self.lock_tbl.x_lock(block, tx)?;
            self.locks.insert(block.clone(), LockKind::Exclusive);
        }
        Ok(())
    }

    /// Releases every lock held by this transaction.
    pub fn release_all(&mut self, tx: TxId) {
        for block in self.locks.keys() {
            self.lock_tbl.unlock(block, tx);
        }
        self.locks.clear();
    }
}
