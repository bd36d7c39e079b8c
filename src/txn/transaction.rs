use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferPool, BufferRef};
use crate::common::{DbError, Result, TxId};
use crate::storage::{BlockId, FileMgr};
use crate::txn::{ConcurrencyMgr, LockTable, RecoveryMgr};
use crate::wal::Log;

/// Client-facing transaction over the storage kernel.
///
/// Bundles the per-transaction lock view, pinned buffers and recovery
/// driver. Every read takes a shared lock on the target block and every
/// write an exclusive one; locks are held until `commit` or `rollback`
/// (strict two-phase locking), which makes all executions serializable.
///
/// A block must be pinned before it can be read or written, and the
/// transaction unpins everything it pinned when it ends.
pub struct Transaction {
    tx_num: TxId,
    file_mgr: Arc<FileMgr>,
    pool: Arc<BufferPool>,
    concur: ConcurrencyMgr,
    recovery: RecoveryMgr,
    buffers: BufferList,
}

impl Transaction {
    pub(crate) fn new(
        tx_num: TxId,
        file_mgr: Arc<FileMgr>,
        log: Arc<Log>,
        pool: Arc<BufferPool>,
        lock_tbl: Arc<LockTable>,
    ) -> Result<Self> {
        let recovery = RecoveryMgr::new(tx_num, log, Arc::clone(&pool))?;
        Ok(Self {
            tx_num,
            file_mgr,
            pool: Arc::clone(&pool),
            concur: ConcurrencyMgr::new(lock_tbl),
            recovery,
            buffers: BufferList::new(pool),
        })
    }

    pub fn tx_num(&self) -> TxId {
        self.tx_num
    }

    /// Pins the block into the buffer pool on behalf of this
    /// transaction. May wait a bounded time for a free frame.
    pub fn pin(&mut self, block: &BlockId) -> Result<()> {
        self.buffers.pin(block)
    }

    /// Releases one of this transaction's pins on the block.
    pub fn unpin(&mut self, block: &BlockId) -> Result<()> {
        self.buffers.unpin(block)
    }

    /// Reads the integer at `offset` of the pinned block, under a
    /// shared lock.
    pub fn get_int(&mut self, block: &BlockId, offset: usize) -> Result<i64> {
        self.concur.s_lock(block, self.tx_num)?;
        let buf = self.buffers.get(block)?;
        let guard = buf.lock().unwrap();
        guard.contents().get_int(offset)
    }

    /// Reads the string at `offset` of the pinned block, under a
    /// shared lock.
    pub fn get_string(&mut self, block: &BlockId, offset: usize) -> Result<String> {
        self.concur.s_lock(block, self.tx_num)?;
        let buf = self.buffers.get(block)?;
        let guard = buf.lock().unwrap();
        guard.contents().get_string(offset)
    }

    /// Writes an integer at `offset` of the pinned block under an
    /// exclusive lock. With `ok_to_log` the old value is first saved in
    /// an update log record; undo writes pass `false` so rollback does
    /// not generate new records.
    pub fn set_int(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: i64,
        ok_to_log: bool,
    ) -> Result<()> {
        self.concur.x_lock(block, self.tx_num)?;
        let buf = self.buffers.get(block)?;
        let mut guard = buf.lock().unwrap();
        let lsn = if ok_to_log {
            Some(self.recovery.log_set_int(&guard, block, offset)?)
        } else {
            None
        };
        guard.contents_mut().set_int(offset, val)?;
        guard.set_modified(self.tx_num, lsn);
        Ok(())
    }

    /// Writes a string at `offset` of the pinned block under an
    /// exclusive lock. See `set_int` for the `ok_to_log` contract.
    pub fn set_string(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: &str,
        ok_to_log: bool,
    ) -> Result<()> {
        self.concur.x_lock(block, self.tx_num)?;
        let buf = self.buffers.get(block)?;
        let mut guard = buf.lock().unwrap();
        let lsn = if ok_to_log {
            Some(self.recovery.log_set_string(&guard, block, offset)?)
        } else {
            None
        };
        guard.contents_mut().set_string(offset, val)?;
        guard.set_modified(self.tx_num, lsn);
        Ok(())
    }

    /// Number of blocks in `filename`, under a shared lock on the
    /// end-of-file sentinel block.
    pub fn size(&mut self, filename: &str) -> Result<i64> {
        let eof_block = BlockId::end_of_file(filename);
        self.concur.s_lock(&eof_block, self.tx_num)?;
        self.file_mgr.block_count(filename)
    }

    /// Appends a block to `filename` under an exclusive lock on the
    /// end-of-file sentinel block, serializing file growth across
    /// transactions.
    pub fn append(&mut self, filename: &str) -> Result<BlockId> {
        let eof_block = BlockId::end_of_file(filename);
        self.concur.x_lock(&eof_block, self.tx_num)?;
        self.file_mgr.append(filename)
    }

    pub fn block_size(&self) -> usize {
        self.file_mgr.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.pool.available()
    }

    /// Commits: forces this transaction's pages and a commit record to
    /// disk, then releases all locks and pins.
    pub fn commit(&mut self) -> Result<()> {
        self.recovery.commit()?;
        debug!("transaction {} committed", self.tx_num);
        self.finish();
        Ok(())
    }

    /// Rolls back: restores every value this transaction changed,
    /// forces a rollback record, then releases all locks and pins.
    pub fn rollback(&mut self) -> Result<()> {
        let recovery = self.recovery.clone();
        recovery.rollback(self)?;
        debug!("transaction {} rolled back", self.tx_num);
        self.finish();
        Ok(())
    }

    /// Runs crash recovery with this transaction driving the undo
    /// writes. On `LockAbort` the caller should release the blocking
    /// locks and call `recover` again; locks this transaction already
    /// acquired are kept across the retry.
    pub fn recover(&mut self) -> Result<()> {
        self.pool.flush_all(self.tx_num)?;
        let recovery = self.recovery.clone();
        recovery.recover(self)?;
        self.finish();
        Ok(())
    }

    /// Releases every lock this transaction holds without ending it.
    /// Normally `commit`/`rollback` do this; tests that stage stuck
    /// transactions for recovery use it directly.
    pub fn release_locks(&mut self) {
        self.concur.release_all(self.tx_num);
    }

    fn finish(&mut self) {
        self.concur.release_all(self.tx_num);
        self.buffers.unpin_all();
    }
}

/// The buffers a transaction currently has pinned, with the pin count
/// per block so `unpin_all` can undo every pin at end of transaction.
struct BufferList {
    pool: Arc<BufferPool>,
    buffers: HashMap<BlockId, BufferRef>,
    pin_count: HashMap<BlockId, usize>,
}

impl BufferList {
    fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            pool,
            buffers: HashMap::new(),
            pin_count: HashMap::new(),
        }
    }

    fn get(&self, block: &BlockId) -> Result<BufferRef> {
        self.buffers
            .get(block)
            .cloned()
            .ok_or_else(|| DbError::BlockNotPinned(block.clone()))
    }

    fn pin(&mut self, block: &BlockId) -> Result<()> {
        let buf = self.pool.pin(block)?;
        self.buffers.insert(block.clone(), buf);
        *self.pin_count.entry(block.clone()).or_insert(0) += 1;
        Ok(())
    }

    fn unpin(&mut self, block: &BlockId) -> Result<()> {
        let buf = self.get(block)?;
        self.pool.unpin(&buf);
        if let Some(count) = self.pin_count.get_mut(block) {
            *count -= 1;
            if *count == 0 {
                self.buffers.remove(block);
                self.pin_count.remove(block);
            }
        }
        Ok(())
    }

    // A block pinned n times is unpinned n times.
    fn unpin_all(&mut self) {
        for (block, count) in self.pin_count.drain() {
            if let Some(buf) = self.buffers.get(&block) {
                for _ in 0..count {
                    self.pool.unpin(buf);
                }
            }
        }
        self.buffers.clear();
    }
}
