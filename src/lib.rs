//! Transactional storage kernel over fixed-size file blocks.
//!
//! Four subsystems stack up to ACID transactions:
//!
//! - [`storage`]: pages with a typed byte codec, and block-oriented
//!   file IO.
//! - [`wal`]: a write-ahead log appended right-to-left within blocks
//!   and read newest-first.
//! - [`buffer`]: a pinning buffer pool that forces the WAL before any
//!   dirty page reaches disk.
//! - [`txn`]: transactions with per-block shared/exclusive locks,
//!   wait-die deadlock avoidance and undo-only recovery.
//!
//! [`SimpleDB`] wires them together:
//!
//! ```no_run
//! use simpledb::{DbConfig, SimpleDB};
//! use simpledb::storage::BlockId;
//!
//! # fn main() -> simpledb::Result<()> {
//! let db = SimpleDB::new(DbConfig::new("mydb").block_size(400).buffer_count(8))?;
//! let mut tx = db.new_tx()?;
//! let block = tx.append("accounts")?;
//! tx.pin(&block)?;
//! tx.set_int(&block, 0, 42, true)?;
//! tx.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod storage;
pub mod txn;
pub mod wal;

pub use common::{DbConfig, DbError, Lsn, Result, TxId};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use buffer::BufferPool;
use storage::FileMgr;
use txn::{LockTable, Transaction};
use wal::Log;

/// A database handle: owns the file manager, log, buffer pool and lock
/// table shared by every transaction, plus the transaction-id
/// allocator.
///
/// Transaction ids come from an atomic counter seeded with the wall
/// clock at startup, so they are strictly increasing within a process
/// and a smaller id always means an older transaction.
pub struct SimpleDB {
    file_mgr: Arc<FileMgr>,
    log: Arc<Log>,
    pool: Arc<BufferPool>,
    lock_tbl: Arc<LockTable>,
    next_tx_num: AtomicI64,
}

impl SimpleDB {
    pub fn new(config: DbConfig) -> Result<Self> {
        let file_mgr = Arc::new(FileMgr::new(&config.db_dir, config.block_size)?);
        let log = Arc::new(Log::new(Arc::clone(&file_mgr), &config.log_file)?);
        let pool = Arc::new(BufferPool::new(
            Arc::clone(&file_mgr),
            Arc::clone(&log),
            config.buffer_count,
        ));

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        Ok(Self {
            file_mgr,
            log,
            pool,
            lock_tbl: Arc::new(LockTable::new()),
            next_tx_num: AtomicI64::new(seed),
        })
    }

    /// Starts a new transaction.
    pub fn new_tx(&self) -> Result<Transaction> {
        let tx_num = TxId(self.next_tx_num.fetch_add(1, Ordering::SeqCst));
        Transaction::new(
            tx_num,
            Arc::clone(&self.file_mgr),
            Arc::clone(&self.log),
            Arc::clone(&self.pool),
            Arc::clone(&self.lock_tbl),
        )
    }

    pub fn file_mgr(&self) -> &Arc<FileMgr> {
        &self.file_mgr
    }

    pub fn log(&self) -> &Arc<Log> {
        &self.log
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.lock_tbl
    }
}
