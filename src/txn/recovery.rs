use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};

use crate::buffer::{Buffer, BufferPool};
use crate::common::{Lsn, Result, TxId};
use crate::storage::BlockId;
use crate::txn::{LogRecord, Transaction};
use crate::wal::Log;

/// Per-transaction recovery driver.
///
/// Writes the transaction's log records and replays the log for
/// rollback and crash recovery. Recovery is undo-only: `commit` forces
/// all of the transaction's pages before the commit record, so a
/// committed transaction never needs redo.
#[derive(Clone)]
pub struct RecoveryMgr {
    log: Arc<Log>,
    pool: Arc<BufferPool>,
    tx_num: TxId,
}

impl RecoveryMgr {
    /// Creates the manager for one transaction, appending its start
    /// record (not forced).
    pub(crate) fn new(tx_num: TxId, log: Arc<Log>, pool: Arc<BufferPool>) -> Result<Self> {
        LogRecord::Start(tx_num).write_to_log(&log)?;
        Ok(Self { log, pool, tx_num })
    }

    /// Forces the transaction's dirty pages, then writes and forces a
    /// commit record. Once this returns, both the updates and the
    /// commit record are durable.
    pub(crate) fn commit(&self) -> Result<()> {
        self.pool.flush_all(self.tx_num)?;
        let lsn = LogRecord::Commit(self.tx_num).write_to_log(&self.log)?;
        self.log.flush(lsn)
    }

    /// Undoes the transaction's updates newest-first, stopping at its
    /// start record, then flushes the restored pages and forces a
    /// rollback record.
    pub(crate) fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        for bytes in self.log.iterator()? {
            let record = LogRecord::from_bytes(&bytes?)?;
            if record.tx_id() == Some(self.tx_num) {
                if matches!(record, LogRecord::Start(_)) {
                    break;
                }
                debug!("rollback tx {}: undoing {record}", self.tx_num);
                record.undo(tx)?;
            }
        }

        self.pool.flush_all(self.tx_num)?;
        let lsn = LogRecord::Rollback(self.tx_num).write_to_log(&self.log)?;
        self.log.flush(lsn)
    }

    /// Rolls back every transaction that never finished, scanning the
    /// log newest-first. A checkpoint record ends the scan: everything
    /// before it is known finished. Ends by writing a fresh checkpoint
    /// so later recoveries stop here.
    ///
    /// Undo goes through the driving transaction's own locks, so a
    /// block still locked by a live transaction surfaces `LockAbort`;
    /// the caller must release those locks and retry.
    pub(crate) fn recover(&self, tx: &mut Transaction) -> Result<()> {
        info!("recovering database, tx {}", self.tx_num);
        let mut finished: HashSet<TxId> = HashSet::new();
        for bytes in self.log.iterator()? {
            let record = LogRecord::from_bytes(&bytes?)?;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit(t) | LogRecord::Rollback(t) => {
                    finished.insert(*t);
                }
                _ => {
                    if let Some(t) = record.tx_id() {
                        if !finished.contains(&t) {
                            debug!("recover: undoing {record}");
                            record.undo(tx)?;
                        }
                    }
                }
            }
        }

        self.pool.flush_all(self.tx_num)?;
        let lsn = LogRecord::Checkpoint.write_to_log(&self.log)?;
        self.log.flush(lsn)
    }

    /// Logs an update record holding the integer currently stored at
    /// `offset`, returning the record's LSN.
    pub(crate) fn log_set_int(
        &self,
        buf: &Buffer,
        block: &BlockId,
        offset: usize,
    ) -> Result<Lsn> {
        let old_val = buf.contents().get_int(offset)?;
        LogRecord::SetInt {
            tx: self.tx_num,
            block: block.clone(),
            offset,
            old_val,
        }
        .write_to_log(&self.log)
    }

    /// Logs an update record holding the string currently stored at
    /// `offset`, returning the record's LSN.
    pub(crate) fn log_set_string(
        &self,
        buf: &Buffer,
        block: &BlockId,
        offset: usize,
    ) -> Result<Lsn> {
        let old_val = buf.contents().get_string(offset)?;
        LogRecord::SetString {
            tx: self.tx_num,
            block: block.clone(),
            offset,
            old_val,
        }
        .write_to_log(&self.log)
    }
}
