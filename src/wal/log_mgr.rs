use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::{DbError, Lsn, Result};
use crate::storage::{BlockId, FileMgr, Page, I64_SIZE};
use crate::wal::LogIterator;

/// Write-ahead log. Each change to the database is first recorded here
/// so that it can be reversed on rollback or after a crash.
///
/// Records are appended right-to-left within each block of the log file,
/// which makes newest-first reading cheap. With 15 records appended the
/// sequence numbers land like this:
///
/// ```text
/// +-------------+--------------------+---------------------+
/// | 3, 2, 1, 0  |  9, 8, 7, 6, 5, 4  |  14, 13, 12, 11, 10 |
/// +-------------+--------------------+---------------------+
/// | block 0     |  block 1           |  block 2            |
/// +-------------+--------------------+---------------------+
/// ```
///
/// Blocks hold different record counts because records vary in size.
/// The first 8 bytes of every block store the offset of the most
/// recently written record (`last_record_pos`); record bodies occupy
/// `[last_record_pos .. block_size)`. A 40-byte block after appending
/// "abc" then "defgh":
///
/// ```text
/// +===============+=========+========+=======+========+=======+
/// | last_rec_pos  |  empty  | len    | bytes | len    | bytes |
/// +===============+=========+========+=======+========+=======+
/// | 16            |         | 5      | defgh | 3      | abc   |
/// +---------------+---------+--------+-------+--------+-------+
/// 0               8         16       24      29       37      40
/// ```
///
/// One in-memory page mirrors the tail block; appends go to that page
/// and reach disk on `flush` or when the page fills up.
pub struct Log {
    file_mgr: Arc<FileMgr>,
    log_file: String,
    state: Mutex<LogState>,

    // Incremented on every append.
    latest_lsn: AtomicI64,
    // Raised to latest_lsn whenever the tail page is written out.
    last_saved_lsn: AtomicI64,
}

struct LogState {
    current_block: BlockId,
    page: Page,
}

impl Log {
    /// Opens the log manager for `log_file`, creating the file with one
    /// empty block when it does not exist yet. On an existing file the
    /// tail block is read back into memory so appends continue where
    /// the previous process stopped.
    pub fn new(file_mgr: Arc<FileMgr>, log_file: &str) -> Result<Self> {
        let mut page = Page::new(file_mgr.block_size());
        let block_count = file_mgr.block_count(log_file)?;

        let current_block = if block_count == 0 {
            Self::append_new_block(&file_mgr, log_file, &mut page)?
        } else {
            let block = BlockId::new(log_file, block_count - 1);
            file_mgr.read(&block, &mut page)?;
            block
        };

        Ok(Self {
            file_mgr,
            log_file: log_file.to_string(),
            state: Mutex::new(LogState {
                current_block,
                page,
            }),
            latest_lsn: AtomicI64::new(0),
            last_saved_lsn: AtomicI64::new(0),
        })
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// The block currently mirrored by the in-memory tail page.
    pub fn current_block(&self) -> BlockId {
        self.state.lock().unwrap().current_block.clone()
    }

    pub fn latest_lsn(&self) -> Lsn {
        Lsn(self.latest_lsn.load(Ordering::SeqCst))
    }

    pub fn last_saved_lsn(&self) -> Lsn {
        Lsn(self.last_saved_lsn.load(Ordering::SeqCst))
    }

    /// Appends a record to the tail page and returns its sequence
    /// number. When the record does not fit in the current block, the
    /// page is forced to disk and a fresh block becomes the tail.
    /// The record itself is not durable until a flush covers its LSN.
    pub fn append(&self, record: &[u8]) -> Result<Lsn> {
        let mut state = self.state.lock().unwrap();

        let mut last_record_pos = Self::last_record_pos(&state.page)?;
        let bytes_needed = record.len() + I64_SIZE;
        if last_record_pos < bytes_needed + I64_SIZE {
            // Record does not fit next to the block header; start a new block.
            self.flush_state(&state)?;
            let new_block =
                Self::append_new_block(&self.file_mgr, &self.log_file, &mut state.page)?;
            state.current_block = new_block;
            last_record_pos = Self::last_record_pos(&state.page)?;
            if last_record_pos < bytes_needed + I64_SIZE {
                // Larger than an empty block can ever hold.
                return Err(DbError::OutOfBounds);
            }
        }

        let record_pos = last_record_pos - bytes_needed;
        state.page.set_bytes(record_pos, record)?;
        state.page.set_int(0, record_pos as i64)?;

        let lsn = self.latest_lsn.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Lsn(lsn))
    }

    /// Ensures the record with the given sequence number is on disk.
    /// A no-op when a previous flush already covered it.
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let state = self.state.lock().unwrap();
        if lsn.0 > self.last_saved_lsn.load(Ordering::SeqCst) {
            self.flush_state(&state)?;
        }
        Ok(())
    }

    /// Unconditionally writes the tail page to disk.
    pub fn force(&self) -> Result<()> {
        let state = self.state.lock().unwrap();
        self.flush_state(&state)
    }

    /// Returns an iterator over the log records, newest first. The log
    /// is forced first so every in-memory record is visible; the
    /// iterator then reads blocks from disk with its own page buffer.
    pub fn iterator(&self) -> Result<LogIterator> {
        let state = self.state.lock().unwrap();
        self.flush_state(&state)?;
        LogIterator::new(Arc::clone(&self.file_mgr), state.current_block.clone())
    }

    fn flush_state(&self, state: &LogState) -> Result<()> {
        self.file_mgr.write(&state.current_block, &state.page)?;
        self.last_saved_lsn
            .store(self.latest_lsn.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    // Extends the log file by one block, seeds the tail page header with
    // block_size (an empty block) and writes it out.
    fn append_new_block(file_mgr: &FileMgr, log_file: &str, page: &mut Page) -> Result<BlockId> {
        let block = file_mgr.append(log_file)?;
        page.set_int(0, file_mgr.block_size() as i64)?;
        file_mgr.write(&block, page)?;
        Ok(block)
    }

    fn last_record_pos(page: &Page) -> Result<usize> {
        let pos = page.get_int(0)?;
        usize::try_from(pos)
            .map_err(|_| DbError::Corrupt(format!("bad log block header: {pos}")))
    }
}
