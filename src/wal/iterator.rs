use std::sync::Arc;

use crate::common::{DbError, Result};
use crate::storage::{BlockId, FileMgr, Page, I64_SIZE};

/// Walks log records from latest to oldest.
///
/// Within a block, records sit left-to-right starting at the header's
/// `last_record_pos` in newest-to-oldest order, so a forward scan of the
/// block already yields newest first. When a block is exhausted the
/// iterator steps to the previous block of the file.
///
/// The iterator owns its page buffer and reads blocks from disk on
/// demand; it never aliases the writer's in-memory tail page.
pub struct LogIterator {
    file_mgr: Arc<FileMgr>,
    block: BlockId,
    page: Page,
    current_pos: usize,
}

impl LogIterator {
    pub(crate) fn new(file_mgr: Arc<FileMgr>, block: BlockId) -> Result<Self> {
        let page = Page::new(file_mgr.block_size());
        let mut iter = Self {
            file_mgr,
            block: block.clone(),
            page,
            current_pos: 0,
        };
        iter.move_to_block(block)?;
        Ok(iter)
    }

    /// True while records remain in this block or any earlier block.
    pub fn has_next(&self) -> bool {
        self.current_pos < self.file_mgr.block_size() || self.block.num() > 0
    }

    // Reads the given block and positions at its most recent record.
    fn move_to_block(&mut self, block: BlockId) -> Result<()> {
        self.file_mgr.read(&block, &mut self.page)?;
        let pos = self.page.get_int(0)?;
        self.current_pos = usize::try_from(pos).map_err(|_| {
            DbError::Corrupt(format!("bad log block header in [{block}]: {pos}"))
        })?;
        self.block = block;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Vec<u8>> {
        if self.current_pos >= self.file_mgr.block_size() {
            let prev = BlockId::new(self.block.filename(), self.block.num() - 1);
            self.move_to_block(prev)?;
        }

        let record = self
            .page
            .get_bytes(self.current_pos)
            .map_err(|_| {
                DbError::Corrupt(format!(
                    "bad log record at pos {} in [{}]",
                    self.current_pos, self.block
                ))
            })?
            .to_vec();
        self.current_pos += record.len() + I64_SIZE;
        Ok(record)
    }
}

impl Iterator for LogIterator {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_record())
    }
}
