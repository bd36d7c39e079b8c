use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::common::{Lsn, Result, TxId};
use crate::storage::{BlockId, FileMgr, Page};
use crate::wal::Log;

/// One frame of the buffer pool: a page plus the bookkeeping that ties
/// it to a disk block.
///
/// A frame is clean when `modifying_tx` is `None`. Once a transaction
/// modifies the page, the frame remembers that transaction and the LSN
/// of its latest update record; the page may then only reach disk after
/// the log has been flushed up to that LSN.
///
/// Frames are created at pool startup and never destroyed; they are
/// rebound to different blocks over their lifetime.
pub struct Buffer {
    id: Uuid,
    file_mgr: Arc<FileMgr>,
    log: Arc<Log>,
    contents: Page,
    block: Option<BlockId>,
    pins: u32,
    modifying_tx: Option<TxId>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(file_mgr: Arc<FileMgr>, log: Arc<Log>) -> Self {
        let contents = Page::new(file_mgr.block_size());
        Self {
            id: Uuid::new_v4(),
            file_mgr,
            log,
            contents,
            block: None,
            pins: 0,
            modifying_tx: None,
            lsn: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn contents(&self) -> &Page {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn pins(&self) -> u32 {
        self.pins
    }

    /// The transaction that dirtied this frame, if any.
    pub fn modifying_tx(&self) -> Option<TxId> {
        self.modifying_tx
    }

    /// Sequence number of the newest update log record covering this
    /// frame's page.
    pub fn lsn(&self) -> Option<Lsn> {
        self.lsn
    }

    /// Marks the frame dirty. `lsn` is the sequence number of the update
    /// log record covering the change, or `None` when the change was
    /// made with logging disabled (undo writes keep the earlier LSN).
    pub fn set_modified(&mut self, tx: TxId, lsn: Option<Lsn>) {
        self.modifying_tx = Some(tx);
        if lsn.is_some() {
            self.lsn = lsn;
        }
    }

    /// Writes the page to its block if the frame is dirty, forcing the
    /// WAL up to the frame's LSN first. Clean frames are left alone.
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.modifying_tx.is_some() {
            if let Some(lsn) = self.lsn {
                self.log.flush(lsn)?;
            }
            if let Some(block) = &self.block {
                self.file_mgr.write(block, &self.contents)?;
            }
            self.modifying_tx = None;
        }
        Ok(())
    }

    /// Rebinds the frame to `block`: flushes any dirty contents to the
    /// old block, then reads the new block in. Pin count resets.
    pub(crate) fn assign_to_block(&mut self, block: BlockId) -> Result<()> {
        self.flush()?;
        self.file_mgr.read(&block, &mut self.contents)?;
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of a frame with no pins");
        self.pins = self.pins.saturating_sub(1);
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(
                f,
                "buffer {}: [{}] pinned: {}",
                self.id,
                block,
                self.is_pinned()
            ),
            None => write!(f, "buffer {}: unbound", self.id),
        }
    }
}
