use std::fmt;

use crate::common::{DbError, Lsn, Result, TxId};
use crate::storage::{max_len, BlockId, Page, I64_SIZE};
use crate::txn::Transaction;
use crate::wal::Log;

const CHECKPOINT: i64 = 0;
const START: i64 = 1;
const COMMIT: i64 = 2;
const ROLLBACK: i64 = 3;
const SET_INT: i64 = 4;
const SET_STRING: i64 = 5;

/// One write-ahead log record.
///
/// The flat encoding starts with an 8-byte kind tag; the remaining
/// fields follow in order using the page codec (big-endian integers,
/// length-prefixed strings):
///
/// ```text
/// <CHECKPOINT>
/// <START    txid>
/// <COMMIT   txid>
/// <ROLLBACK txid>
/// <SETINT    txid, filename, block#, offset, old value>
/// <SETSTRING txid, filename, block#, offset, old value>
/// ```
///
/// Update records carry only the old value: pages are forced at
/// commit, so recovery never needs to redo, only undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Checkpoint,
    Start(TxId),
    Commit(TxId),
    Rollback(TxId),
    SetInt {
        tx: TxId,
        block: BlockId,
        offset: usize,
        old_val: i64,
    },
    SetString {
        tx: TxId,
        block: BlockId,
        offset: usize,
        old_val: String,
    },
}

impl LogRecord {
    /// Decodes a record from its flat byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(bytes).map_err(|e| match e {
            DbError::OutOfBounds => DbError::Corrupt("truncated log record".to_string()),
            other => other,
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let page = Page::from_bytes(bytes.to_vec());
        let tag = page.get_int(0)?;
        match tag {
            CHECKPOINT => Ok(Self::Checkpoint),
            START => Ok(Self::Start(TxId(page.get_int(I64_SIZE)?))),
            COMMIT => Ok(Self::Commit(TxId(page.get_int(I64_SIZE)?))),
            ROLLBACK => Ok(Self::Rollback(TxId(page.get_int(I64_SIZE)?))),
            SET_INT => {
                let (tx, block, offset, pos) = Self::decode_update_header(&page)?;
                let old_val = page.get_int(pos)?;
                Ok(Self::SetInt {
                    tx,
                    block,
                    offset,
                    old_val,
                })
            }
            SET_STRING => {
                let (tx, block, offset, pos) = Self::decode_update_header(&page)?;
                let old_val = page.get_string(pos)?;
                Ok(Self::SetString {
                    tx,
                    block,
                    offset,
                    old_val,
                })
            }
            other => Err(DbError::Corrupt(format!("unknown log record tag {other}"))),
        }
    }

    // Shared prefix of the two update kinds: txid, filename, block
    // number and offset. Returns the position of the old value.
    fn decode_update_header(page: &Page) -> Result<(TxId, BlockId, usize, usize)> {
        let mut pos = I64_SIZE;
        let tx = TxId(page.get_int(pos)?);
        pos += I64_SIZE;
        let filename = page.get_string(pos)?;
        pos += max_len(filename.len());
        let block_num = page.get_int(pos)?;
        pos += I64_SIZE;
        let offset = page.get_int(pos)?;
        let offset = usize::try_from(offset)
            .map_err(|_| DbError::Corrupt(format!("bad update record offset {offset}")))?;
        pos += I64_SIZE;
        Ok((tx, BlockId::new(filename, block_num), offset, pos))
    }

    /// Encodes the record into its flat byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Checkpoint => {
                let mut page = Page::new(I64_SIZE);
                page.set_int(0, CHECKPOINT)?;
                Ok(page.contents().to_vec())
            }
            Self::Start(tx) => Self::encode_tx_only(START, *tx),
            Self::Commit(tx) => Self::encode_tx_only(COMMIT, *tx),
            Self::Rollback(tx) => Self::encode_tx_only(ROLLBACK, *tx),
            Self::SetInt {
                tx,
                block,
                offset,
                old_val,
            } => {
                let size = 5 * I64_SIZE + max_len(block.filename().len());
                let mut page = Page::new(size);
                let pos = Self::encode_update_header(&mut page, SET_INT, *tx, block, *offset)?;
                page.set_int(pos, *old_val)?;
                Ok(page.contents().to_vec())
            }
            Self::SetString {
                tx,
                block,
                offset,
                old_val,
            } => {
                let size =
                    4 * I64_SIZE + max_len(block.filename().len()) + max_len(old_val.len());
                let mut page = Page::new(size);
                let pos = Self::encode_update_header(&mut page, SET_STRING, *tx, block, *offset)?;
                page.set_string(pos, old_val)?;
                Ok(page.contents().to_vec())
            }
        }
    }

    fn encode_tx_only(tag: i64, tx: TxId) -> Result<Vec<u8>> {
        let mut page = Page::new(2 * I64_SIZE);
        page.set_int(0, tag)?;
        page.set_int(I64_SIZE, tx.0)?;
        Ok(page.contents().to_vec())
    }

    fn encode_update_header(
        page: &mut Page,
        tag: i64,
        tx: TxId,
        block: &BlockId,
        offset: usize,
    ) -> Result<usize> {
        let mut pos = 0;
        page.set_int(pos, tag)?;
        pos += I64_SIZE;
        page.set_int(pos, tx.0)?;
        pos += I64_SIZE;
        page.set_string(pos, block.filename())?;
        pos += max_len(block.filename().len());
        page.set_int(pos, block.num())?;
        pos += I64_SIZE;
        page.set_int(pos, offset as i64)?;
        pos += I64_SIZE;
        Ok(pos)
    }

    /// Appends the encoded record to the log and returns its LSN.
    pub fn write_to_log(&self, log: &Log) -> Result<Lsn> {
        log.append(&self.to_bytes()?)
    }

    /// The transaction the record belongs to; `None` for checkpoints.
    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            Self::Checkpoint => None,
            Self::Start(tx) | Self::Commit(tx) | Self::Rollback(tx) => Some(*tx),
            Self::SetInt { tx, .. } | Self::SetString { tx, .. } => Some(*tx),
        }
    }

    /// Reverses the update described by this record, going through the
    /// transaction so the usual locking applies. The rewrite is not
    /// logged again. Non-update kinds carry no undo information.
    pub fn undo(&self, tx: &mut Transaction) -> Result<()> {
        match self {
            Self::SetInt {
                block,
                offset,
                old_val,
                ..
            } => {
                tx.pin(block)?;
                tx.set_int(block, *offset, *old_val, false)?;
                tx.unpin(block)?;
            }
            Self::SetString {
                block,
                offset,
                old_val,
                ..
            } => {
                tx.pin(block)?;
                tx.set_string(block, *offset, old_val, false)?;
                tx.unpin(block)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checkpoint => write!(f, "<CHECKPOINT>"),
            Self::Start(tx) => write!(f, "<START {tx}>"),
            Self::Commit(tx) => write!(f, "<COMMIT {tx}>"),
            Self::Rollback(tx) => write!(f, "<ROLLBACK {tx}>"),
            Self::SetInt {
                tx,
                block,
                offset,
                old_val,
            } => write!(f, "<SETINT {tx} [{block}] {offset} {old_val}>"),
            Self::SetString {
                tx,
                block,
                offset,
                old_val,
            } => write!(f, "<SETSTRING {tx} [{block}] {offset} {old_val:?}>"),
        }
    }
}
