use thiserror::Error;

use crate::storage::BlockId;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("page offset out of bounds")]
    OutOfBounds,

    #[error("could not acquire lock to read/write data")]
    LockAbort,

    #[error("no buffer available")]
    BufferUnavailable,

    #[error("block [{0}] is not pinned by this transaction")]
    BlockNotPinned(BlockId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
