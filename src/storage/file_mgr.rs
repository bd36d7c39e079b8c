use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::common::Result;
use crate::storage::{BlockId, Page};

/// Maps `(filename, block number)` to byte ranges on disk.
///
/// Files are divided into blocks of `block_size` bytes; block `n` of a
/// file starts at byte offset `n * block_size`. Every file length is a
/// whole multiple of `block_size` after any successful `append`. Files
/// are opened per operation; no handles are cached.
#[derive(Debug)]
pub struct FileMgr {
    db_dir: PathBuf,
    block_size: usize,
    is_new: bool,
    // Serializes append and the block-count read it depends on, so two
    // concurrent appends cannot both claim the same block number.
    append_lock: Mutex<()>,
}

impl FileMgr {
    /// Opens the database directory, creating it when missing.
    pub fn new(db_dir: impl Into<PathBuf>, block_size: usize) -> Result<Self> {
        let db_dir = db_dir.into();
        let is_new = !db_dir.exists();
        if is_new {
            fs::create_dir_all(&db_dir)?;
        }
        Ok(Self {
            db_dir,
            block_size,
            is_new,
            append_lock: Mutex::new(()),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Directory holding the database files.
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// True when the database directory was created by this instance.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn db_file_path(&self, filename: &str) -> PathBuf {
        self.db_dir.join(filename)
    }

    /// Reads a block from disk into `page`, filling the whole buffer.
    /// Fails if the file is shorter than the requested block; blocks
    /// are never padded on read.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        let mut file = File::open(self.db_file_path(block.filename()))?;
        file.seek(SeekFrom::Start(self.block_offset(block)))?;
        file.read_exact(page.contents_mut())?;
        Ok(())
    }

    /// Writes `page` to the block's byte range. Does not fsync;
    /// durability comes from the WAL flush at commit.
    pub fn write(&self, block: &BlockId, page: &Page) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(self.db_file_path(block.filename()))?;
        file.seek(SeekFrom::Start(self.block_offset(block)))?;
        file.write_all(page.contents())?;
        Ok(())
    }

    /// Extends the file by one zeroed block and returns its id.
    /// Creates the file when missing. Block numbering starts at 0.
    pub fn append(&self, filename: &str) -> Result<BlockId> {
        let _guard = self.append_lock.lock().unwrap();
        let new_block_num = self.count_blocks(filename)?;
        let block = BlockId::new(filename, new_block_num);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.db_file_path(filename))?;
        file.write_all(&vec![0u8; self.block_size])?;
        Ok(block)
    }

    /// Number of blocks in the file; creates the file empty when missing.
    pub fn block_count(&self, filename: &str) -> Result<i64> {
        let _guard = self.append_lock.lock().unwrap();
        self.count_blocks(filename)
    }

    fn count_blocks(&self, filename: &str) -> Result<i64> {
        let path = self.db_file_path(filename);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len() as i64 / self.block_size as i64),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                File::create(&path)?;
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn block_offset(&self, block: &BlockId) -> u64 {
        block.num() as u64 * self.block_size as u64
    }
}
