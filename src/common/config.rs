use std::path::PathBuf;

/// Options for opening a database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Directory holding all data files and the log file.
    pub db_dir: PathBuf,
    /// Size in bytes of every file block and every page.
    pub block_size: usize,
    /// Number of frames in the buffer pool.
    pub buffer_count: usize,
    /// Name of the write-ahead log file inside `db_dir`.
    pub log_file: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("data"),
            block_size: 4096,
            buffer_count: 1000,
            log_file: "simpledb.log".to_string(),
        }
    }
}

impl DbConfig {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            ..Default::default()
        }
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn buffer_count(mut self, buffer_count: usize) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    pub fn log_file(mut self, log_file: impl Into<String>) -> Self {
        self.log_file = log_file.into();
        self
    }
}
