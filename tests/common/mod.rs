#![allow(dead_code)]

use simpledb::{DbConfig, SimpleDB};
use tempfile::TempDir;

/// A database rooted in a temporary directory that lives as long as
/// the value.
pub struct TestDb {
    pub db: SimpleDB,
    _dir: TempDir,
}

impl std::ops::Deref for TestDb {
    type Target = SimpleDB;

    fn deref(&self) -> &SimpleDB {
        &self.db
    }
}

pub fn test_db(block_size: usize, buffer_count: usize) -> TestDb {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("create temp dir");
    let db = SimpleDB::new(
        DbConfig::new(dir.path().join("db"))
            .block_size(block_size)
            .buffer_count(buffer_count),
    )
    .expect("open database");
    TestDb { db, _dir: dir }
}

/// Grows a data file to `bytes` so tests can address its blocks
/// without appending one at a time.
pub fn reserve_file(db: &SimpleDB, filename: &str, bytes: u64) {
    let path = db.file_mgr().db_file_path(filename);
    let file = std::fs::File::create(path).expect("create data file");
    file.set_len(bytes).expect("grow data file");
}
