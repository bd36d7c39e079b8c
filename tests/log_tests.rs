use std::sync::Arc;

use simpledb::storage::{BlockId, FileMgr, Page, I64_SIZE};
use simpledb::wal::Log;
use simpledb::Lsn;
use tempfile::TempDir;

const BLOCK_SIZE: usize = 28;
const LOG_FILE: &str = "temp.log";
const INITIAL_TEXT: &str = "abcdefghijkl";

fn file_mgr() -> (Arc<FileMgr>, TempDir) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let fm = FileMgr::new(dir.path().join("db"), BLOCK_SIZE).unwrap();
    (Arc::new(fm), dir)
}

// A log file whose first block is completely filled by one record,
// so the next append must start a new block.
fn seeded_file_mgr() -> (Arc<FileMgr>, TempDir) {
    let (fm, dir) = file_mgr();
    let block = fm.append(LOG_FILE).unwrap();
    let mut page = Page::new(BLOCK_SIZE);
    page.set_int(0, I64_SIZE as i64).unwrap();
    page.set_string(I64_SIZE, INITIAL_TEXT).unwrap();
    fm.write(&block, &page).unwrap();
    (fm, dir)
}

#[test]
fn new_log_creates_one_empty_block() {
    let (fm, _dir) = file_mgr();
    let log = Log::new(Arc::clone(&fm), LOG_FILE).unwrap();

    assert_eq!(log.current_block(), BlockId::new(LOG_FILE, 0));
    assert_eq!(fm.block_count(LOG_FILE).unwrap(), 1);

    let mut iter = log.iterator().unwrap();
    assert!(!iter.has_next());
    assert!(iter.next().is_none());
}

#[test]
fn existing_log_resumes_at_tail_block() {
    let (fm, _dir) = seeded_file_mgr();
    let log = Log::new(Arc::clone(&fm), LOG_FILE).unwrap();
    assert_eq!(log.current_block(), BlockId::new(LOG_FILE, 0));

    let mut iter = log.iterator().unwrap();
    let record = iter.next().unwrap().unwrap();
    assert_eq!(record, INITIAL_TEXT.as_bytes());
    assert!(!iter.has_next());
}

// Each record that does not fit forces the tail out and starts a new
// block; records that fit share the block with their predecessor.
#[test]
fn append_rolls_to_new_blocks_as_records_fill_them() {
    let (fm, _dir) = seeded_file_mgr();
    let log = Log::new(fm, LOG_FILE).unwrap();

    let expectations = [
        ("abcde", 1, 1), // 13 bytes do not fit behind the full block 0
        ("fgh", 2, 2),   // 11 bytes do not fit next to "abcde"
        ("i", 2, 3),     // 9 bytes exactly fill the rest of block 2
        ("opq", 3, 4),
    ];
    for (text, block_num, lsn) in expectations {
        let got = log.append(text.as_bytes()).unwrap();
        assert_eq!(got, Lsn(lsn));
        assert_eq!(log.current_block().num(), block_num);
    }
}

#[test]
fn flush_is_conditional_on_lsn() {
    let (fm, _dir) = seeded_file_mgr();
    let log = Log::new(fm, LOG_FILE).unwrap();

    assert_eq!(log.latest_lsn(), Lsn(0));
    assert_eq!(log.last_saved_lsn(), Lsn(0));

    log.append(b"abcde").unwrap();
    assert_eq!(log.latest_lsn(), Lsn(1));
    assert_eq!(log.last_saved_lsn(), Lsn(0));

    // covered already: no-op
    log.flush(Lsn(0)).unwrap();
    assert_eq!(log.last_saved_lsn(), Lsn(0));

    log.flush(Lsn(1)).unwrap();
    assert_eq!(log.last_saved_lsn(), Lsn(1));

    // force always writes and catches the marker up
    log.append(b"fgh").unwrap();
    log.force().unwrap();
    assert_eq!(log.last_saved_lsn(), Lsn(2));
}

#[test]
fn iterator_yields_newest_first_across_blocks() {
    let (fm, _dir) = seeded_file_mgr();
    let log = Log::new(fm, LOG_FILE).unwrap();

    let texts = ["abcde", "fgh", "ijklmn", "opq"];
    for text in texts {
        log.append(text.as_bytes()).unwrap();
    }

    let mut iter = log.iterator().unwrap();
    for expected in texts.iter().rev() {
        assert!(iter.has_next());
        let record = iter.next().unwrap().unwrap();
        assert_eq!(record, expected.as_bytes());
    }

    // the record that was in the file before the log was opened
    assert!(iter.has_next());
    let record = iter.next().unwrap().unwrap();
    assert_eq!(record, INITIAL_TEXT.as_bytes());
    assert!(!iter.has_next());
}

#[test]
fn oversized_record_is_rejected() {
    let (fm, _dir) = file_mgr();
    let log = Log::new(fm, LOG_FILE).unwrap();
    // larger than any block can hold once headers are accounted for
    let record = vec![7u8; BLOCK_SIZE];
    assert!(log.append(&record).is_err());
}
