mod common;

use simpledb::storage::{BlockId, Page};

const BLOCK_SIZE: usize = 100;
const FILENAME: &str = "temp_file";

// Fills the file with one block each of 'a', 'b' and 'c'.
fn fill_file(db: &common::TestDb) {
    for ch in [b'a', b'b', b'c'] {
        let block = db.file_mgr().append(FILENAME).unwrap();
        let mut page = Page::new(BLOCK_SIZE);
        page.contents_mut().fill(ch);
        db.file_mgr().write(&block, &page).unwrap();
    }
}

#[test]
fn read_fills_whole_page() {
    let db = common::test_db(BLOCK_SIZE, 8);
    fill_file(&db);

    let mut page = Page::new(BLOCK_SIZE);
    for (num, ch) in [(0, b'a'), (1, b'b'), (2, b'c')] {
        let block = BlockId::new(FILENAME, num);
        db.file_mgr().read(&block, &mut page).unwrap();
        assert!(page.contents().iter().all(|b| *b == ch));
    }
}

#[test]
fn write_overwrites_one_block() {
    let db = common::test_db(BLOCK_SIZE, 8);
    fill_file(&db);

    let block = BlockId::new(FILENAME, 1);
    let mut page = Page::new(BLOCK_SIZE);
    page.contents_mut().fill(b'o');
    db.file_mgr().write(&block, &page).unwrap();

    let mut read_back = Page::new(BLOCK_SIZE);
    db.file_mgr().read(&block, &mut read_back).unwrap();
    assert!(read_back.contents().iter().all(|b| *b == b'o'));

    // neighbors untouched
    db.file_mgr()
        .read(&BlockId::new(FILENAME, 0), &mut read_back)
        .unwrap();
    assert!(read_back.contents().iter().all(|b| *b == b'a'));
}

#[test]
fn append_extends_by_one_zeroed_block() {
    let db = common::test_db(BLOCK_SIZE, 8);
    fill_file(&db);

    let block = db.file_mgr().append(FILENAME).unwrap();
    assert_eq!(block.num(), 3);
    assert_eq!(db.file_mgr().block_count(FILENAME).unwrap(), 4);

    let mut page = Page::new(BLOCK_SIZE);
    page.contents_mut().fill(b'x');
    db.file_mgr().read(&block, &mut page).unwrap();
    assert!(page.contents().iter().all(|b| *b == 0));

    // file length stays a whole multiple of the block size
    let len = std::fs::metadata(db.file_mgr().db_file_path(FILENAME))
        .unwrap()
        .len();
    assert_eq!(len as usize % BLOCK_SIZE, 0);
}

#[test]
fn block_count_creates_missing_file() {
    let db = common::test_db(BLOCK_SIZE, 8);
    assert_eq!(db.file_mgr().block_count("fresh_file").unwrap(), 0);
    assert!(db.file_mgr().db_file_path("fresh_file").exists());
}

#[test]
fn read_past_end_of_file_fails() {
    let db = common::test_db(BLOCK_SIZE, 8);
    fill_file(&db);

    let mut page = Page::new(BLOCK_SIZE);
    let beyond = BlockId::new(FILENAME, 7);
    assert!(db.file_mgr().read(&beyond, &mut page).is_err());
}

#[test]
fn is_new_reports_directory_creation() {
    let db = common::test_db(BLOCK_SIZE, 8);
    assert!(db.file_mgr().is_new());
}
