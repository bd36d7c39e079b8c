mod common;

use simpledb::storage::{BlockId, Page};
use simpledb::{DbError, TxId};

const FILENAME: &str = "testfile";

fn grow_file(db: &common::TestDb, blocks: usize) {
    for _ in 0..blocks {
        db.file_mgr().append(FILENAME).unwrap();
    }
}

// Re-pinning a recently unpinned block finds the same frame with its
// cached contents intact.
#[test]
fn unpinned_frame_is_reused_for_same_block() {
    let db = common::test_db(400, 8);
    grow_file(&db, 3);
    let pool = db.buffer_pool();
    let block = BlockId::new(FILENAME, 2);

    let buf1 = pool.pin(&block).unwrap();
    let id1 = {
        let mut guard = buf1.lock().unwrap();
        let text = "abcdefghijklm";
        guard.contents_mut().set_string(88, text).unwrap();
        let pos2 = 88 + simpledb::storage::max_len(text.len());
        guard.contents_mut().set_int(pos2, 345).unwrap();
        guard.set_modified(TxId(1), None);
        guard.id()
    };
    pool.unpin(&buf1);
    assert_eq!(pool.available(), 8);

    let buf2 = pool.pin(&block).unwrap();
    {
        let guard = buf2.lock().unwrap();
        assert_eq!(guard.id(), id1);
        assert_eq!(guard.contents().get_string(88).unwrap(), "abcdefghijklm");
        assert_eq!(guard.contents().get_int(109).unwrap(), 345);
    }
    pool.unpin(&buf2);
}

#[test]
fn pool_exhaustion_and_release() {
    let db = common::test_db(400, 3);
    grow_file(&db, 4);
    let pool = db.buffer_pool();
    let blocks: Vec<BlockId> = (0..4).map(|n| BlockId::new(FILENAME, n)).collect();

    let buf0 = pool.pin(&blocks[0]).unwrap();
    let buf1 = pool.pin(&blocks[1]).unwrap();
    let buf2 = pool.pin(&blocks[2]).unwrap();
    assert_eq!(pool.available(), 0);

    pool.unpin(&buf1);
    assert_eq!(pool.available(), 1);

    // pin block 0 a second time, and block 1 again before eviction
    let buf0_again = pool.pin(&blocks[0]).unwrap();
    assert_eq!(buf0_again.lock().unwrap().pins(), 2);
    let _buf1_again = pool.pin(&blocks[1]).unwrap();

    // everything pinned again: an impatient pin gives up at once
    assert!(matches!(
        pool.try_pin(&blocks[3]),
        Err(DbError::BufferUnavailable)
    ));

    pool.unpin(&buf2);
    let buf3 = pool.pin(&blocks[3]).unwrap();
    assert_eq!(buf3.lock().unwrap().block(), Some(&blocks[3]));
    pool.unpin(&buf0);
}

#[test]
fn flush_all_writes_only_the_given_transactions_frames() {
    let db = common::test_db(400, 3);
    grow_file(&db, 3);
    let pool = db.buffer_pool();
    let tx1 = TxId(1);
    let tx2 = TxId(2);

    let assignments = [(0, tx1, 11), (1, tx1, 22), (2, tx2, 33)];
    let mut bufs = Vec::new();
    for (num, tx, val) in assignments {
        let block = BlockId::new(FILENAME, num);
        let buf = pool.pin(&block).unwrap();
        {
            let mut guard = buf.lock().unwrap();
            guard.contents_mut().set_int(80, val).unwrap();
            guard.set_modified(tx, None);
        }
        bufs.push(buf);
    }

    pool.flush_all(tx1).unwrap();

    // tx1's frames are clean, tx2's frame still dirty
    assert_eq!(bufs[0].lock().unwrap().modifying_tx(), None);
    assert_eq!(bufs[1].lock().unwrap().modifying_tx(), None);
    assert_eq!(bufs[2].lock().unwrap().modifying_tx(), Some(tx2));

    // tx1's values reached disk, tx2's did not
    let mut page = Page::new(400);
    db.file_mgr()
        .read(&BlockId::new(FILENAME, 0), &mut page)
        .unwrap();
    assert_eq!(page.get_int(80).unwrap(), 11);
    db.file_mgr()
        .read(&BlockId::new(FILENAME, 1), &mut page)
        .unwrap();
    assert_eq!(page.get_int(80).unwrap(), 22);
    db.file_mgr()
        .read(&BlockId::new(FILENAME, 2), &mut page)
        .unwrap();
    assert_eq!(page.get_int(80).unwrap(), 0);
}

// The least recently unpinned frame is the eviction victim, and its
// dirty contents are written back before the frame is rebound.
#[test]
fn eviction_flushes_dirty_victim() {
    let db = common::test_db(400, 1);
    grow_file(&db, 2);
    let pool = db.buffer_pool();
    let block0 = BlockId::new(FILENAME, 0);
    let block1 = BlockId::new(FILENAME, 1);

    let buf = pool.pin(&block0).unwrap();
    buf.lock().unwrap().contents_mut().set_int(0, 99).unwrap();
    buf.lock().unwrap().set_modified(TxId(7), None);
    pool.unpin(&buf);

    // rebinding the only frame evicts block 0 and writes it out
    let buf = pool.pin(&block1).unwrap();
    assert_eq!(buf.lock().unwrap().block(), Some(&block1));
    pool.unpin(&buf);

    let mut page = Page::new(400);
    db.file_mgr().read(&block0, &mut page).unwrap();
    assert_eq!(page.get_int(0).unwrap(), 99);
}
