use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::debug;

use crate::buffer::Buffer;
use crate::common::{DbError, Result, TxId};
use crate::storage::{BlockId, FileMgr};
use crate::wal::Log;

/// Shared handle to a pool frame.
pub type BufferRef = Arc<Mutex<Buffer>>;

/// Manages a fixed set of page frames shared by all transactions.
///
/// A client pins a frame to the block it wants to access, reads and
/// writes the frame's page in memory, and unpins it when done. Frames
/// with pin count zero form an LRU queue of eviction candidates: a
/// frame joins the tail when its last pin is released, and the victim
/// for a new block is taken from the head. A frame stays bound to its
/// block (and its cached contents stay valid) until it is chosen as a
/// victim, so re-pinning a recently used block finds the same frame
/// with no disk traffic.
pub struct BufferPool {
    state: Mutex<PoolState>,
    // Signalled by unpin; pin waits here when every frame is pinned.
    available: Condvar,
}

struct PoolState {
    // Eviction candidates, least recently unpinned at the head.
    unpinned: VecDeque<BufferRef>,
    // Every frame currently bound to a block, pinned or not.
    allocated: HashMap<BlockId, BufferRef>,
}

const PIN_WAITS: [Duration; 2] = [Duration::from_secs(3), Duration::from_secs(6)];

impl BufferPool {
    pub fn new(file_mgr: Arc<FileMgr>, log: Arc<Log>, buffer_count: usize) -> Self {
        let unpinned = (0..buffer_count)
            .map(|_| Arc::new(Mutex::new(Buffer::new(Arc::clone(&file_mgr), Arc::clone(&log)))))
            .collect();
        Self {
            state: Mutex::new(PoolState {
                unpinned,
                allocated: HashMap::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// Number of unpinned frames.
    pub fn available(&self) -> usize {
        self.state.lock().unwrap().unpinned.len()
    }

    /// Forces every frame dirtied by `tx` to disk (WAL first) and marks
    /// it clean. Pin counts are untouched.
    pub fn flush_all(&self, tx: TxId) -> Result<()> {
        let state = self.state.lock().unwrap();
        for buf in state.allocated.values() {
            let mut guard = buf.lock().unwrap();
            if guard.modifying_tx() == Some(tx) {
                guard.flush()?;
            }
        }
        Ok(())
    }

    /// Pins a frame to `block`, waiting a bounded time for one to free
    /// up. Fails with `BufferUnavailable` when every frame stays pinned
    /// for the whole wait.
    pub fn pin(&self, block: &BlockId) -> Result<BufferRef> {
        let mut state = self.state.lock().unwrap();
        if let Some(buf) = Self::try_to_pin(&mut state, block)? {
            return Ok(buf);
        }
        for wait in PIN_WAITS {
            debug!("no buffer available for [{block}], waiting up to {wait:?}");
            let (guard, _) = self.available.wait_timeout(state, wait).unwrap();
            state = guard;
            if let Some(buf) = Self::try_to_pin(&mut state, block)? {
                return Ok(buf);
            }
        }
        Err(DbError::BufferUnavailable)
    }

    /// Like `pin` but gives up immediately when no frame is free.
    pub fn try_pin(&self, block: &BlockId) -> Result<BufferRef> {
        let mut state = self.state.lock().unwrap();
        Self::try_to_pin(&mut state, block)?.ok_or(DbError::BufferUnavailable)
    }

    /// Releases one pin on the frame. At pin count zero the frame joins
    /// the tail of the eviction queue and a waiting `pin` is woken.
    pub fn unpin(&self, buffer: &BufferRef) {
        let mut state = self.state.lock().unwrap();
        let mut guard = buffer.lock().unwrap();
        guard.unpin();
        if !guard.is_pinned() {
            drop(guard);
            state.unpinned.push_back(Arc::clone(buffer));
            self.available.notify_all();
        }
    }

    // Pin steps: reuse the frame already bound to the block if any,
    // otherwise take the eviction-queue head, write back its old
    // contents (WAL first, inside assign_to_block) and rebind it.
    // Returns Ok(None) when every frame is pinned.
    fn try_to_pin(state: &mut PoolState, block: &BlockId) -> Result<Option<BufferRef>> {
        let buf = match state.allocated.get(block).cloned() {
            Some(buf) => {
                let pinned = buf.lock().unwrap().is_pinned();
                if !pinned {
                    state.unpinned.retain(|other| !Arc::ptr_eq(other, &buf));
                }
                buf
            }
            None => {
                let Some(buf) = state.unpinned.pop_front() else {
                    return Ok(None);
                };
                let mut guard = buf.lock().unwrap();
                if let Some(old_block) = guard.block().cloned() {
                    state.allocated.remove(&old_block);
                }
                if let Err(e) = guard.assign_to_block(block.clone()) {
                    // Keep the frame in the pool; the caller sees the error.
                    drop(guard);
                    state.unpinned.push_front(buf);
                    return Err(e);
                }
                drop(guard);
                state.allocated.insert(block.clone(), Arc::clone(&buf));
                buf
            }
        };
        buf.lock().unwrap().pin();
        Ok(Some(buf))
    }
}
