//! Thread-local worker identity.
//!
//! Submission routing needs to know whether the calling thread is one of a
//! pool's own workers: workers in the stealing pool push to their own deque,
//! and workers in either pool keep a drain path open during shutdown. Pools
//! get process-unique ids so the registry never confuses workers of two
//! coexisting pools.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Allocates a process-unique pool id.
pub(crate) fn next_pool_id() -> usize {
    NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct WorkerId {
    pool: usize,
    index: usize,
}

thread_local! {
    static CURRENT: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Registration handle; deregisters the thread on drop.
pub(crate) struct WorkerGuard(());

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| current.set(None));
    }
}

/// Marks the current thread as worker `index` of pool `pool` for as long as
/// the returned guard lives.
pub(crate) fn register(pool: usize, index: usize) -> WorkerGuard {
    CURRENT.with(|current| {
        debug_assert!(current.get().is_none(), "thread registered twice");
        current.set(Some(WorkerId { pool, index }));
    });
    WorkerGuard(())
}

/// Returns the current thread's worker index within `pool`, if it is one of
/// that pool's workers.
pub(crate) fn current_worker_in(pool: usize) -> Option<usize> {
    CURRENT.with(|current| {
        current
            .get()
            .filter(|id| id.pool == pool)
            .map(|id| id.index)
    })
}
