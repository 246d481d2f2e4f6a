//! The future-holder primitive: a cell that eventually holds a task's result
//! and blocks retrieving threads until it does.
//!
//! A [`TaskPromise`]/[`TaskFuture`] pair shares a single slot. The worker
//! fulfills the promise exactly once; any number of waits on the future side
//! are serialized by the slot's mutex. A promise dropped unfulfilled resolves
//! the slot to [`TaskError::Abandoned`] so no waiter can hang forever.

use crate::TaskError;
use std::any::Any;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct Shared<T> {
    slot: Mutex<Option<Result<T, TaskError>>>,
    cond: Condvar,
}

/// Creates a connected promise/future pair.
pub(crate) fn task_future<T>() -> (TaskPromise<T>, TaskFuture<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        cond: Condvar::new(),
    });
    (
        TaskPromise {
            shared: Arc::clone(&shared),
            fulfilled: false,
        },
        TaskFuture { shared },
    )
}

/// Write side of the pair, held by the wrapped task.
pub(crate) struct TaskPromise<T> {
    shared: Arc<Shared<T>>,
    fulfilled: bool,
}

impl<T> TaskPromise<T> {
    /// Stores the result and wakes every waiter. Consumes the promise, so a
    /// result can be stored at most once.
    pub(crate) fn fulfill(mut self, result: Result<T, TaskError>) {
        self.store(result);
    }

    fn store(&mut self, result: Result<T, TaskError>) {
        let mut slot = self.shared.slot.lock().unwrap();
        debug_assert!(slot.is_none(), "promise fulfilled twice");
        *slot = Some(result);
        self.fulfilled = true;
        self.shared.cond.notify_all();
    }
}

impl<T> Drop for TaskPromise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            self.store(Err(TaskError::Abandoned));
        }
    }
}

/// Read side of the pair, returned by `submit`.
///
/// The holder stores the task's eventual result; [`wait`](Self::wait) blocks
/// the retrieving thread until the result is available. A panic in the task
/// body arrives here as [`TaskError::Panicked`] rather than unwinding through
/// the pool.
pub struct TaskFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskFuture<T> {
    /// Blocks until the task's result is available and returns it.
    pub fn wait(self) -> Result<T, TaskError> {
        let mut slot = self.shared.slot.lock().unwrap();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self.shared.cond.wait(slot).unwrap();
        }
    }

    /// Blocks up to `timeout` for the result. Returns the future itself on
    /// timeout so the caller can keep waiting.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<T, TaskError>, Self> {
        let slot = self.shared.slot.lock().unwrap();
        let (mut slot, _) = self
            .shared
            .cond
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap();
        match slot.take() {
            Some(result) => Ok(result),
            None => {
                drop(slot);
                Err(self)
            }
        }
    }

    /// Returns `true` if the result is already available.
    pub fn is_ready(&self) -> bool {
        self.shared.slot.lock().unwrap().is_some()
    }
}

/// Renders a panic payload into a displayable message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
