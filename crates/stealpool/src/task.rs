//! The type-erased unit of work and the spawning seam shared by both pool
//! variants.

use crate::future::panic_message;
use crate::PoolMetrics;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A type-erased, zero-argument unit of work.
///
/// There is a single concrete task variant: a boxed closure. Value-returning
/// submissions wrap their closure so the result lands in the paired
/// future-holder before the type is erased.
pub struct Task {
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Wraps a closure into a task.
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        Self {
            work: Box::new(work),
        }
    }

    /// Runs the task to completion, consuming it.
    #[inline]
    pub fn run(self) {
        (self.work)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// A task handed back by a spawner that refused it.
///
/// Refusal only happens once a pool is shut down. Returning the task lets the
/// caller decide what to do with the work; the graph scheduler, for one,
/// runs refused continuations inline so a graph never stalls.
#[derive(Debug)]
pub struct Rejected(pub Task);

/// The seam between task producers and an executor.
///
/// Implemented by the handles of both pool variants; the graph scheduler is
/// written against this trait so it drives either pool unchanged.
pub trait Spawn: Send + Sync {
    /// Hands a task to the executor, or returns it on refusal.
    fn spawn(&self, task: Task) -> Result<(), Rejected>;
}

/// Runs a task at the worker boundary: faults are caught and logged, never
/// propagated into the worker or the pool. A paired future-holder has already
/// captured the fault by the time it reaches the boundary.
pub(crate) fn run_at_boundary(task: Task, pool_id: usize, metrics: &PoolMetrics, record: bool) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run()));
    if record {
        metrics.add_completed(1);
        if outcome.is_err() {
            metrics.add_panicked(1);
        }
    }
    if let Err(payload) = outcome {
        log::warn!(
            "pool {}: task panicked: {}",
            pool_id,
            panic_message(payload.as_ref())
        );
    }
}
