//! The DAG scheduler: seeds the graph's ready nodes into a pool and rides
//! completion continuations to release the rest.
//!
//! ## The dependency-counter protocol
//!
//! Every node carries a `pending` counter initialized to its in-degree. A
//! finished node performs `fetch_sub(1, AcqRel)` on each successor; the
//! thread that observes the previous value 1 is the unique releaser of that
//! successor and submits its continuation. The counter cannot cross zero
//! twice, so each node is submitted exactly once, and the AcqRel pairing
//! makes every predecessor's writes visible to the successor before its
//! closure runs.
//!
//! ## Faults and refusals
//!
//! A panicking closure is caught, counted, and logged. Its successors are
//! still released, otherwise the graph would stall. Poisoning successors is
//! left to callers. A continuation refused by the pool (only possible once
//! the pool is stopped) runs inline on the refusing thread for the same
//! reason: `wait` must always terminate.

use crate::graph::{Node, TaskGraph};
use crate::GraphError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use stealpool_rs::{Rejected, Spawn, Task};

/// Drives task graphs over any executor implementing [`Spawn`].
///
/// Holds a cloneable spawner handle (typically `pool.handle()` of either
/// pool variant) so completion continuations can resubmit from any worker.
pub struct Scheduler<S> {
    spawner: S,
}

impl<S> Scheduler<S>
where
    S: Spawn + Clone + 'static,
{
    /// Creates a scheduler that submits to the given spawner.
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }

    /// Launches the graph and returns immediately.
    ///
    /// Every node whose dependency counter is already zero is submitted to
    /// the pool; everything else is released by the counter protocol as its
    /// predecessors finish. Synchronize on completion through the returned
    /// [`GraphRun`].
    pub fn execute(&self, graph: TaskGraph) -> GraphRun {
        let nodes = graph.into_nodes();
        let total = nodes.len();

        let run = Arc::new(RunCore {
            nodes,
            remaining: AtomicUsize::new(total),
            panicked: AtomicUsize::new(0),
            finished: Mutex::new(total == 0),
            signal: Condvar::new(),
        });

        log::debug!("graph launched: {total} nodes");

        // Snapshot the zero in-degree set before the first dispatch. Once a
        // seed runs, counters move concurrently, and a successor passing
        // through zero must be dispatched by its releasing predecessor only.
        let roots: Vec<usize> = (0..total)
            .filter(|&index| run.nodes[index].pending.load(Ordering::Relaxed) == 0)
            .collect();
        for index in roots {
            dispatch(&run, &self.spawner, index);
        }

        GraphRun { core: run }
    }
}

struct RunCore {
    nodes: Box<[Node]>,
    /// Nodes not yet retired; the run completes when this reaches zero.
    remaining: AtomicUsize,
    /// Nodes whose closure panicked.
    panicked: AtomicUsize,
    finished: Mutex<bool>,
    signal: Condvar,
}

/// Handle on a launched graph.
///
/// The graph's storage lives until the last continuation retires, so
/// dropping the handle without waiting is safe.
pub struct GraphRun {
    core: Arc<RunCore>,
}

impl GraphRun {
    /// Blocks until every node has run, then reports whether any panicked.
    pub fn wait(self) -> Result<(), GraphError> {
        let mut finished = self.core.finished.lock().unwrap();
        while !*finished {
            finished = self.core.signal.wait(finished).unwrap();
        }
        drop(finished);

        let panicked = self.core.panicked.load(Ordering::Relaxed);
        if panicked > 0 {
            return Err(GraphError::NodesPanicked {
                panicked,
                total: self.core.nodes.len(),
            });
        }
        Ok(())
    }

    /// Returns `true` once every node has run.
    pub fn is_finished(&self) -> bool {
        *self.core.finished.lock().unwrap()
    }
}

/// Wraps a node into a continuation and hands it to the pool. A refusal
/// means the pool is stopped; the continuation then runs inline.
fn dispatch<S>(run: &Arc<RunCore>, spawner: &S, index: usize)
where
    S: Spawn + Clone + 'static,
{
    let task_run = Arc::clone(run);
    let task_spawner = spawner.clone();
    let task = Task::new(move || run_node(&task_run, &task_spawner, index));

    if let Err(Rejected(task)) = spawner.spawn(task) {
        log::debug!("graph node {index} refused by the pool, running inline");
        task.run();
    }
}

/// The scheduler continuation: run the node, release its successors,
/// retire it against the run.
fn run_node<S>(run: &Arc<RunCore>, spawner: &S, index: usize)
where
    S: Spawn + Clone + 'static,
{
    let node = &run.nodes[index];

    // SAFETY: a node's readiness transition happens exactly once: the
    // seeding scan only touches nodes no predecessor ever decrements, and
    // for all others the AcqRel fetch_sub admits a single thread past the
    // 1 -> 0 edge. That thread has exclusive access to the cell here.
    let work = unsafe { (*node.work.get()).take() };
    debug_assert!(work.is_some(), "graph node {index} released twice");

    if let Some(work) = work {
        if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
            run.panicked.fetch_add(1, Ordering::Relaxed);
            log::warn!("graph node {index} panicked; its successors are still released");
        }
    }

    for &successor in &node.dependents {
        if run.nodes[successor].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            dispatch(run, spawner, successor);
        }
    }

    if run.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
        let mut finished = run.finished.lock().unwrap();
        *finished = true;
        run.signal.notify_all();
    }
}
