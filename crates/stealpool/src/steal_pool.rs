//! The work-stealing thread pool: each worker owns a Chase-Lev deque, and
//! idle workers redistribute load by stealing from the others.
//!
//! ## Submission routing
//!
//! A worker submitting from inside a task pushes to the bottom of its own
//! deque: it is the deque's owner, so the push is free of contention and
//! keeps related work hot in cache. Any other thread must not touch a deque's
//! bottom end; external submissions instead round-robin into per-worker SPSC
//! inboxes under the same producer-claim discipline as the per-queue pool.
//!
//! ## Worker loop
//!
//! Pop the own deque (LIFO), then drain the own inbox (FIFO), then try to
//! steal from the other deques in rotating order starting past oneself, then
//! back off. A steal that loses a race retries the same victim: a lost CAS
//! means another thread took an element, so the attempt re-reads a strictly
//! smaller deque and terminates.
//!
//! ## Shutdown
//!
//! Mirrors the per-queue pool: flag, join (each worker drains its own deque
//! and inbox (nobody but the owner can push to a deque, so a drained deque
//! stays drained), then a claim-guarded sweep of the inboxes for submitters
//! that raced the flag. Worker-side affinity pushes stay open during drain so
//! completion continuations are never cut off.

use crate::future::{self, TaskFuture};
use crate::worker;
use crate::{
    Config, MetricsSnapshot, PoolError, PoolMetrics, Rejected, Spawn, SpscQueue, Steal, Task,
    TaskError, WorkStealingDeque,
};
use crossbeam_utils::{Backoff, CachePadded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Work-stealing thread pool.
///
/// Owner-side scheduling is LIFO (fresh work stays cache-hot); thieves take
/// the oldest work, which tends to move the largest remaining subtrees.
/// Dropping the pool stops it, draining pending tasks first.
pub struct WorkStealingPool {
    inner: Arc<StealInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct StealInner {
    deques: Box<[WorkStealingDeque<Task>]>,
    inboxes: Box<[SpscQueue<Task>]>,
    /// Producer-role claims, one per inbox.
    claims: Box<[CachePadded<AtomicBool>]>,
    /// Round-robin cursor for external submissions.
    cursor: AtomicUsize,
    shutdown: AtomicBool,
    pool_id: usize,
    metrics: PoolMetrics,
    config: Config,
}

impl WorkStealingPool {
    /// Starts a pool as configured.
    ///
    /// A `workers` setting of 0 resolves to the available hardware
    /// parallelism, minimum 1. The queue capacity seeds each worker's deque
    /// and bounds its inbox.
    pub fn new(config: Config) -> Self {
        let worker_count = config.resolved_workers();

        let deques = (0..worker_count)
            .map(|_| WorkStealingDeque::new(config.capacity()))
            .collect();
        let inboxes = (0..worker_count)
            .map(|_| SpscQueue::new(config.capacity()))
            .collect();
        let claims = (0..worker_count)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect();

        let inner = Arc::new(StealInner {
            deques,
            inboxes,
            claims,
            cursor: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            pool_id: worker::next_pool_id(),
            metrics: PoolMetrics::new(),
            config,
        });

        let handles = (0..worker_count)
            .map(|index| {
                let inner = Arc::clone(&inner);
                thread::Builder::new()
                    .name(format!("stealpool-worker-{index}"))
                    .spawn(move || worker_loop(&inner, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        log::debug!(
            "pool {}: started {} stealing workers",
            inner.pool_id,
            worker_count
        );

        Self {
            inner,
            workers: Mutex::new(handles),
        }
    }

    /// Returns the number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.inner.deques.len()
    }

    /// Returns `true` once shutdown has been initiated.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Submits a value-returning closure and hands back the future-holder
    /// for its result.
    pub fn submit<F, T>(&self, work: F) -> Result<TaskFuture<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, handle) = future::task_future();
        let task = Task::new(move || match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => promise.fulfill(Ok(value)),
            Err(payload) => promise.fulfill(Err(TaskError::Panicked(future::panic_message(
                payload.as_ref(),
            )))),
        });
        self.inner
            .spawn_task(task)
            .map_err(|_rejected| PoolError::ShutDown)?;
        Ok(handle)
    }

    /// Submits a fire-and-forget closure.
    pub fn spawn(&self, work: impl FnOnce() + Send + 'static) -> Result<(), PoolError> {
        self.inner
            .spawn_task(Task::new(work))
            .map_err(|_rejected| PoolError::ShutDown)
    }

    /// Returns a cheap cloneable handle implementing [`Spawn`].
    pub fn handle(&self) -> StealPoolHandle {
        StealPoolHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Stops the pool: pending tasks are drained, workers are joined.
    ///
    /// Idempotent; every caller blocks until the pool is quiescent.
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);

        let mut workers = self.workers.lock().unwrap();
        if !workers.is_empty() {
            log::debug!("pool {}: shutdown initiated", self.inner.pool_id);
        }
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                log::error!("pool {}: a worker thread panicked", self.inner.pool_id);
            }
        }
        self.inner.final_sweep();
    }

    /// Takes a snapshot of the pool counters (zeros when metrics are off).
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.inner.config.enable_metrics {
            self.inner.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Drop for WorkStealingPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Spawn for WorkStealingPool {
    fn spawn(&self, task: Task) -> Result<(), Rejected> {
        self.inner.spawn_task(task)
    }
}

/// Cloneable submission handle for [`WorkStealingPool`].
#[derive(Clone)]
pub struct StealPoolHandle {
    inner: Arc<StealInner>,
}

impl Spawn for StealPoolHandle {
    fn spawn(&self, task: Task) -> Result<(), Rejected> {
        self.inner.spawn_task(task)
    }
}

impl StealInner {
    fn try_claim(&self, index: usize) -> bool {
        self.claims[index]
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn claim(&self, index: usize) {
        let backoff = Backoff::new();
        while !self.try_claim(index) {
            backoff.snooze();
        }
    }

    fn release(&self, index: usize) {
        self.claims[index].store(false, Ordering::Release);
    }

    fn note_submitted(&self) {
        if self.config.enable_metrics {
            self.metrics.add_submitted(1);
        }
    }

    fn spawn_task(&self, task: Task) -> Result<(), Rejected> {
        // Affinity: a worker owns its deque, so the push is always legal and
        // never fails. This path stays open during drain.
        if let Some(me) = worker::current_worker_in(self.pool_id) {
            self.deques[me].push(task);
            self.note_submitted();
            return Ok(());
        }

        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Rejected(task));
        }

        let inbox_count = self.inboxes.len();
        let mut task = task;
        let backoff = Backoff::new();
        loop {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % inbox_count;
            if self.try_claim(index) {
                // Re-check under the claim: orders this submission against
                // the stopping thread's final sweep.
                if self.shutdown.load(Ordering::SeqCst) {
                    self.release(index);
                    return Err(Rejected(task));
                }

                let result = self.inboxes[index].enqueue(task);
                self.release(index);
                match result {
                    Ok(()) => {
                        self.note_submitted();
                        return Ok(());
                    }
                    Err(returned) => task = returned,
                }
            }
            // Inbox full or claim contended: yield at the submitter
            backoff.snooze();
        }
    }

    /// One round over the other workers' deques, starting past `me`.
    fn try_steal(&self, me: usize) -> Option<Task> {
        let worker_count = self.deques.len();
        for offset in 1..worker_count {
            let victim = (me + offset) % worker_count;
            loop {
                match self.deques[victim].steal() {
                    Steal::Success(task) => {
                        if self.config.enable_metrics {
                            self.metrics.add_steals(1);
                        }
                        return Some(task);
                    }
                    Steal::Empty => break,
                    Steal::Retry => {
                        if self.config.enable_metrics {
                            self.metrics.add_steal_retries(1);
                        }
                    }
                }
            }
        }
        None
    }

    /// Runs every task still sitting in an inbox on the calling thread.
    /// Claims fence off submitters that raced the shutdown flag.
    fn final_sweep(&self) {
        for index in 0..self.inboxes.len() {
            self.claim(index);
            while let Some(task) = self.inboxes[index].dequeue() {
                log::trace!("pool {}: sweep running straggler task", self.pool_id);
                self.run(task);
            }
            self.release(index);
        }
    }

    fn run(&self, task: Task) {
        crate::task::run_at_boundary(
            task,
            self.pool_id,
            &self.metrics,
            self.config.enable_metrics,
        );
    }
}

fn worker_loop(inner: &StealInner, index: usize) {
    let _guard = worker::register(inner.pool_id, index);
    log::trace!("pool {}: worker {} up", inner.pool_id, index);

    let deque = &inner.deques[index];
    let inbox = &inner.inboxes[index];
    let backoff = Backoff::new();
    loop {
        if let Some(task) = deque.pop() {
            backoff.reset();
            inner.run(task);
            continue;
        }
        if let Some(task) = inbox.dequeue() {
            backoff.reset();
            inner.run(task);
            continue;
        }
        if let Some(task) = inner.try_steal(index) {
            backoff.reset();
            inner.run(task);
            continue;
        }
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        if backoff.is_completed() {
            thread::yield_now();
        } else {
            backoff.snooze();
        }
    }

    // Drain the own deque and inbox; tasks run here may push follow-ups onto
    // the deque, so keep going until both are quiet.
    loop {
        if let Some(task) = deque.pop() {
            inner.run(task);
            continue;
        }
        if let Some(task) = inbox.dequeue() {
            inner.run(task);
            continue;
        }
        break;
    }
    log::trace!("pool {}: worker {} exiting", inner.pool_id, index);
}
