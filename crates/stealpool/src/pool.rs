//! The per-queue thread pool: N workers, each consuming its own SPSC inbox,
//! with submissions distributed round-robin.
//!
//! ## Producer claims
//!
//! Each inbox is strictly single-producer, but any thread may call `submit`.
//! The pool serializes the producer role with a per-queue claim flag: a
//! submitter CASes the claim, enqueues, and releases. A submitter that loses
//! a claim simply advances to the next queue, so the path stays non-blocking.
//!
//! ## Shutdown protocol
//!
//! `stop` publishes the shutdown flag, joins every worker (each drains its
//! own inbox once it observes the flag), then sweeps all inboxes under their
//! producer claims and runs any straggler on the stopping thread. The
//! claim-release / claim-acquire edge orders every in-flight submitter either
//! before the sweep (its task is executed by the sweep) or after it (it
//! re-checks the flag under the claim and is rejected), so a task accepted
//! before `stop` returns is never lost. Workers keep a drain path open for
//! their own submissions so completion continuations survive shutdown.

use crate::future::{self, TaskFuture};
use crate::worker;
use crate::{Config, MetricsSnapshot, PoolError, PoolMetrics, Rejected, Spawn, SpscQueue, Task, TaskError};
use crossbeam_utils::{Backoff, CachePadded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Fixed-size thread pool with one SPSC inbox per worker.
///
/// Submissions are spread round-robin across the inboxes; idle workers yield.
/// Dropping the pool stops it, draining pending tasks first.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

pub(crate) struct PoolInner {
    queues: Box<[SpscQueue<Task>]>,
    /// Producer-role claims, one per inbox.
    claims: Box<[CachePadded<AtomicBool>]>,
    /// Round-robin submission cursor.
    cursor: AtomicUsize,
    shutdown: AtomicBool,
    pool_id: usize,
    metrics: PoolMetrics,
    config: Config,
}

impl ThreadPool {
    /// Starts a pool as configured.
    ///
    /// A `workers` setting of 0 resolves to the available hardware
    /// parallelism, minimum 1.
    pub fn new(config: Config) -> Self {
        let worker_count = config.resolved_workers();

        let queues = (0..worker_count)
            .map(|_| SpscQueue::new(config.capacity()))
            .collect();
        let claims = (0..worker_count)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect();

        let inner = Arc::new(PoolInner {
            queues,
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
            "pool {}: started {} workers, {} slots per inbox",
            inner.pool_id,
            worker_count,
            config.capacity()
        );

        Self {
            inner,
            workers: Mutex::new(handles),
        }
    }

    /// Returns the number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.inner.queues.len()
    }

    /// Returns `true` once shutdown has been initiated.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Submits a value-returning closure and hands back the future-holder
    /// for its result.
    ///
    /// Applies back-pressure by yielding while every inbox is full; the task
    /// is never lost once accepted. Rejected with [`PoolError::ShutDown`]
    /// after [`stop`](Self::stop).
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
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
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
        // Stragglers from submitters that raced the flag
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

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Spawn for ThreadPool {
    fn spawn(&self, task: Task) -> Result<(), Rejected> {
        self.inner.spawn_task(task)
    }
}

/// Cloneable submission handle for [`ThreadPool`].
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<PoolInner>,
}

impl Spawn for PoolHandle {
    fn spawn(&self, task: Task) -> Result<(), Rejected> {
        self.inner.spawn_task(task)
    }
}

impl PoolInner {
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
        if self.shutdown.load(Ordering::SeqCst) {
            // Workers keep submitting into their own inbox during drain so
            // completion continuations are not cut off.
            if let Some(me) = worker::current_worker_in(self.pool_id) {
                self.drain_submit(me, task);
                self.note_submitted();
                return Ok(());
            }
            return Err(Rejected(task));
        }

        let queue_count = self.queues.len();
        let mut task = task;
        let backoff = Backoff::new();
        loop {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % queue_count;
            if self.try_claim(index) {
                // Re-check under the claim: orders this submission against
                // the stopping thread's final sweep.
                if self.shutdown.load(Ordering::SeqCst) {
                    self.release(index);
                    if let Some(me) = worker::current_worker_in(self.pool_id) {
                        self.drain_submit(me, task);
                        self.note_submitted();
                        return Ok(());
                    }
                    return Err(Rejected(task));
                }

                let result = self.queues[index].enqueue(task);
                self.release(index);
                match result {
                    Ok(()) => {
                        self.note_submitted();
                        return Ok(());
                    }
                    Err(returned) => {
                        task = returned;
                        // A worker cycling through full inboxes is also the
                        // consumer of its own: draining one task inline
                        // guarantees progress even on a single-worker pool.
                        if let Some(me) = worker::current_worker_in(self.pool_id) {
                            if let Some(next) = self.queues[me].dequeue() {
                                self.run(next);
                                continue;
                            }
                        }
                    }
                }
            }
            // Inbox full or claim contended: yield at the submitter
            backoff.snooze();
        }
    }

    /// Worker-only submission path used once the shutdown flag is up. The
    /// worker owns its consumer end, so it can always make room by running a
    /// queued task inline.
    fn drain_submit(&self, me: usize, task: Task) {
        let mut task = task;
        loop {
            self.claim(me);
            let result = self.queues[me].enqueue(task);
            self.release(me);
            match result {
                Ok(()) => return,
                Err(returned) => {
                    task = returned;
                    if let Some(next) = self.queues[me].dequeue() {
                        self.run(next);
                    }
                }
            }
        }
    }

    /// Runs every task still sitting in an inbox on the calling thread.
    /// Claims fence off submitters that raced the shutdown flag.
    fn final_sweep(&self) {
        for index in 0..self.queues.len() {
            self.claim(index);
            while let Some(task) = self.queues[index].dequeue() {
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

fn worker_loop(inner: &PoolInner, index: usize) {
    let _guard = worker::register(inner.pool_id, index);
    log::trace!("pool {}: worker {} up", inner.pool_id, index);

    let queue = &inner.queues[index];
    let backoff = Backoff::new();
    loop {
        if let Some(task) = queue.dequeue() {
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

    // Drain whatever landed between the last empty check and the flag,
    // including this worker's own shutdown-time submissions.
    while let Some(task) = queue.dequeue() {
        inner.run(task);
    }
    log::trace!("pool {}: worker {} exiting", inner.pool_id, index);
}
