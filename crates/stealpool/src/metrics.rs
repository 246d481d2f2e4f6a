use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for monitoring pool activity.
///
/// All counters use relaxed atomics; a snapshot is a loose point-in-time view,
/// not a linearizable one.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_panicked: AtomicU64,
    steals: AtomicU64,
    steal_retries: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_submitted(&self, n: u64) {
        self.tasks_submitted.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_completed(&self, n: u64) {
        self.tasks_completed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_panicked(&self, n: u64) {
        self.tasks_panicked.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_steals(&self, n: u64) {
        self.steals.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_steal_retries(&self, n: u64) {
        self.steal_retries.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            steal_retries: self.steal_retries.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tasks accepted by `submit`/`spawn`.
    pub tasks_submitted: u64,
    /// Tasks that ran to completion (including ones that panicked).
    pub tasks_completed: u64,
    /// Tasks whose body panicked.
    pub tasks_panicked: u64,
    /// Successful steals from another worker's deque.
    pub steals: u64,
    /// Steal attempts that lost a race and had to retry.
    pub steal_retries: u64,
}
