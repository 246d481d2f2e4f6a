//! Error types for pool and task operations.

use thiserror::Error;

/// Errors reported synchronously by pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool has been shut down and no longer accepts tasks.
    #[error("pool is shut down")]
    ShutDown,
}

/// Errors surfaced asynchronously through a [`TaskFuture`](crate::TaskFuture).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task body panicked. The payload is rendered to a string; the
    /// worker that ran the task is unaffected.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it could run to completion.
    #[error("task was dropped before completion")]
    Abandoned,
}

impl TaskError {
    /// Returns `true` if the task body itself faulted.
    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}
