//! Error types for graph execution.

use thiserror::Error;

/// Errors reported by [`GraphRun::wait`](crate::GraphRun::wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// One or more node closures panicked. The graph still ran to
    /// completion: a faulting node releases its successors like any other.
    #[error("{panicked} of {total} graph tasks panicked")]
    NodesPanicked {
        /// Number of nodes whose closure panicked.
        panicked: usize,
        /// Total number of nodes in the graph.
        total: usize,
    },
}
