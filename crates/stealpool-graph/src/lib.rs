//! Dependency-graph scheduling for stealpool-rs
//!
//! This crate drives directed acyclic graphs of tasks over a
//! [`stealpool_rs`] thread pool. A [`TaskGraph`] is an arena of closures
//! plus dependency edges; the [`Scheduler`] seeds its ready nodes into the
//! pool and releases the rest through an atomic dependency-counter protocol
//! as predecessors finish.
//!
//! # Guarantees
//!
//! - Each node runs exactly once, across however many workers the pool has.
//! - A dependency edge orders the predecessor's work *happens-before* the
//!   successor's work.
//! - A panicking node is caught and counted; its successors still run.
//!
//! # Example
//!
//! ```
//! use stealpool_graph::{Scheduler, TaskGraph};
//! use stealpool_rs::{Config, WorkStealingPool};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = WorkStealingPool::new(Config::new(2, 64));
//! let scheduler = Scheduler::new(pool.handle());
//!
//! let total = Arc::new(AtomicUsize::new(0));
//! let mut graph = TaskGraph::new();
//!
//! let first_total = Arc::clone(&total);
//! let first = graph.add_task(move || {
//!     first_total.fetch_add(1, Ordering::SeqCst);
//! });
//! let second_total = Arc::clone(&total);
//! let second = graph.add_task(move || {
//!     second_total.fetch_add(2, Ordering::SeqCst);
//! });
//! graph.add_dependency(first, second);
//!
//! scheduler.execute(graph).wait().unwrap();
//! assert_eq!(total.load(Ordering::SeqCst), 3);
//!
//! pool.stop();
//! ```

mod error;
mod graph;
mod scheduler;

pub use error::GraphError;
pub use graph::{NodeId, TaskGraph};
pub use scheduler::{GraphRun, Scheduler};
