//! StealPool - Lock-Free Work-Stealing Thread Pools
//!
//! A parallel task-execution core built from two lock-free containers: a
//! bounded SPSC ring queue (the per-worker inbox) and the Chase-Lev
//! work-stealing deque. Two pool variants sit on top of them:
//!
//! - [`ThreadPool`]: one SPSC inbox per worker, round-robin submission,
//!   idle workers yield.
//! - [`WorkStealingPool`]: one deque per worker; a worker schedules onto its
//!   own deque and idle workers steal from the others.
//!
//! # Key Features
//!
//! - Unbounded sequence counters (ABA-free index arithmetic)
//! - Cache-line isolation of all hot cursors
//! - Epoch-based reclamation of grown deque buffers
//! - Adaptive backoff (spin → yield) on every wait path
//! - Panic isolation at the worker boundary via future-holders
//!
//! # Example
//!
//! ```
//! use stealpool_rs::{Config, WorkStealingPool};
//!
//! let pool = WorkStealingPool::new(Config::new(2, 64));
//!
//! // Value-returning submission: the future-holder blocks for the result
//! let doubled = pool.submit(|| 21 * 2).unwrap();
//! assert_eq!(doubled.wait(), Ok(42));
//!
//! // Fire-and-forget submission
//! pool.spawn(|| println!("ran somewhere on the pool")).unwrap();
//!
//! // Drains pending tasks, then joins the workers
//! pool.stop();
//! ```

mod config;
mod deque;
mod error;
mod future;
mod invariants;
mod metrics;
mod pool;
mod spsc;
mod steal_pool;
mod task;
mod worker;

pub use config::{Config, LARGE_QUEUE_CONFIG, SMALL_QUEUE_CONFIG};
pub use deque::{Steal, WorkStealingDeque};
pub use error::{PoolError, TaskError};
pub use future::TaskFuture;
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{PoolHandle, ThreadPool};
pub use spsc::SpscQueue;
pub use steal_pool::{StealPoolHandle, WorkStealingPool};
pub use task::{Rejected, Spawn, Task};
