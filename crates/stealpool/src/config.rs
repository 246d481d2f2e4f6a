use std::thread;

/// Configuration for both pool variants.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of worker threads. `0` means "resolve to the available
    /// hardware parallelism at pool construction" (minimum 1).
    pub workers: usize,
    /// Per-worker queue capacity. Must be a power of two.
    ///
    /// One slot is kept free to distinguish a full queue from an empty one,
    /// so a queue of capacity `C` holds at most `C - 1` items.
    pub queue_capacity: usize,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if `queue_capacity` is not a power of two, is smaller than 2,
    /// or exceeds 2^20 (1M slots) to prevent excessive memory usage.
    pub const fn new(workers: usize, queue_capacity: usize) -> Self {
        assert!(
            queue_capacity.is_power_of_two(),
            "queue_capacity must be a power of two"
        );
        assert!(
            queue_capacity >= 2 && queue_capacity <= (1 << 20),
            "queue_capacity must be between 2 and 2^20"
        );

        Self {
            workers,
            queue_capacity,
            enable_metrics: false,
        }
    }

    /// Enables or disables metrics collection.
    pub const fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Returns the per-worker queue capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Returns the mask for index wrapping.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.queue_capacity - 1
    }

    /// Resolves the worker count, defaulting to the available hardware
    /// parallelism when `workers` is 0. Never returns 0.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0, // hardware parallelism
            queue_capacity: 1024,
            enable_metrics: false,
        }
    }
}

/// Small queues for latency-sensitive workloads (256 slots per worker).
pub const SMALL_QUEUE_CONFIG: Config = Config::new(0, 256);

/// Large queues for bursty submission patterns (64K slots per worker).
pub const LARGE_QUEUE_CONFIG: Config = Config::new(0, 1 << 16);
