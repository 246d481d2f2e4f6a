//! Debug assertion macros for queue and deque invariants.
//!
//! These macros provide runtime checks for the protocol invariants of the
//! concurrent containers. They are only active in debug builds
//! (`#[cfg(debug_assertions)]`), so there is zero overhead in release builds.

// =============================================================================
// INV-Q-01: Bounded Occupancy
// =============================================================================

/// Assert that queue occupancy stays within the usable capacity.
///
/// **Invariant**: `0 ≤ (tail - head) ≤ capacity - 1`
///
/// Used in: `SpscQueue::enqueue()` after computing the new tail
macro_rules! debug_assert_bounded_count {
    ($count:expr, $usable:expr) => {
        debug_assert!(
            $count <= $usable,
            "INV-Q-01 violated: occupancy {} exceeds usable capacity {}",
            $count,
            $usable
        )
    };
}

// =============================================================================
// INV-Q-02: Monotonic Cursors
// =============================================================================

/// Assert that a cursor only advances.
///
/// **Invariant**: `new_value ≥ old_value`
///
/// Used in: `SpscQueue::enqueue()` for tail, `SpscQueue::dequeue()` for head
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-Q-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-Q-03: Initialized Range Check
// =============================================================================

/// Assert that a slot read falls inside the initialized window.
///
/// **Invariant**: `buffer[i] is initialized ⟺ head ≤ sequence(i) < tail`
///
/// Used in: `SpscQueue::dequeue()` before `assume_init_read()`
macro_rules! debug_assert_initialized_read {
    ($pos:expr, $head:expr, $tail:expr) => {
        debug_assert!(
            $pos >= $head && $pos < $tail,
            "INV-Q-03 violated: reading slot at seq {} outside initialized range [{}, {})",
            $pos,
            $head,
            $tail
        )
    };
}

// =============================================================================
// INV-D-01: Deque Counter Bounds
// =============================================================================

/// Assert that the deque's live window fits the current buffer.
///
/// **Invariant**: `0 ≤ (bottom - top) < capacity` after a push has made room
///
/// Used in: `WorkStealingDeque::push()` after the grow check
macro_rules! debug_assert_deque_bounds {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len >= 0 && ($len as usize) < $capacity,
            "INV-D-01 violated: live window {} does not fit buffer of {}",
            $len,
            $capacity
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_deque_bounds;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
