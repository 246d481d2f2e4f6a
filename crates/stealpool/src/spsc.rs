use crate::invariants::{
    debug_assert_bounded_count, debug_assert_initialized_read, debug_assert_monotonic,
};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This SPSC ring queue uses a classic producer-consumer protocol with the
// following synchronization guarantees:
//
// ## Sequence Numbers (ABA Prevention)
//
// We use unbounded u64 sequence numbers for `head` and `tail` instead of
// wrapped indices. This prevents the ABA problem entirely:
// - With 2^64 possible values, wrap-around is practically impossible
// - Buffer index is computed as `sequence & mask` only when accessing slots
//
// One slot of headroom is kept so a full queue is distinguishable from an
// empty one: the queue is empty iff `head == tail` and full once
// `tail - head == capacity - 1`.
//
// ## Memory Ordering Protocol
//
// **Producer (enqueue path):**
// 1. Load `tail` with Relaxed (only producer writes tail)
// 2. Load `cached_head` with no ordering (UnsafeCell, single-writer)
// 3. If the cache shows no room: Load `head` with Acquire (synchronizes with
//    the consumer's Release store, proving the slot was vacated)
// 4. Write the item to its slot (no ordering needed - protected by protocol)
// 5. Store `tail` with Release (publishes the write to the consumer)
//
// **Consumer (dequeue path):**
// 1. Load `head` with Relaxed (only consumer writes head)
// 2. Load `cached_tail` with no ordering (UnsafeCell, single-writer)
// 3. If the cache shows nothing available: Load `tail` with Acquire
//    (synchronizes with the producer's Release store, carrying the slot write)
// 4. Move the item out of its slot
// 5. Store `head` with Release (publishes consumption to the producer)
//
// ## Single-Writer Invariants
//
// The following fields are accessed via UnsafeCell without atomics because
// they have exactly one writer:
// - `cached_head`: Only written by the producer, read by the producer
// - `cached_tail`: Only written by the consumer, read by the consumer
// - slot `i`: Written by the producer (before the tail publish), read by the
//   consumer (between the tail load and the head advance)
//
// These invariants hold as long as the role contract on the type is honored:
// one producer thread, one consumer thread. The pool serializes the producer
// role among submitters with a per-queue claim flag.
//
// =============================================================================

/// SPSC ring queue - the per-worker task inbox.
///
/// A bounded, lock-free single-producer single-consumer FIFO. Cursors and
/// their single-writer caches each live on their own cache line to avoid
/// false sharing; the cached peer cursor keeps the hot path free of
/// cross-core reads.
///
/// # Role contract
///
/// At most one thread may call [`enqueue`](Self::enqueue) at any time, and at
/// most one thread may call [`dequeue`](Self::dequeue) at any time. The same
/// thread may hold both roles.
pub struct SpscQueue<T> {
    // === PRODUCER HOT ===
    /// Tail cursor (written by producer, read by consumer)
    tail: CachePadded<AtomicU64>,
    /// Producer's cached view of head (avoids cross-core reads)
    cached_head: CachePadded<UnsafeCell<u64>>,

    // === CONSUMER HOT ===
    /// Head cursor (written by consumer, read by producer)
    head: CachePadded<AtomicU64>,
    /// Consumer's cached view of tail (avoids cross-core reads)
    cached_tail: CachePadded<UnsafeCell<u64>>,

    // === DATA BUFFER ===
    mask: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// Safety: SpscQueue is Send + Sync as long as T is Send. The cursor protocol
// above, together with the role contract, ensures each slot and each cached
// cursor has exactly one writer at any time.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    /// Creates a queue with the given slot count.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two or is smaller than 2.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2,
            "capacity must be a power of two >= 2"
        );

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            cached_head: CachePadded::new(UnsafeCell::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            cached_tail: CachePadded::new(UnsafeCell::new(0)),
            mask: capacity - 1,
            buffer,
        }
    }

    /// Returns the slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Returns the number of items the queue can hold at once
    /// (one slot less than the slot count).
    #[inline]
    pub fn usable_capacity(&self) -> usize {
        self.mask
    }

    /// Returns the current number of items in the queue.
    ///
    /// Observational only: not stable under concurrent progress.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    /// Returns `true` if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Relaxed)
    }

    /// Returns `true` if the queue is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.usable_capacity()
    }

    /// Appends an item. Producer role only.
    ///
    /// Returns the item back on a full queue without blocking; the caller
    /// decides whether to spin, yield, or propagate.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);

        // Fast path: check cached head
        // SAFETY: cached_head is only written by the producer (this code
        // path), so this unsynchronized read is safe.
        let mut head = unsafe { *self.cached_head.get() };

        if tail.wrapping_sub(head) as usize >= self.usable_capacity() {
            // Slow path: refresh cache
            head = self.head.load(Ordering::Acquire);
            // SAFETY: cached_head is only written by the producer. The
            // Acquire load above synchronizes with the consumer's Release
            // store, so the vacated slots are visible.
            unsafe {
                *self.cached_head.get() = head;
            }

            if tail.wrapping_sub(head) as usize >= self.usable_capacity() {
                return Err(item);
            }
        }

        let new_tail = tail.wrapping_add(1);

        // INV-Q-01: occupancy never exceeds the usable capacity
        debug_assert_bounded_count!(
            new_tail.wrapping_sub(head) as usize,
            self.usable_capacity()
        );
        // INV-Q-02: tail only advances
        debug_assert_monotonic!("tail", tail, new_tail);

        let idx = (tail as usize) & self.mask;
        // SAFETY: slot `idx` is outside the initialized window [head, tail)
        // and only the producer writes slots beyond tail, so no other thread
        // is touching it. The Release store below publishes the write.
        unsafe {
            (*self.buffer[idx].get()).write(item);
        }

        self.tail.store(new_tail, Ordering::Release);
        Ok(())
    }

    /// Removes the oldest item. Consumer role only.
    ///
    /// Returns `None` on an empty queue without blocking.
    pub fn dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        // Fast path: check cached tail
        // SAFETY: cached_tail is only written by the consumer (this code
        // path), so this unsynchronized read is safe.
        let mut tail = unsafe { *self.cached_tail.get() };

        if tail == head {
            // Slow path: refresh cache
            tail = self.tail.load(Ordering::Acquire);
            // SAFETY: cached_tail is only written by the consumer. The
            // Acquire load above synchronizes with the producer's Release
            // store, carrying the slot writes.
            unsafe {
                *self.cached_tail.get() = tail;
            }

            if tail == head {
                return None;
            }
        }

        // INV-Q-03: the slot at `head` lies inside the initialized window
        debug_assert_initialized_read!(head, head, tail);
        // INV-Q-02: head only advances
        debug_assert_monotonic!("head", head, head.wrapping_add(1));

        let idx = (head as usize) & self.mask;
        // SAFETY: slots in [head, tail) were fully written by the producer
        // and published by its Release store of tail, which our Acquire load
        // observed. assume_init_read moves ownership out; the slot counts as
        // vacant once head advances past it.
        let item = unsafe { (*self.buffer[idx].get()).assume_init_read() };

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        // Drop all initialized items still in the queue
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;

        for i in 0..count {
            let idx = ((head as usize).wrapping_add(i)) & self.mask;
            unsafe {
                ptr::drop_in_place((*self.buffer[idx].get()).as_mut_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = SpscQueue::new(16);

        for i in 0..10 {
            queue.enqueue(i).unwrap();
        }
        assert_eq!(queue.len(), 10);

        for i in 0..10 {
            assert_eq!(queue.dequeue(), Some(i));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_full_keeps_one_slot_free() {
        let queue = SpscQueue::new(4);

        assert!(queue.enqueue(1).is_ok());
        assert!(queue.enqueue(2).is_ok());
        assert!(queue.enqueue(3).is_ok());
        assert!(queue.is_full());

        // The fourth slot is sacrificed; the item comes back
        assert_eq!(queue.enqueue(4), Err(4));

        assert_eq!(queue.dequeue(), Some(1));
        assert!(queue.enqueue(4).is_ok());
    }

    #[test]
    fn test_wrap_around_reuse() {
        let queue = SpscQueue::new(4);

        // Fill and drain several times to exercise wrap-around
        for round in 0..5u64 {
            for i in 0..3 {
                queue.enqueue(round * 10 + i).unwrap();
            }
            for i in 0..3 {
                assert_eq!(queue.dequeue(), Some(round * 10 + i));
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropTracker {
            _id: u64,
        }

        impl Drop for DropTracker {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);

        {
            let queue = SpscQueue::new(8);
            for i in 0..5 {
                assert!(queue.enqueue(DropTracker { _id: i }).is_ok());
            }
            drop(queue.dequeue());
            assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
        }

        // The four undequeued items are dropped with the queue
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_len_tracks_both_cursors() {
        let queue = SpscQueue::new(8);
        assert_eq!(queue.len(), 0);

        queue.enqueue('a').unwrap();
        queue.enqueue('b').unwrap();
        assert_eq!(queue.len(), 2);

        queue.dequeue();
        assert_eq!(queue.len(), 1);
    }
}
