use crate::invariants::debug_assert_deque_bounds;
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicI64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This is the Chase-Lev work-stealing deque: the owner pushes and pops at the
// bottom end, any number of thieves contend for the top end.
//
// ## Counters
//
// `top` and `bottom` are 64-bit signed counters that are never wrapped; the
// slot index is `counter & mask`. `top` only ever advances, and only through
// a successful CAS, which is what delivers each element at most once.
// `bottom` is written only by the owner and may decrease only during a pop.
// The live window is `[top, bottom)`.
//
// ## The last-element race
//
// When one element remains, the owner's pop and a thief's steal race for it:
//
// - The owner speculatively publishes `bottom - 1` (Release), then issues a
//   SeqCst fence before loading `top`.
// - A thief loads `top` (Acquire), issues a SeqCst fence, then loads `bottom`
//   (Acquire).
// - Both sides claim the element with a SeqCst CAS on `top`.
//
// The fences order the owner's store-then-load against the thief's
// load-then-load in the single total order, which rules out the interleaving
// where the thief sees the old `bottom` while the owner sees the old `top`
// and both take the element. Slot bytes are copied out as `MaybeUninit` and
// materialized only after the CAS settles who owns them.
//
// ## Growth and reclamation
//
// Only the owner grows the buffer. Growth copies the live window to the
// *same logical indices* of a doubled buffer. The counters are untouched, so
// growth only widens the range of valid indices and never invalidates an
// in-flight thief's view. A slot whose logical index a thief has already
// claimed may be copied redundantly; it is dead in the new buffer because
// `top` has moved past it, and buffers never drop their slots.
//
// The old buffer is retired through the epoch collector: every slot access
// happens under a pinned guard, and the owner `defer_destroy`s the previous
// buffer after publishing its replacement, so reclamation is deferred past
// the last in-flight observation.
//
// =============================================================================

/// Result of a steal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steal<T> {
    /// One element was taken from the top end.
    Success(T),
    /// The deque was observed empty.
    Empty,
    /// Another thread won the race for the top element; retrying may succeed.
    Retry,
}

impl<T> Steal<T> {
    /// Returns the stolen element, if any.
    #[inline]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(item) => Some(item),
            Self::Empty | Self::Retry => None,
        }
    }

    /// Returns `true` if the deque was observed empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Circular storage for the deque. Never drops its slots; live elements are
/// dropped by the deque itself.
struct Buffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            slots: (0..capacity)
                .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
                .collect(),
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Writes an element at a logical index.
    ///
    /// # Safety
    ///
    /// The caller must be the owner and the slot must be outside every
    /// concurrent reader's live window.
    #[inline]
    unsafe fn write(&self, index: i64, item: MaybeUninit<T>) {
        let idx = (index as usize) & (self.capacity() - 1);
        self.slots[idx].get().write(item);
    }

    /// Copies the bytes at a logical index without claiming ownership.
    ///
    /// # Safety
    ///
    /// `index` must lie inside the live window `[top, bottom)` observed by
    /// the caller. The copy may only be materialized with `assume_init` once
    /// the CAS protocol has granted ownership.
    #[inline]
    unsafe fn read(&self, index: i64) -> MaybeUninit<T> {
        let idx = (index as usize) & (self.capacity() - 1);
        self.slots[idx].get().read()
    }
}

/// Chase-Lev work-stealing deque.
///
/// The owner observes LIFO order at the bottom end; thieves observe FIFO
/// order at the top end. All operations are non-blocking.
///
/// # Role contract
///
/// Exactly one thread (the owner) may call [`push`](Self::push) and
/// [`pop`](Self::pop). Any number of threads may call [`steal`](Self::steal)
/// concurrently.
pub struct WorkStealingDeque<T> {
    /// Bottom counter; written only by the owner.
    bottom: CachePadded<AtomicI64>,
    /// Top counter; advances only through a successful CAS.
    top: CachePadded<AtomicI64>,
    /// Current buffer; swung only by the owner, read by everyone.
    buffer: Atomic<Buffer<T>>,
}

// Safety: the counter protocol above hands each element to exactly one
// thread, and buffer reclamation is deferred through the epoch collector.
unsafe impl<T: Send> Send for WorkStealingDeque<T> {}
unsafe impl<T: Send> Sync for WorkStealingDeque<T> {}

impl<T> WorkStealingDeque<T> {
    /// Creates a deque with the given initial capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two or is smaller than 2.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2,
            "capacity must be a power of two >= 2"
        );

        Self {
            bottom: CachePadded::new(AtomicI64::new(0)),
            top: CachePadded::new(AtomicI64::new(0)),
            buffer: Atomic::new(Buffer::new(capacity)),
        }
    }

    /// Returns the number of elements currently in the deque.
    ///
    /// Observational only: not stable under concurrent progress.
    #[inline]
    pub fn len(&self) -> usize {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        usize::try_from(b - t).unwrap_or(0)
    }

    /// Returns `true` if the deque is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes an element onto the bottom end. Owner only.
    ///
    /// Grows the buffer when fewer than two free slots remain; growth never
    /// blocks thieves.
    pub fn push(&self, item: T) {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        let guard = &epoch::pin();

        let mut buf = self.buffer.load(Ordering::Acquire, guard);
        // SAFETY: the buffer is valid for the lifetime of the pinned guard.
        let mut capacity = unsafe { buf.deref().capacity() };

        if b - t >= capacity as i64 - 1 {
            self.grow(t, b, guard);
            buf = self.buffer.load(Ordering::Acquire, guard);
            // SAFETY: as above; `grow` just published this buffer.
            capacity = unsafe { buf.deref().capacity() };
        }

        // INV-D-01: the widened window still fits
        debug_assert_deque_bounds!(b - t + 1, capacity);

        // SAFETY: slot `b` is outside the live window [top, bottom); only
        // the owner writes beyond `bottom`. The Release store publishes it.
        unsafe {
            buf.deref().write(b, MaybeUninit::new(item));
        }
        self.bottom.store(b + 1, Ordering::Release);
    }

    /// Pops an element from the bottom end. Owner only.
    ///
    /// Returns `None` on an empty deque. When exactly one element remains it
    /// is raced against thieves; losing the race also reports empty.
    pub fn pop(&self) -> Option<T> {
        let b = self.bottom.load(Ordering::Relaxed) - 1;
        self.bottom.store(b, Ordering::Release);
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Acquire);

        if b < t {
            // Already empty; undo the speculative decrement
            self.bottom.store(b + 1, Ordering::Relaxed);
            return None;
        }

        let guard = &epoch::pin();
        let buf = self.buffer.load(Ordering::Acquire, guard);
        // SAFETY: `b` is inside the window we just proved non-empty, and the
        // copy stays un-materialized until ownership is settled below.
        let slot = unsafe { buf.deref().read(b) };

        if b > t {
            // More than one element: no thief can reach index `b`
            // SAFETY: ownership of slot `b` is exclusive in this branch.
            return Some(unsafe { slot.assume_init() });
        }

        // Exactly one element: race thieves for it via CAS on top
        let won = self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok();
        self.bottom.store(t + 1, Ordering::Relaxed);

        if won {
            // SAFETY: the CAS granted us the element at index `t == b`.
            Some(unsafe { slot.assume_init() })
        } else {
            // A thief took it; the byte copy is never materialized
            None
        }
    }

    /// Attempts to steal the element at the top end. Any thread.
    ///
    /// Never blocks: reports [`Steal::Retry`] when another thread wins the
    /// race so the caller can decide whether to loop or move on.
    pub fn steal(&self) -> Steal<T> {
        let t = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let b = self.bottom.load(Ordering::Acquire);

        if b <= t {
            return Steal::Empty;
        }

        let guard = &epoch::pin();
        let buf = self.buffer.load(Ordering::Acquire, guard);
        // SAFETY: `t` was inside the live window at the fence; the copy is
        // materialized only if the CAS below claims it.
        let slot = unsafe { buf.deref().read(t) };

        if self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            // SAFETY: the CAS granted us the element at index `t`.
            Steal::Success(unsafe { slot.assume_init() })
        } else {
            Steal::Retry
        }
    }

    /// Owner-only: doubles the buffer, copying the live window `[top, bottom)`
    /// to the same logical indices, then retires the old buffer through the
    /// epoch collector.
    fn grow(&self, top: i64, bottom: i64, guard: &Guard) {
        let old = self.buffer.load(Ordering::Acquire, guard);
        // SAFETY: valid under the pinned guard; only the owner swings it.
        let old_ref = unsafe { old.deref() };

        let new = Buffer::new(old_ref.capacity() * 2);
        for i in top..bottom {
            // SAFETY: logical indices in [top, bottom) are initialized in the
            // old buffer; the new buffer is not yet shared. Indices already
            // claimed by concurrent thieves become dead copies.
            unsafe {
                new.write(i, old_ref.read(i));
            }
        }

        log::trace!(
            "deque buffer grown {} -> {}",
            old_ref.capacity(),
            old_ref.capacity() * 2
        );

        let old = self.buffer.swap(Owned::new(new), Ordering::Release, guard);
        // SAFETY: `old` is unlinked; destruction is deferred until every
        // thief pinned before the swap has unpinned.
        unsafe {
            guard.defer_destroy(old);
        }
    }
}

impl<T> Drop for WorkStealingDeque<T> {
    fn drop(&mut self) {
        let b = *self.bottom.get_mut();
        let t = *self.top.get_mut();

        // SAFETY: &mut self guarantees no concurrent owner or thief, so the
        // unprotected guard and the immediate destruction are sound. Elements
        // still in [top, bottom) are materialized and dropped here; buffers
        // themselves never drop slots.
        unsafe {
            let guard = epoch::unprotected();
            let buf = self.buffer.load(Ordering::Relaxed, guard);
            let buf_ref = buf.deref();
            for i in t..b {
                drop(buf_ref.read(i).assume_init());
            }
            drop(buf.into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_observes_lifo() {
        let deque = WorkStealingDeque::new(16);

        for i in 1..=10 {
            deque.push(i);
        }
        for i in (1..=10).rev() {
            assert_eq!(deque.pop(), Some(i));
        }
        assert_eq!(deque.pop(), None);
    }

    #[test]
    fn test_thief_observes_fifo() {
        let deque = WorkStealingDeque::new(16);

        deque.push('a');
        deque.push('b');
        deque.push('c');

        assert_eq!(deque.steal(), Steal::Success('a'));
        assert_eq!(deque.steal(), Steal::Success('b'));
        assert_eq!(deque.steal(), Steal::Success('c'));
        assert!(deque.steal().is_empty());
    }

    #[test]
    fn test_growth_preserves_window() {
        let deque = WorkStealingDeque::new(2);

        // Force several rounds of growth
        for i in 0..100 {
            deque.push(i);
        }
        assert_eq!(deque.len(), 100);

        // Mixed drain: steal the oldest, pop the newest
        assert_eq!(deque.steal(), Steal::Success(0));
        assert_eq!(deque.pop(), Some(99));

        let mut remaining: Vec<i32> = Vec::new();
        while let Some(v) = deque.pop() {
            remaining.push(v);
        }
        assert_eq!(remaining.len(), 98);
        assert_eq!(remaining.first(), Some(&98));
        assert_eq!(remaining.last(), Some(&1));
    }

    #[test]
    fn test_last_element_owner_wins_unopposed() {
        let deque = WorkStealingDeque::new(4);

        deque.push(7);
        assert_eq!(deque.pop(), Some(7));
        assert!(deque.steal().is_empty());
        assert_eq!(deque.pop(), None);
    }

    #[test]
    fn test_interleaved_push_pop_steal() {
        let deque = WorkStealingDeque::new(4);

        deque.push(1);
        deque.push(2);
        assert_eq!(deque.steal(), Steal::Success(1));
        deque.push(3);
        assert_eq!(deque.pop(), Some(3));
        assert_eq!(deque.pop(), Some(2));
        assert!(deque.is_empty());
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
            let deque = WorkStealingDeque::new(8);
            for i in 0..6 {
                deque.push(DropTracker { _id: i });
            }
            drop(deque.pop());
            drop(deque.steal().success());
            assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
        }

        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 6);
    }
}
