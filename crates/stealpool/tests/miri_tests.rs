//! Miri-compatible tests for detecting undefined behavior.
//!
//! Run with: `cargo +nightly miri test --test miri_tests`
//!
//! These tests are designed to exercise the unsafe code paths (slot writes
//! and reads around cursor wrap, deque growth, the un-materialized
//! `MaybeUninit` copies in the steal protocol, and drop of non-empty
//! containers) with heap-owning element types so Miri can see leaks,
//! double-frees, and uninitialized reads.

use stealpool_rs::{Config, SpscQueue, Steal, ThreadPool, WorkStealingDeque, WorkStealingPool};

#[test]
fn miri_queue_wrap_around_with_owned_values() {
    let queue = SpscQueue::new(4);

    for round in 0..3 {
        for i in 0..3 {
            queue
                .enqueue(format!("value-{round}-{i}"))
                .expect("three items fit a capacity-4 queue");
        }
        for i in 0..3 {
            assert_eq!(queue.dequeue(), Some(format!("value-{round}-{i}")));
        }
    }
}

#[test]
fn miri_queue_drop_with_items_in_flight() {
    let queue = SpscQueue::new(8);
    for i in 0..5 {
        queue.enqueue(vec![i; 4]).unwrap();
    }
    drop(queue.dequeue());
    // Remaining boxed items are released by the queue's Drop
}

#[test]
fn miri_deque_growth_and_mixed_drain() {
    let deque = WorkStealingDeque::new(2);

    for i in 0..20 {
        deque.push(Box::new(i));
    }

    // Steal the oldest, pop the newest, leave the rest to Drop
    assert_eq!(deque.steal().success(), Some(Box::new(0)));
    assert_eq!(deque.pop(), Some(Box::new(19)));
}

#[test]
fn miri_deque_single_thread_role_interleaving() {
    let deque = WorkStealingDeque::new(4);

    deque.push(String::from("a"));
    deque.push(String::from("b"));
    assert!(matches!(deque.steal(), Steal::Success(s) if s == "a"));
    deque.push(String::from("c"));
    assert_eq!(deque.pop(), Some(String::from("c")));
    assert_eq!(deque.pop(), Some(String::from("b")));
    assert_eq!(deque.pop(), None);
}

#[test]
fn miri_pool_smoke() {
    let pool = ThreadPool::new(Config::new(2, 16));
    let futures: Vec<_> = (0..4)
        .map(|i| pool.submit(move || format!("task-{i}")).unwrap())
        .collect();
    for (i, future) in futures.into_iter().enumerate() {
        assert_eq!(future.wait(), Ok(format!("task-{i}")));
    }
    pool.stop();
}

#[test]
fn miri_steal_pool_smoke() {
    let pool = WorkStealingPool::new(Config::new(2, 16));
    let answer = pool.submit(|| 40 + 2).unwrap();
    assert_eq!(answer.wait(), Ok(42));
    pool.stop();
}
