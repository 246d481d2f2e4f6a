//! Behavioral tests for the work-stealing pool, including the worker
//! affinity path (a worker's submissions land on its own deque) and
//! shutdown-time draining of recursively spawned work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stealpool_rs::{Config, PoolError, Spawn, Task, WorkStealingPool};

#[test]
fn test_each_submitted_index_lands_in_place() {
    const N: usize = 1000;

    let pool = WorkStealingPool::new(Config::new(4, 64));
    let results: Arc<Vec<AtomicUsize>> =
        Arc::new((0..N).map(|_| AtomicUsize::new(usize::MAX)).collect());

    for i in 0..N {
        let results = Arc::clone(&results);
        pool.spawn(move || results[i].store(i, Ordering::SeqCst))
            .unwrap();
    }
    pool.stop();

    for (i, slot) in results.iter().enumerate() {
        assert_eq!(slot.load(Ordering::SeqCst), i);
    }
}

#[test]
fn test_stop_drains_external_submissions() {
    let pool = WorkStealingPool::new(Config::new(3, 16));
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..2000 {
        let counter = Arc::clone(&counter);
        pool.spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.stop();

    assert_eq!(counter.load(Ordering::SeqCst), 2000);
}

#[test]
fn test_recursive_spawns_survive_shutdown() {
    const FANOUT: usize = 200;

    let pool = WorkStealingPool::new(Config::new(4, 64));
    let counter = Arc::new(AtomicUsize::new(0));

    let root_counter = Arc::clone(&counter);
    let root_handle = pool.handle();
    pool.spawn(move || {
        // Runs on a worker: every spawn lands on that worker's own deque,
        // where thieves redistribute it
        for _ in 0..FANOUT {
            let counter = Arc::clone(&root_counter);
            root_handle
                .spawn(Task::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .expect("worker affinity submissions stay open during drain");
        }
    })
    .unwrap();

    pool.stop();
    assert_eq!(counter.load(Ordering::SeqCst), FANOUT);
}

#[test]
fn test_stop_twice_is_idempotent() {
    let pool = WorkStealingPool::new(Config::new(2, 16));
    pool.spawn(|| {}).unwrap();

    pool.stop();
    pool.stop();
    assert!(pool.is_shut_down());
}

#[test]
fn test_submission_after_stop_is_rejected() {
    let pool = WorkStealingPool::new(Config::new(2, 16));
    pool.stop();

    assert_eq!(pool.spawn(|| {}), Err(PoolError::ShutDown));
    assert!(matches!(pool.submit(|| 1), Err(PoolError::ShutDown)));
}

#[test]
fn test_future_carries_value() {
    let pool = WorkStealingPool::new(Config::new(2, 16));

    let answer = pool.submit(|| 6 * 7).unwrap();
    assert_eq!(answer.wait(), Ok(42));

    pool.stop();
}

#[test]
fn test_fault_is_isolated_to_its_future() {
    let pool = WorkStealingPool::new(Config::new(2, 64));

    let faulty = pool
        .submit(|| -> u32 { panic!("intentional fault") })
        .unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        pool.spawn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.stop();

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    match faulty.wait() {
        Err(error) => assert!(error.is_panic()),
        Ok(value) => panic!("the fault must surface through the future, got {value}"),
    }
}

#[test]
fn test_metrics_account_for_every_task() {
    let pool = WorkStealingPool::new(Config::new(4, 64).with_metrics(true));

    for _ in 0..500 {
        pool.spawn(|| {
            std::hint::black_box(0);
        })
        .unwrap();
    }
    pool.stop();

    let snapshot = pool.metrics();
    assert_eq!(snapshot.tasks_submitted, 500);
    assert_eq!(snapshot.tasks_completed, 500);
}

#[test]
fn test_zero_worker_request_is_coerced() {
    let pool = WorkStealingPool::new(Config::new(0, 16));
    assert!(pool.worker_count() >= 1);
    pool.stop();
}
