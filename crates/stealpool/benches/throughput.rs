use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use stealpool_rs::{Config, SpscQueue, ThreadPool, WorkStealingDeque, WorkStealingPool};

const ITEMS: u64 = 1_000_000;
const TASKS: u64 = 100_000;

fn bench_spsc_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_queue");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("ping_pong", |b| {
        b.iter(|| {
            let queue = Arc::new(SpscQueue::new(1 << 12));
            let producer_queue = Arc::clone(&queue);

            let producer = thread::spawn(move || {
                for i in 0..ITEMS {
                    let mut item = i;
                    while let Err(returned) = producer_queue.enqueue(item) {
                        item = returned;
                        std::hint::spin_loop();
                    }
                }
            });

            let mut received = 0u64;
            while received < ITEMS {
                if let Some(value) = queue.dequeue() {
                    black_box(value);
                    received += 1;
                } else {
                    std::hint::spin_loop();
                }
            }

            producer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_deque(c: &mut Criterion) {
    let mut group = c.benchmark_group("deque");
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("owner_push_pop", |b| {
        b.iter(|| {
            let deque = WorkStealingDeque::new(1 << 12);
            for i in 0..ITEMS {
                deque.push(i);
                if i % 2 == 0 {
                    black_box(deque.pop());
                }
            }
            while let Some(value) = deque.pop() {
                black_box(value);
            }
        });
    });

    for thieves in [1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::new("contended_steal", thieves),
            &thieves,
            |b, &thieves| {
                b.iter(|| {
                    let deque = Arc::new(WorkStealingDeque::new(1 << 12));
                    let done = Arc::new(AtomicBool::new(false));

                    let handles: Vec<_> = (0..thieves)
                        .map(|_| {
                            let deque = Arc::clone(&deque);
                            let done = Arc::clone(&done);
                            thread::spawn(move || {
                                let mut stolen = 0u64;
                                loop {
                                    if let Some(value) = deque.steal().success() {
                                        black_box(value);
                                        stolen += 1;
                                    } else if done.load(Ordering::Acquire) && deque.is_empty() {
                                        break;
                                    } else {
                                        std::hint::spin_loop();
                                    }
                                }
                                stolen
                            })
                        })
                        .collect();

                    for i in 0..ITEMS {
                        deque.push(i);
                        if i % 2 == 0 {
                            black_box(deque.pop());
                        }
                    }
                    done.store(true, Ordering::Release);
                    while let Some(value) = deque.pop() {
                        black_box(value);
                    }

                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_pools(c: &mut Criterion) {
    let mut group = c.benchmark_group("pools");
    group.throughput(Throughput::Elements(TASKS));
    group.sample_size(10);

    group.bench_function("per_queue_submit_drain", |b| {
        b.iter(|| {
            let pool = ThreadPool::new(Config::new(4, 1 << 10));
            let counter = Arc::new(AtomicU64::new(0));
            for _ in 0..TASKS {
                let counter = Arc::clone(&counter);
                pool.spawn(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
            pool.stop();
            assert_eq!(counter.load(Ordering::Relaxed), TASKS);
        });
    });

    group.bench_function("work_stealing_submit_drain", |b| {
        b.iter(|| {
            let pool = WorkStealingPool::new(Config::new(4, 1 << 10));
            let counter = Arc::new(AtomicU64::new(0));
            for _ in 0..TASKS {
                let counter = Arc::clone(&counter);
                pool.spawn(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
            pool.stop();
            assert_eq!(counter.load(Ordering::Relaxed), TASKS);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_spsc_queue, bench_deque, bench_pools);
criterion_main!(benches);
