//! Splits a large sum across the pool and collects the partial results
//! through future-holders.
//!
//! Run with: `cargo run --example parallel_sum --release`

use stealpool_rs::{Config, WorkStealingPool};

fn main() {
    let pool = WorkStealingPool::new(Config::new(0, 1024));
    println!("summing on {} workers", pool.worker_count());

    let data: Vec<u64> = (1..=1_000_000).collect();
    let chunk_size = data.len().div_ceil(pool.worker_count());

    let partials: Vec<_> = data
        .chunks(chunk_size)
        .map(|chunk| {
            let chunk = chunk.to_vec();
            pool.submit(move || chunk.iter().sum::<u64>()).unwrap()
        })
        .collect();

    let total: u64 = partials
        .into_iter()
        .map(|partial| partial.wait().unwrap())
        .sum();

    println!("sum of 1..=1000000 = {total}");
    assert_eq!(total, 1_000_000 * 1_000_001 / 2);

    pool.stop();
}
