//! The classic diamond: one node fans out to two, which join back into one.
//!
//! Run with: `cargo run --example diamond`

use stealpool_graph::{Scheduler, TaskGraph};
use stealpool_rs::{Config, WorkStealingPool};

fn main() {
    let pool = WorkStealingPool::new(Config::new(4, 256));
    let scheduler = Scheduler::new(pool.handle());

    let mut graph = TaskGraph::new();
    let fetch = graph.add_task(|| println!("fetch: loading input"));
    let parse = graph.add_task(|| println!("parse: building records"));
    let validate = graph.add_task(|| println!("validate: checking records"));
    let report = graph.add_task(|| println!("report: writing summary"));

    graph.add_dependency(fetch, parse);
    graph.add_dependency(fetch, validate);
    graph.add_dependency(parse, report);
    graph.add_dependency(validate, report);

    scheduler.execute(graph).wait().unwrap();
    pool.stop();
}
