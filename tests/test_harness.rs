//! Shared helpers for scheduler integration tests: sequential baselines and
//! bounded-time concurrent runs.

#![allow(dead_code)]

use std::time::Duration;

use glb_lite::problems::{QueensBag, QueensResult, TreeBag, TreeResult};
use glb_lite::{Bag, Configuration, GlbRuntime};

/// Hard ceiling on any single scheduler run; a hang here means a termination
/// bug, not a slow machine.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(120);

pub fn test_config(places: usize, workers: usize) -> Configuration {
    Configuration::default()
        .with_places(places)
        .with_workers(workers)
        .with_work_unit_size(63)
}

/// Drain a queens bag on the calling thread, no scheduler involved.
pub fn sequential_queens(n: u8) -> QueensResult {
    let mut bag = QueensBag::new(n);
    let shared = QueensResult::default();
    while !bag.is_empty() {
        bag.process(512, &shared);
    }
    let mut result = QueensResult::default();
    bag.submit(&mut result);
    result
}

/// Drain a tree bag on the calling thread, no scheduler involved.
pub fn sequential_tree(branching: u8, height: u8) -> TreeResult {
    let mut bag = TreeBag::new(branching, height);
    let shared = TreeResult::default();
    while !bag.is_empty() {
        bag.process(512, &shared);
    }
    let mut result = TreeResult::default();
    bag.submit(&mut result);
    result
}

/// Run n-queens through the full scheduler with the given cluster shape.
pub async fn run_queens(config: Configuration, n: u8) -> QueensResult {
    let mut runtime = GlbRuntime::with_config(config).expect("valid test config");
    tokio::time::timeout(
        RUN_TIMEOUT,
        runtime.compute(QueensBag::new(n), move || QueensBag::empty(n)),
    )
    .await
    .expect("computation did not terminate")
    .expect("computation failed")
}

/// Run the synthetic tree through the full scheduler.
pub async fn run_tree(config: Configuration, branching: u8, height: u8) -> TreeResult {
    let mut runtime = GlbRuntime::with_config(config).expect("valid test config");
    tokio::time::timeout(
        RUN_TIMEOUT,
        runtime.compute(TreeBag::new(branching, height), move || {
            TreeBag::empty(branching)
        }),
    )
    .await
    .expect("computation did not terminate")
    .expect("computation failed")
}
