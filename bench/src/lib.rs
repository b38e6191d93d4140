//! Benchmark utilities for the strata ECS.
//!
//! Provides the fixture component descriptors and world builders shared by
//! the criterion benchmarks in `benches/`.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p strata_bench
//!
//! # Run a specific benchmark group
//! cargo bench -p strata_bench -- query_iter
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

pub mod components;

use strata_engine::ecs::{world, World};

/// Build an initialized world of `capacity` slots over the standard
/// fixture components.
pub fn world(capacity: u32) -> (World, components::Fixtures) {
    let fixtures = components::Fixtures::new();
    let mut world = World::new(world::Spec::new(capacity, fixtures.all())).unwrap();
    world.init().unwrap();
    (world, fixtures)
}
