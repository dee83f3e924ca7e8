//! Simulation benchmarks for dune_core.
//!
//! Run with: `cargo bench -p dune_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dune_core::ai::Difficulty;
use dune_test_utils::fixtures::{ai_skirmish, DEFAULT_SEED};

/// Two QuantBots building and fighting on the 64x64 skirmish map.
pub fn simulation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ai_skirmish");
    group.sample_size(20);

    group.bench_function("first_500_ticks", |b| {
        b.iter_batched(
            || ai_skirmish(DEFAULT_SEED, Difficulty::Brutal),
            |mut game| {
                game.run_ticks(500);
                black_box(game.state_hash())
            },
            BatchSize::LargeInput,
        );
    });

    // A grown-up game: bases built, armies on the map.
    let mut developed = ai_skirmish(DEFAULT_SEED, Difficulty::Brutal);
    developed.run_ticks(6000);
    group.bench_function("tick_after_6000", |b| {
        b.iter_batched(
            || developed.clone(),
            |mut game| {
                game.advance_tick();
                black_box(game.state_hash())
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("save_after_6000", |b| {
        b.iter(|| black_box(developed.save()));
    });

    group.finish();
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
