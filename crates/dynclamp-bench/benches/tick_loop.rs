//! Criterion benchmarks for the per-tick protocol and whole free-running trials.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynclamp_bench::{closed_loop_profile, BENCH_DT};
use dynclamp_core::SimClock;
use dynclamp_engine::{Simulator, TrialConfig};

fn bench_tick_10_cells(c: &mut Criterion) {
    let mut graph = closed_loop_profile(10, 42).unwrap();
    let mut clock = SimClock::new(BENCH_DT);

    // Warm up: the first step takes the first_step path.
    graph.process_events(&clock);
    graph.read_inputs();
    clock.advance();
    graph.step_all(&clock, true).unwrap();

    c.bench_function("tick_10_cells", |b| {
        b.iter(|| {
            let outcome = graph.process_events(&clock);
            graph.read_inputs();
            clock.advance();
            graph.step_all(&clock, false).unwrap();
            black_box(&outcome);
        });
    });
}

fn bench_tick_100_cells(c: &mut Criterion) {
    let mut graph = closed_loop_profile(100, 42).unwrap();
    let mut clock = SimClock::new(BENCH_DT);

    graph.process_events(&clock);
    graph.read_inputs();
    clock.advance();
    graph.step_all(&clock, true).unwrap();

    c.bench_function("tick_100_cells", |b| {
        b.iter(|| {
            let outcome = graph.process_events(&clock);
            graph.read_inputs();
            clock.advance();
            graph.step_all(&clock, false).unwrap();
            black_box(&outcome);
        });
    });
}

fn bench_trial_100ms_10_cells(c: &mut Criterion) {
    let mut graph = closed_loop_profile(10, 42).unwrap();
    let mut sim = Simulator::new(TrialConfig::new(0.1, BENCH_DT)).unwrap();

    c.bench_function("trial_100ms_10_cells", |b| {
        b.iter(|| {
            let report = sim.run(&mut graph);
            assert!(report.status.is_success());
            black_box(report.ticks);
        });
    });
}

criterion_group!(
    benches,
    bench_tick_10_cells,
    bench_tick_100_cells,
    bench_trial_100ms_10_cells
);
criterion_main!(benches);
