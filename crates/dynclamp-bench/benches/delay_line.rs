//! Criterion benchmarks for delay connections under sustained traffic.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynclamp_bench::{delay_line_profile, BENCH_DT};
use dynclamp_engine::{Simulator, TrialConfig};

fn bench_fan_out_32_lines(c: &mut Criterion) {
    let mut graph = delay_line_profile(32, 7).unwrap();
    let mut sim = Simulator::new(TrialConfig::new(0.05, BENCH_DT)).unwrap();

    c.bench_function("fan_out_32_lines_50ms", |b| {
        b.iter(|| {
            let report = sim.run(&mut graph);
            black_box(report.ticks);
        });
    });
}

criterion_group!(benches, bench_fan_out_32_lines);
criterion_main!(benches);
