use blockc::compile::compile_source;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/programs.blk");

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("pipeline", |b| {
        b.iter(|| {
            let outputs = compile_source(black_box(INPUT));
            black_box(outputs);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
