use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use phold::ConfigBuilder;
use phold::rng::Lcg;
use phold::tree;
use std::hint::black_box;

fn tree_arithmetic(c: &mut Criterion) {
    c.bench_function("tree_depth_walk", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for i in 0..black_box(10_000usize) {
                acc = acc.wrapping_add(tree::depth(i));
            }
            acc
        })
    });
}

fn rng_draws(c: &mut Criterion) {
    c.bench_function("rng_exponential_draws", |b| {
        let mut rng = Lcg::for_lp(1);
        b.iter(|| black_box(rng.exponential(9.0)))
    });
}

fn end_to_end_small_run(c: &mut Criterion) {
    let cfg = ConfigBuilder::new()
        .number(16)
        .events(4)
        .remote(0.5)
        .minimum(1)
        .average(9.0)
        .stop(10_000)
        .partitions(1)
        .build()
        .expect("benchmark configuration is valid");

    c.bench_function("end_to_end_small_run", |b| {
        b.iter(|| phold::run(black_box(&cfg)).expect("run succeeds"))
    });
}

criterion_group!(benches, tree_arithmetic, rng_draws, end_to_end_small_run);
criterion_main!(benches);
