//! Performance benchmarks for SHOAL

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shoal::accounting::{Accounting, MortalityCause};
use shoal::scenario::build_domain;
use shoal::scheduler::partition;
use shoal::{Config, MortalityProcess};

fn benchmark_mortality_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("mortality_step");
    group.sample_size(20);

    for workers in [1usize, 2, 4].iter() {
        let mut config = Config::default();
        config.grid.nx = 30;
        config.grid.ny = 30;
        config.parallel.cpu_budget = *workers;
        config.mortality.sub_steps = Some(10);

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut domain = build_domain(&config, &mut rng);
        let mut process = MortalityProcess::from_config(&config, &domain, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, _| {
            let mut step = 0;
            b.iter(|| {
                domain.begin_step();
                process.run(&mut domain, step).unwrap();
                step += 1;
            });
        });
    }

    group.finish();
}

fn benchmark_partition(c: &mut Criterion) {
    let counts: Vec<usize> = (0..10_000).map(|i| (i * 7919) % 13).collect();

    c.bench_function("partition_10k_cells", |b| {
        b.iter(|| partition(black_box(&counts), black_box(8)));
    });
}

fn benchmark_accounting(c: &mut Criterion) {
    c.bench_function("record_death_then_read", |b| {
        let mut acc = Accounting::new(1.0e9, 0.01);
        b.iter(|| {
            acc.record_death(MortalityCause::Starvation, black_box(1.0));
            black_box(acc.instantaneous_abundance())
        });
    });
}

criterion_group!(
    benches,
    benchmark_mortality_step,
    benchmark_partition,
    benchmark_accounting,
);

criterion_main!(benches);
