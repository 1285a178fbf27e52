use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use core_sim::{SimConfig, SimulationController};

const BENCH_TICKS: u64 = 10_000;

fn bench_config() -> SimConfig {
    SimConfig {
        n_ticks: BENCH_TICKS,
        seed: Some(7),
        image_shape: core_sim::ImageShape {
            height: 250,
            width: 10_000,
        },
        ..SimConfig::default()
    }
}

fn bench_controller_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_throughput");
    group.throughput(Throughput::Elements(BENCH_TICKS));

    group.bench_function(BenchmarkId::new("tick", BENCH_TICKS), |b| {
        b.iter(|| {
            let mut controller =
                SimulationController::new(bench_config()).expect("bench config should be valid");
            while let Ok(sample) = controller.tick() {
                black_box(sample);
            }
        });
    });

    group.bench_function(BenchmarkId::new("tick_and_trade", BENCH_TICKS), |b| {
        b.iter(|| {
            let mut controller =
                SimulationController::new(bench_config()).expect("bench config should be valid");
            let mut buy = true;
            while controller.tick().is_ok() {
                let execution = if buy {
                    controller.buy(1)
                } else {
                    controller.sell(1)
                };
                black_box(execution.ok());
                buy = !buy;
            }
            black_box(controller.trade_log().len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_controller_throughput);
criterion_main!(benches);
