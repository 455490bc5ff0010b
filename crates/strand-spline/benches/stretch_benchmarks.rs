//! Benchmarks for stretch calibration, lookup and recalibration.
//!
//! Run with: cargo bench -p strand-spline

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strand_math::basis::BasisFunctionSet;
use strand_math::shape::{ShapeControl, ShapeControlKind};
use strand_spline::prelude::*;

// =============================================================================
// TEST DATA GENERATORS
// =============================================================================

fn create_nodes(count: usize) -> (Vec<f64>, Vec<f64>) {
    let xs: Vec<f64> = (0..count).map(|k| 0.25 * (k as f64 + 1.0).powf(1.4)).collect();
    let ys = xs.iter().map(|x| 0.03 + 0.02 * (1.0 - (-x / 5.0).exp())).collect();
    (xs, ys)
}

fn cubic_control() -> SegmentControl {
    SegmentControl::new(BasisFunctionSet::polynomial(4).unwrap(), 3).unwrap()
}

fn build_stretch(count: usize, control: SegmentControl, config: StretchConfig) -> Stretch {
    let (xs, ys) = create_nodes(count);
    Stretch::from_nodes("bench", xs, &ys, control, BoundarySettings::Natural, config).unwrap()
}

// =============================================================================
// CALIBRATION BENCHMARKS
// =============================================================================

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");

    for count in [5, 10, 20, 40] {
        let (xs, ys) = create_nodes(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("natural_cubic", count), &count, |b, _| {
            b.iter(|| {
                Stretch::from_nodes(
                    "bench",
                    black_box(xs.clone()),
                    black_box(&ys),
                    cubic_control(),
                    BoundarySettings::Natural,
                    StretchConfig::default().with_sensitivity(false),
                )
                .unwrap()
            });
        });

        group.bench_with_input(
            BenchmarkId::new("natural_cubic_with_sensitivity", count),
            &count,
            |b, _| {
                b.iter(|| {
                    Stretch::from_nodes(
                        "bench",
                        black_box(xs.clone()),
                        black_box(&ys),
                        cubic_control(),
                        BoundarySettings::Natural,
                        StretchConfig::default(),
                    )
                    .unwrap()
                });
            },
        );
    }

    let (xs, ys) = create_nodes(20);
    let shaped = cubic_control()
        .with_shape(ShapeControl::new(ShapeControlKind::RationalQuadratic, 1.0).unwrap());
    group.bench_function("shaped_cubic_20", |b| {
        b.iter(|| {
            Stretch::from_nodes(
                "bench",
                black_box(xs.clone()),
                black_box(&ys),
                shaped.clone(),
                BoundarySettings::Natural,
                StretchConfig::default(),
            )
            .unwrap()
        });
    });

    group.finish();
}

// =============================================================================
// LOOKUP BENCHMARKS
// =============================================================================

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let stretch = build_stretch(40, cubic_control(), StretchConfig::default());
    let (left, right) = (stretch.left_edge(), stretch.right_edge());
    let ordinates: Vec<f64> = (0..1000)
        .map(|k| left + (right - left) * k as f64 / 999.0)
        .collect();

    group.throughput(Throughput::Elements(ordinates.len() as u64));
    group.bench_function("response_value_1000", |b| {
        b.iter(|| {
            ordinates
                .iter()
                .map(|&x| stretch.response_value(black_box(x)).unwrap())
                .sum::<f64>()
        });
    });

    group.bench_function("manifest_jacobian_1000", |b| {
        b.iter(|| {
            for &x in &ordinates {
                black_box(
                    stretch
                        .jack_d_response_d_manifest_measure("Response", x, 0)
                        .unwrap(),
                );
            }
        });
    });

    let one = Arc::new(stretch.clone());
    let two = Arc::new(build_stretch(40, cubic_control(), StretchConfig::default()));
    let span = AggregatedSpan::new(vec![one, two], vec![0.14, 0.71]).unwrap();
    group.bench_function("aggregated_value_1000", |b| {
        b.iter(|| {
            ordinates
                .iter()
                .map(|&x| span.calc_response_value(black_box(x)).unwrap())
                .sum::<f64>()
        });
    });

    group.finish();
}

// =============================================================================
// RECALIBRATION BENCHMARKS
// =============================================================================

fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset_node");
    let stretch = build_stretch(40, cubic_control(), StretchConfig::default());

    for node in [1, 20, 39] {
        group.bench_with_input(BenchmarkId::new("node", node), &node, |b, &node| {
            b.iter_batched(
                || stretch.clone(),
                |mut s| {
                    s.reset_node(node, NodeReset::Response(0.04)).unwrap();
                    s
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_calibration, bench_lookup, bench_reset);
criterion_main!(benches);
