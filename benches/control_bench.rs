//! Benchmarks for the control-rate primitives.
//!
//! Run with: cargo bench
//!
//! The engine advances every automation, smoother and burst once per server
//! tick (typically 100 Hz), so the numbers that matter here are per-tick
//! costs across realistic entity counts, not per-sample audio deadlines.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use soundfield::automation::source::Sine;
use soundfield::automation::{attr, Automation, AutomationGroup, AutomationSource};
use soundfield::burst::{BurstEmitter, EmissionProfile};
use soundfield::control::sgolay::VelocityEstimator;
use soundfield::control::spline::CardinalSpline;
use soundfield::control::{Smoothed, Value};

fn bench_smoothed(c: &mut Criterion) {
    c.bench_function("smoothed/advance_vector", |b| {
        let mut v = Smoothed::new(Vector3::new(0.0, 0.0, 0.0), 0.5);
        v.set(Vector3::new(1.0, 2.0, 3.0), 0.5);
        b.iter(|| {
            v.advance(black_box(0.01));
            black_box(v.state())
        });
    });
}

fn bench_spline(c: &mut Criterion) {
    let points: Vec<Value> = (0..16)
        .map(|i| Value::vec3(i as f64, (i * i) as f64, 0.0))
        .collect();
    let spline = CardinalSpline::new(points);
    c.bench_function("spline/evaluate", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 0.37) % 15.0;
            black_box(spline.evaluate(black_box(t)))
        });
    });
}

fn bench_velocity(c: &mut Criterion) {
    c.bench_function("sgolay/velocity_feed", |b| {
        let mut estimator = VelocityEstimator::new(13).unwrap();
        let mut t = 0.0;
        b.iter(|| {
            t += 0.01;
            black_box(estimator.feed(Vector3::new(t, t * 2.0, -t)))
        });
    });
}

fn bench_group(c: &mut Criterion) {
    c.bench_function("automation/group_of_8", |b| {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut group = AutomationGroup::new();
        for i in 0..8 {
            let template = Automation::new(
                format!("osc{i}"),
                attr::GAIN,
                AutomationSource::Sine(Sine::new(
                    Value::Scalar(0.1 * (i + 1) as f64),
                    Value::Scalar(-6.0),
                    Value::Scalar(0.0),
                    0.0,
                )),
            );
            group.attach(format!("a{i}"), &template);
        }
        b.iter(|| {
            group.tick(black_box(0.01), &mut rng);
            black_box(group.get(attr::GAIN))
        });
    });
}

fn bench_burst(c: &mut Criterion) {
    c.bench_function("burst/tick", |b| {
        let mut rng = SmallRng::seed_from_u64(7);
        let profile = EmissionProfile {
            rate: 0.5,
            gain_lo: -30.0,
            gain_hi: -10.0,
        };
        let mut burst = BurstEmitter::new(
            "bench",
            "pool",
            (0.3, 0.3),
            [profile, profile],
            (Vector3::new(-5.0, 0.0, -5.0), Vector3::new(5.0, 3.0, 5.0)),
        );
        burst.set_enabled(true);
        b.iter(|| black_box(burst.tick(black_box(0.01), &mut rng)));
    });
}

criterion_group!(
    benches,
    bench_smoothed,
    bench_spline,
    bench_velocity,
    bench_group,
    bench_burst,
);
criterion_main!(benches);
