use std::f64::consts::TAU;

use rand::Rng;

use crate::control::{
    spline::CardinalSpline,
    value::{ControlValue, Value},
    Smoothed,
};

/// One signal-producing behavior, resolved to a concrete variant at
/// construction time. Update logic pattern-matches on the variant; there is
/// no runtime type lookup.
#[derive(Debug, Clone)]
pub enum AutomationSource {
    Sine(Sine),
    Spline(SplineTrack),
    RandomWalk(RandomWalk),
}

impl AutomationSource {
    pub fn advance(&mut self, dt: f64, rng: &mut impl Rng) {
        match self {
            AutomationSource::Sine(s) => s.advance(dt),
            AutomationSource::Spline(s) => s.advance(dt),
            AutomationSource::RandomWalk(w) => w.advance(dt, rng),
        }
    }

    pub fn output(&self) -> Value {
        match self {
            AutomationSource::Sine(s) => s.output(),
            AutomationSource::Spline(s) => s.output(),
            AutomationSource::RandomWalk(w) => w.output(),
        }
    }
}

/// Oscillates between `lo` and `hi` at `frequency` Hz (componentwise).
#[derive(Debug, Clone)]
pub struct Sine {
    frequency: Value,
    lo: Value,
    hi: Value,
    phase: f64,
    state: Value,
}

impl Sine {
    pub fn new(frequency: Value, lo: Value, hi: Value, phase: f64) -> Self {
        Self {
            frequency,
            lo,
            hi,
            phase,
            // Shaped like the range so vector sines start as vectors.
            state: lo * 0.0,
        }
    }

    fn advance(&mut self, dt: f64) {
        self.phase += dt * TAU;
        let phase = self.phase;
        let swing = self
            .frequency
            .map(|f| (phase * f).sin())
            .component_mul(self.hi - self.lo);
        self.state = swing + (self.lo + self.hi) * 0.5;
    }

    fn output(&self) -> Value {
        self.state
    }
}

/// Traverses a cardinal spline at `rate` control points per second,
/// optionally looping back to the start after the final point.
#[derive(Debug, Clone)]
pub struct SplineTrack {
    curve: CardinalSpline<Value>,
    rate: f64,
    looping: bool,
    phase: f64,
    state: Value,
}

impl SplineTrack {
    pub fn new(curve: CardinalSpline<Value>, rate: f64, looping: bool) -> Self {
        Self {
            curve,
            rate,
            looping,
            phase: 0.0,
            state: Value::zero(),
        }
    }

    fn advance(&mut self, dt: f64) {
        self.phase += self.rate * dt;
        self.state = self.curve.evaluate(self.phase);
        // Non-looping tracks hold at the end via the evaluator's clamp.
        if self.looping && self.phase >= self.curve.len() as f64 {
            self.phase = 0.0;
        }
    }

    fn output(&self) -> Value {
        self.state
    }
}

/// Wanders between uniformly random targets inside a range, re-aiming when
/// it gets within 1% (of total range span) of the current target. The
/// approach time scales with jump distance, keeping apparent speed roughly
/// constant regardless of how far each hop goes.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    lo: Value,
    hi: Value,
    rate: f64,
    threshold: f64,
    span: f64,
    val: Smoothed<Value>,
}

impl RandomWalk {
    pub fn new(lo: Value, hi: Value, rate: f64, rng: &mut impl Rng) -> Self {
        let span = (lo - hi).abs_sum();
        let start = uniform_between(lo, hi, rng);
        Self {
            lo,
            hi,
            rate,
            threshold: span / 100.0,
            span,
            val: Smoothed::new(start, 0.0),
        }
    }

    fn advance(&mut self, dt: f64, rng: &mut impl Rng) {
        self.val.advance(dt);
        if (self.val.state() - self.val.target()).abs_sum() <= self.threshold {
            let next = uniform_between(self.lo, self.hi, rng);
            let time = if self.span > 0.0 {
                (next - self.val.state()).abs_sum() / self.span * self.rate
            } else {
                0.0
            };
            self.val.set(next, time);
        }
    }

    fn output(&self) -> Value {
        self.val.state()
    }
}

/// Uniform sample between two bounds, broadcasting a scalar bound across a
/// vector one.
fn uniform_between(lo: Value, hi: Value, rng: &mut impl Rng) -> Value {
    match (lo, hi) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(uniform_axis(rng, a, b)),
        (a, b) => {
            let a = a.offset_vec3(nalgebra::Vector3::zeros());
            let b = b.offset_vec3(nalgebra::Vector3::zeros());
            Value::Vec3(nalgebra::Vector3::new(
                uniform_axis(rng, a.x, b.x),
                uniform_axis(rng, a.y, b.y),
                uniform_axis(rng, a.z, b.z),
            ))
        }
    }
}

pub(crate) fn uniform_axis(rng: &mut impl Rng, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}
