use crate::control::value::ControlValue;

/// A tension/continuity/bias (Kochanek-Bartels) cubic through control points.
///
/// Evaluable at any fractional parameter in `0..=len-1`; out-of-range
/// parameters clamp to the end points. The default shape `(-0.5, 0, 0)`
/// is the Catmull-Rom curve, which passes through every control point with
/// gentle, symmetric tangents.
///
/// Integer parameters reproduce their control point exactly: at `s == 0` the
/// Hermite basis collapses to `h1 = 1`, all other terms zero.
#[derive(Debug, Clone)]
pub struct CardinalSpline<V: ControlValue> {
    points: Vec<V>,
    tension: f64,
    continuity: f64,
    bias: f64,
}

impl<V: ControlValue> CardinalSpline<V> {
    /// Catmull-Rom spline through `points`.
    pub fn new(points: Vec<V>) -> Self {
        Self::with_shape(points, -0.5, 0.0, 0.0)
    }

    pub fn with_shape(points: Vec<V>, tension: f64, continuity: f64, bias: f64) -> Self {
        debug_assert!(!points.is_empty(), "spline needs at least one point");
        Self {
            points,
            tension,
            continuity,
            bias,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Evaluate at parameter `t`, where each integer lands on a control point.
    pub fn evaluate(&self, t: f64) -> V {
        let n = self.points.len() as isize;
        let s = t - t.floor();
        let p0 = (t.floor() as isize).clamp(0, n - 1) as usize;
        let p1 = ((t.floor() as isize) + 1).clamp(0, n - 1) as usize;

        let s2 = s * s;
        let s3 = s2 * s;
        let h1 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h2 = -2.0 * s3 + 3.0 * s2;
        let h3 = s3 - 2.0 * s2 + s;
        let h4 = s3 - s2;

        let (t_, c, b) = (self.tension, self.continuity, self.bias);
        let pts = &self.points;

        // Incoming tangent: zero at the first point.
        let tan0 = if p0 == 0 {
            V::zero()
        } else {
            let shape1 = (1.0 - t_) * (1.0 - c) * (1.0 + b) * 0.5;
            let shape2 = (1.0 - t_) * (1.0 + c) * (1.0 - b) * 0.5;
            (pts[p0] - pts[p0 - 1]) * shape1 + (pts[p1] - pts[p0]) * shape2
        };

        // Outgoing tangent: zero at the last point.
        let tan1 = if p1 + 1 >= self.points.len() {
            V::zero()
        } else {
            let shape3 = (1.0 - t_) * (1.0 + c) * (1.0 + b) * 0.5;
            let shape4 = (1.0 - t_) * (1.0 - c) * (1.0 - b) * 0.5;
            (pts[p1] - pts[p0]) * shape3 + (pts[p1 + 1] - pts[p1]) * shape4
        };

        pts[p0] * h1 + pts[p1] * h2 + tan0 * h3 + tan1 * h4
    }
}
