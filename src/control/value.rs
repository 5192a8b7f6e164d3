use std::ops::{Add, Mul, Sub};

use nalgebra::Vector3;

/// Arithmetic shared by every value a control signal can carry.
///
/// Implemented for plain `f64`, for `Vector3<f64>`, and for the dynamic
/// [`Value`] sum type. Smoothing and spline evaluation are written against
/// this trait so the same code drives a mono gain and a 3D position.
pub trait ControlValue:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
    fn zero() -> Self;

    /// Sum of absolute components. Used as the distance norm for target
    /// proximity checks; for scalars this is just `abs()`.
    fn abs_sum(self) -> f64;
}

impl ControlValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn abs_sum(self) -> f64 {
        self.abs()
    }
}

impl ControlValue for Vector3<f64> {
    fn zero() -> Self {
        Vector3::zeros()
    }

    fn abs_sum(self) -> f64 {
        self.abs().sum()
    }
}

/// A control value whose dimension is decided by configuration, not code.
///
/// Automation attributes come in two shapes: scalars (gain, cutoff, pitch)
/// and 3-vectors (position). Arithmetic between mixed shapes broadcasts the
/// scalar across the vector, so a scalar automation can offset a position
/// attribute and an attribute sum can start from `Value::zero()` regardless
/// of what gets added into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vec3(Vector3<f64>),
}

impl Value {
    pub fn vec3(x: f64, y: f64, z: f64) -> Self {
        Value::Vec3(Vector3::new(x, y, z))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    /// Scalar view of this value. Vector values fall back to their first
    /// component; configuration validation keeps vectors out of the places
    /// where that would matter (time modulation, scalar attributes).
    pub fn scalar(self) -> f64 {
        match self {
            Value::Scalar(s) => s,
            Value::Vec3(v) => v.x,
        }
    }

    /// Offset a vector base by this value, broadcasting scalars.
    pub fn offset_vec3(self, base: Vector3<f64>) -> Vector3<f64> {
        match self {
            Value::Scalar(s) => base.add_scalar(s),
            Value::Vec3(v) => base + v,
        }
    }

    /// Apply `f` to every component.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(s) => Value::Scalar(f(s)),
            Value::Vec3(v) => Value::Vec3(v.map(f)),
        }
    }

    /// Componentwise product, broadcasting scalars.
    pub fn component_mul(self, other: Value) -> Value {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a * b),
            (Value::Scalar(a), Value::Vec3(b)) => Value::Vec3(b * a),
            (Value::Vec3(a), Value::Scalar(b)) => Value::Vec3(a * b),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(a.component_mul(&b)),
        }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, other: Value) -> Value {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a + b),
            (Value::Scalar(a), Value::Vec3(b)) => Value::Vec3(b.add_scalar(a)),
            (Value::Vec3(a), Value::Scalar(b)) => Value::Vec3(a.add_scalar(b)),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(a + b),
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, other: Value) -> Value {
        self + other * -1.0
    }
}

impl Mul<f64> for Value {
    type Output = Value;

    fn mul(self, k: f64) -> Value {
        self.map(|c| c * k)
    }
}

impl ControlValue for Value {
    fn zero() -> Self {
        Value::Scalar(0.0)
    }

    fn abs_sum(self) -> f64 {
        match self {
            Value::Scalar(s) => s.abs(),
            Value::Vec3(v) => v.abs().sum(),
        }
    }
}

impl From<f64> for Value {
    fn from(s: f64) -> Self {
        Value::Scalar(s)
    }
}

impl From<Vector3<f64>> for Value {
    fn from(v: Vector3<f64>) -> Self {
        Value::Vec3(v)
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Vec3(Vector3::from(v))
    }
}
