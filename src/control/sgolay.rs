use nalgebra::{DMatrix, Vector3};
use thiserror::Error;
use tracing::warn;

/*
Savitzky-Golay Differentiation
==============================

Estimating velocity by subtracting successive positions amplifies every bit
of jitter in the incoming signal. A Savitzky-Golay filter instead fits a
low-order polynomial to the last `window` samples (least squares) and reads
the derivative off the fitted polynomial, which smooths and differentiates
in one convolution.

Deriving the kernel: build the design matrix

    B[i][j] = (i - h)^j        i = 0..window,  j = 0..=order,  h = (window-1)/2

whose pseudo-inverse maps a window of samples to fitted polynomial
coefficients. Row `d` of the pseudo-inverse, dotted with the window, yields
the coefficient of x^d -- for d = 1 that is exactly the fitted slope per
sample. The kernel is computed once at construction; each new sample is then
a single dot product.

The window is treated as one-sample-spaced: if tick duration varies, the
estimate's units drift with it. Callers that need strict units must divide
by the actual tick length themselves.
*/

#[derive(Debug, Clone, Error)]
pub enum DesignError {
    #[error("window of {window} samples is too small for polynomial order {order}")]
    WindowTooSmall { window: usize, order: usize },
    #[error("filter design matrix is degenerate: {0}")]
    Degenerate(&'static str),
}

/// Fixed-window polynomial differentiator over a scalar stream.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    coeffs: Vec<f64>,
    buffer: Vec<f64>,
    primed: bool,
}

impl SavitzkyGolay {
    /// Design a filter estimating the `deriv`-th derivative from `window`
    /// samples with a degree-`order` fit.
    ///
    /// Even windows are bumped to the next odd size (with a warning); an
    /// order below `deriv + 1` is raised to it. A window smaller than
    /// `order + 2` leaves the fit underdetermined and is rejected.
    pub fn new(window: usize, deriv: usize, order: usize) -> Result<Self, DesignError> {
        let window = if window % 2 == 0 {
            warn!(window, "Savitzky-Golay window must be odd; bumping by one");
            window + 1
        } else {
            window
        };
        let order = order.max(deriv + 1);
        if window < order + 2 {
            return Err(DesignError::WindowTooSmall { window, order });
        }

        let half = ((window - 1) / 2) as f64;
        let basis = DMatrix::from_fn(window, order + 1, |i, j| (i as f64 - half).powi(j as i32));
        let pinv = basis
            .pseudo_inverse(1e-12)
            .map_err(DesignError::Degenerate)?;
        let coeffs: Vec<f64> = pinv.row(deriv).iter().copied().collect();

        Ok(Self {
            coeffs,
            buffer: vec![0.0; window],
            primed: false,
        })
    }

    /// Push a sample and return the current derivative estimate.
    ///
    /// The very first sample is replicated across the whole window so the
    /// output is defined immediately (a flat window differentiates to zero)
    /// instead of being garbage until `window` samples have arrived.
    pub fn feed(&mut self, x: f64) -> f64 {
        if self.primed {
            let n = self.buffer.len();
            self.buffer.copy_within(1.., 0);
            self.buffer[n - 1] = x;
        } else {
            self.buffer.fill(x);
            self.primed = true;
        }
        self.buffer
            .iter()
            .zip(&self.coeffs)
            .map(|(b, c)| b * c)
            .sum()
    }

    /// Forget all history; the next sample re-primes the window.
    pub fn reset(&mut self) {
        self.primed = false;
    }

    pub fn window(&self) -> usize {
        self.buffer.len()
    }
}

/// Three per-axis Savitzky-Golay differentiators forming a 3D velocity
/// estimate from a stream of positions.
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    axes: [SavitzkyGolay; 3],
    velocity: Vector3<f64>,
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        match Self::new(Self::DEFAULT_TAPS) {
            Ok(estimator) => estimator,
            Err(_) => unreachable!("default Savitzky-Golay design is valid"),
        }
    }
}

impl VelocityEstimator {
    pub const DEFAULT_TAPS: usize = 13;
    const ORDER: usize = 3;

    pub fn new(taps: usize) -> Result<Self, DesignError> {
        let axis = SavitzkyGolay::new(taps, 1, Self::ORDER)?;
        Ok(Self {
            axes: [axis.clone(), axis.clone(), axis],
            velocity: Vector3::zeros(),
        })
    }

    /// Feed a position sample; returns the updated velocity estimate in
    /// units-per-tick.
    pub fn feed(&mut self, position: Vector3<f64>) -> Vector3<f64> {
        for (i, axis) in self.axes.iter_mut().enumerate() {
            self.velocity[i] = axis.feed(position[i]);
        }
        self.velocity
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    /// Zero the estimate and restart the windows. Called when a position is
    /// jumped rather than moved, so the teleport does not register as a
    /// huge velocity spike.
    pub fn reset(&mut self) {
        self.velocity = Vector3::zeros();
        for axis in &mut self.axes {
            axis.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_signal_has_zero_derivative() {
        let mut f = SavitzkyGolay::new(13, 1, 3).unwrap();
        for _ in 0..40 {
            let d = f.feed(4.2);
            assert!(d.abs() < 1e-9, "derivative of constant was {d}");
        }
    }

    #[test]
    fn linear_ramp_recovers_slope() {
        let mut f = SavitzkyGolay::new(13, 1, 3).unwrap();
        let mut d = 0.0;
        for i in 0..50 {
            d = f.feed(0.5 * i as f64);
        }
        // A polynomial fit is exact on polynomial input once the window
        // holds only ramp samples.
        assert!((d - 0.5).abs() < 1e-9, "slope estimate was {d}");
    }

    #[test]
    fn first_sample_primes_whole_window() {
        let mut f = SavitzkyGolay::new(5, 1, 2).unwrap();
        // Output must be defined (and zero) from the first sample.
        assert!(f.feed(123.0).abs() < 1e-9);
    }

    #[test]
    fn even_window_is_bumped_to_odd() {
        let f = SavitzkyGolay::new(12, 1, 3).unwrap();
        assert_eq!(f.window(), 13);
    }

    #[test]
    fn undersized_window_is_rejected() {
        assert!(matches!(
            SavitzkyGolay::new(3, 1, 4),
            Err(DesignError::WindowTooSmall { .. })
        ));
    }

    #[test]
    fn reset_forgets_history() {
        let mut f = SavitzkyGolay::new(7, 1, 2).unwrap();
        for i in 0..20 {
            f.feed(i as f64);
        }
        f.reset();
        // Re-primed flat: derivative is zero again.
        assert!(f.feed(100.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_tracks_straight_line_motion() {
        let mut v = VelocityEstimator::new(13).unwrap();
        let mut vel = Vector3::zeros();
        for i in 0..60 {
            let t = i as f64;
            vel = v.feed(Vector3::new(2.0 * t, -1.0 * t, 0.0));
        }
        assert!((vel.x - 2.0).abs() < 1e-8);
        assert!((vel.y + 1.0).abs() < 1e-8);
        assert!(vel.z.abs() < 1e-9);
    }

    #[test]
    fn velocity_reset_zeroes_estimate() {
        let mut v = VelocityEstimator::new(7).unwrap();
        for i in 0..20 {
            v.feed(Vector3::new(i as f64, 0.0, 0.0));
        }
        v.reset();
        assert_eq!(v.velocity(), Vector3::zeros());
    }
}
