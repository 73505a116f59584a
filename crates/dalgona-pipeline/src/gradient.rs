//! Intensity gradients: derivative kernels, magnitude and quantized
//! direction.
//!
//! Both derivative kernels go through [`convolve`], which indexes
//! weights as `[kx][ky]`. With that indexing the "horizontal" kernel
//! responds to intensity changes along y and the "vertical" kernel to
//! changes along x. The direction is taken as `atan2(gx, gy)` (x-then-y
//! operand order) which swaps them back: a vertical boundary gets
//! direction [`Direction::Deg0`] and is thinned against its left and
//! right neighbors.

use std::f64::consts::PI;

use crate::convolve::{Kernel, convolve};
use crate::types::Dimensions;

/// Horizontal derivative kernel (radius 1).
pub const X_DERIVATIVE_3X3: Kernel<3> =
    Kernel::new([[1.0, 0.0, -1.0], [2.0, 0.0, -2.0], [1.0, 0.0, -1.0]]);

/// Vertical derivative kernel (radius 1).
pub const Y_DERIVATIVE_3X3: Kernel<3> =
    Kernel::new([[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]]);

/// Gradient magnitudes at or below this are flushed to exactly zero.
///
/// The derivative weights cancel on a flat region only up to round-off
/// (around 1e-17), while the faintest real gradient an 8-bit input can
/// produce after blurring is around 1e-5.
pub const ROUND_OFF_FLOOR: f64 = 1e-9;

const EIGHTH: f64 = PI / 8.0;
const THREE_EIGHTHS: f64 = 3.0 * PI / 8.0;
const FIVE_EIGHTHS: f64 = 5.0 * PI / 8.0;
const SEVEN_EIGHTHS: f64 = 7.0 * PI / 8.0;

/// Gradient direction quantized to four 45°-spaced orientations.
///
/// Each variant covers a ±22.5° band around its angle and the opposite
/// band 180° away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 0 rad; compared against `(x - 1, y)` and `(x + 1, y)`.
    Deg0,
    /// π/4 rad; compared against `(x - 1, y + 1)` and `(x + 1, y - 1)`.
    Deg45,
    /// π/2 rad; compared against `(x, y - 1)` and `(x, y + 1)`.
    Deg90,
    /// −π/4 rad; compared against `(x - 1, y - 1)` and `(x + 1, y + 1)`.
    DegNeg45,
}

impl Direction {
    /// Quantize an angle in `[-π, π]`.
    ///
    /// Bands are closed or open at their edges exactly as listed:
    ///
    /// | Direction | Bands |
    /// |---|---|
    /// | `Deg0` | `[-π/8, π/8)`, `(7π/8, π]`, `[-π, -7π/8]` |
    /// | `Deg45` | `[π/8, 3π/8)`, `(-7π/8, -5π/8]` |
    /// | `Deg90` | `[3π/8, 5π/8]`, `(-5π/8, -3π/8]` |
    /// | `DegNeg45` | `(5π/8, 7π/8]`, `(-3π/8, -π/8)` |
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        if (-EIGHTH..EIGHTH).contains(&angle) {
            Self::Deg0
        } else if (EIGHTH..THREE_EIGHTHS).contains(&angle)
            || (angle > -SEVEN_EIGHTHS && angle <= -FIVE_EIGHTHS)
        {
            Self::Deg45
        } else if (THREE_EIGHTHS..=FIVE_EIGHTHS).contains(&angle)
            || (angle > -FIVE_EIGHTHS && angle <= -THREE_EIGHTHS)
        {
            Self::Deg90
        } else if (angle > FIVE_EIGHTHS && angle <= SEVEN_EIGHTHS)
            || (angle > -THREE_EIGHTHS && angle < -EIGHTH)
        {
            Self::DegNeg45
        } else {
            // |angle| beyond 7π/8 folds back onto the 0 band.
            Self::Deg0
        }
    }

    /// Quantized direction of the gradient `(gx, gy)`, from
    /// `atan2(gx, gy)`.
    #[must_use]
    pub fn from_gradient(gx: f64, gy: f64) -> Self {
        Self::from_angle(gx.atan2(gy))
    }

    /// Representative angle in radians.
    #[must_use]
    pub const fn angle(self) -> f64 {
        match self {
            Self::Deg0 => 0.0,
            Self::Deg45 => PI / 4.0,
            Self::Deg90 => PI / 2.0,
            Self::DegNeg45 => -PI / 4.0,
        }
    }

    /// Unit `(dx, dy)` step to the first compared neighbor. The second
    /// neighbor sits at the negated step.
    #[must_use]
    pub const fn neighbor_step(self) -> (isize, isize) {
        match self {
            Self::Deg0 => (-1, 0),
            Self::Deg45 => (-1, 1),
            Self::Deg90 => (0, -1),
            Self::DegNeg45 => (-1, -1),
        }
    }
}

/// Per-pixel gradient magnitude and quantized direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// `sqrt(gx² + gy²)` per pixel (not yet normalized).
    pub magnitude: Vec<f64>,
    /// Quantized direction per pixel.
    pub direction: Vec<Direction>,
}

/// Convolve the blurred image with [`X_DERIVATIVE_3X3`].
#[must_use = "returns the derivative buffer"]
pub fn x_derivative(blurred: &[f64], dimensions: Dimensions) -> Vec<f64> {
    convolve(&X_DERIVATIVE_3X3, blurred, dimensions)
}

/// Convolve the blurred image with [`Y_DERIVATIVE_3X3`].
#[must_use = "returns the derivative buffer"]
pub fn y_derivative(blurred: &[f64], dimensions: Dimensions) -> Vec<f64> {
    convolve(&Y_DERIVATIVE_3X3, blurred, dimensions)
}

/// Combine derivative buffers into magnitude and direction.
///
/// `gx` and `gy` must have equal length. Magnitudes at or below
/// [`ROUND_OFF_FLOOR`] come out as exactly `0.0`.
#[must_use = "returns the gradient"]
// `gx * gx + gy * gy` rather than `mul_add`/`hypot` to keep results
// reproducible across platforms.
#[allow(clippy::suboptimal_flops)]
pub fn gradient(gx: &[f64], gy: &[f64]) -> Gradient {
    debug_assert_eq!(gx.len(), gy.len());
    let (magnitude, direction) = gx
        .iter()
        .zip(gy)
        .map(|(&x, &y)| {
            let magnitude = (x * x + y * y).sqrt();
            let magnitude = if magnitude <= ROUND_OFF_FLOOR {
                0.0
            } else {
                magnitude
            };
            (magnitude, Direction::from_gradient(x, y))
        })
        .unzip();
    Gradient {
        magnitude,
        direction,
    }
}
