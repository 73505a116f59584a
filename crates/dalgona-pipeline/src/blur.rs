//! Gaussian blur for noise reduction before edge detection.
//!
//! Smooths the normalized luma with a fixed 5×5 kernel so that
//! high-frequency noise does not produce spurious gradient peaks. The
//! kernel approximates a Gaussian with sigma ≈ 1.4; its weights are
//! fixed rather than derived from a sigma so output is reproducible.

use crate::convolve::{Kernel, convolve};
use crate::types::Dimensions;

/// The 5×5 Gaussian smoothing kernel (radius 2).
pub const GAUSSIAN_5X5: Kernel<5> = Kernel::new([
    [0.0121, 0.0261, 0.0337, 0.0261, 0.0121],
    [0.0261, 0.0561, 0.0724, 0.0561, 0.0261],
    [0.0337, 0.0724, 0.0935, 0.0724, 0.0337],
    [0.0261, 0.0561, 0.0724, 0.0561, 0.0261],
    [0.0121, 0.0261, 0.0337, 0.0261, 0.0121],
]);

/// Apply the 5×5 Gaussian kernel to a normalized image.
///
/// Borders wrap toroidally (see [`crate::convolve`]).
#[must_use = "returns the blurred buffer"]
pub fn gaussian_blur(normalized: &[f64], dimensions: Dimensions) -> Vec<f64> {
    convolve(&GAUSSIAN_5X5, normalized, dimensions)
}
