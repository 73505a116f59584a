//! Grayscale conversion and byte/scalar transforms.
//!
//! The first step in the pipeline: RGBA bytes in, one luma value per
//! pixel out. Also holds the helpers the stage emitter uses to turn
//! scalar buffers back into displayable RGBA bytes.

use crate::types::ChannelOrder;

/// Luma weight of the red channel.
pub const RED_WEIGHT: f64 = 0.299;
/// Luma weight of the green channel.
pub const GREEN_WEIGHT: f64 = 0.587;
/// Luma weight of the blue channel.
pub const BLUE_WEIGHT: f64 = 0.114;

/// Luma of a single 4-byte pixel, in `[0, 255]`.
///
/// Computed as `0.299 * red + 0.587 * green + 0.114 * blue`, summed in
/// that order, where `order` decides which bytes are red, green and
/// blue.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn luma(pixel: [u8; 4], order: ChannelOrder) -> f64 {
    let [r, g, b] = order.rgb_offsets();
    RED_WEIGHT * f64::from(pixel[r])
        + GREEN_WEIGHT * f64::from(pixel[g])
        + BLUE_WEIGHT * f64::from(pixel[b])
}

/// Convert a packed 4-byte-per-pixel buffer to luma values.
///
/// Returns one value per complete pixel; the alpha byte is ignored.
/// Callers validate that `pixels.len()` is `width * height * 4` before
/// calling (see [`crate::pipeline::Pipeline::new`]).
#[must_use = "returns the luma buffer"]
pub fn to_grayscale(pixels: &[u8], order: ChannelOrder) -> Vec<f64> {
    pixels
        .chunks_exact(4)
        .map(|px| luma([px[0], px[1], px[2], px[3]], order))
        .collect()
}

/// Scale luma values from `[0, 255]` into `[0, 1]` for convolution.
#[must_use = "returns the normalized buffer"]
pub fn normalize(gray: &[f64]) -> Vec<f64> {
    gray.iter().map(|v| v / 255.0).collect()
}

/// Scale `[0, 1]` values back to `[0, 255]` display range.
pub fn denormalize(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().map(|v| v * 255.0)
}

/// Convert a display-range value to a byte.
///
/// Clamps to `[0, 255]` and rounds half to even, matching how canvas
/// clamped byte arrays store floats. Negative derivative responses
/// therefore display as black. NaN maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_byte(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    // In-range after the clamp, so the cast is exact.
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

/// Expand scalar display values into opaque gray RGBA bytes
/// (`[v, v, v, 255]` per value).
#[must_use = "returns the RGBA byte buffer"]
pub fn expand_to_rgba(values: impl IntoIterator<Item = f64>) -> Vec<u8> {
    let values = values.into_iter();
    let mut out = Vec::with_capacity(values.size_hint().0 * 4);
    for value in values {
        let byte = to_byte(value);
        out.extend_from_slice(&[byte, byte, byte, 255]);
    }
    out
}
