//! Non-maximum suppression: thin gradient ridges to single-pixel width.
//!
//! Runs on the max-normalized magnitude. Values at or below the lower
//! threshold are discarded first, then two directional sweeps compare
//! each surviving pixel against its neighbors across the ridge:
//!
//! 1. Radius 1: a pixel is zeroed when it is not strictly greater than
//!    both adjacent neighbors.
//! 2. Radius 2: a pixel is zeroed when either neighbor two steps away is
//!    strictly greater.
//!
//! Both sweeps run in raster order and write in place, so later pixels
//! see the already-suppressed values of earlier ones. Pixels within
//! `radius` of the border are left untouched by the corresponding sweep.
//! Finally, values above the upper threshold snap to exactly `1.0`.

use tracing::debug;

use crate::gradient::Direction;
use crate::types::{Dimensions, Thresholds};

/// How a sweep decides that a pixel is not a local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Zero when the pixel is `<=` either neighbor.
    NotGreater,
    /// Zero when either neighbor is `>` the pixel.
    Exceeded,
}

impl Rule {
    fn suppresses(self, value: f64, first: f64, second: f64) -> bool {
        match self {
            Self::NotGreater => value <= first || value <= second,
            Self::Exceeded => first > value || second > value,
        }
    }
}

/// Thin `normalized` magnitudes into edge candidates.
///
/// Returns a buffer where `0.0` is suppressed, `1.0` is a strong edge
/// and values in `(lower, upper]` are weak candidates for
/// [`crate::hysteresis::link`].
///
/// `normalized` and `directions` must both have
/// `dimensions.pixel_count()` entries.
#[must_use = "returns the suppressed buffer"]
pub fn suppress(
    normalized: &[f64],
    directions: &[Direction],
    dimensions: Dimensions,
    thresholds: Thresholds,
) -> Vec<f64> {
    debug_assert_eq!(normalized.len(), dimensions.pixel_count());
    debug_assert_eq!(directions.len(), dimensions.pixel_count());

    let mut candidates = discard_below(normalized, thresholds.lower);
    sweep(&mut candidates, directions, dimensions, 1, Rule::NotGreater);
    sweep(&mut candidates, directions, dimensions, 2, Rule::Exceeded);
    snap_strong(&mut candidates, thresholds.upper);

    debug!(
        candidates = candidates.iter().filter(|&&v| v != 0.0).count(),
        strong = candidates.iter().filter(|&&v| v == 1.0).count(),
        "non-maximum suppression done"
    );
    candidates
}

/// Copy `values`, zeroing everything at or below `lower`.
fn discard_below(values: &[f64], lower: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v <= lower { 0.0 } else { v })
        .collect()
}

/// One in-place directional sweep over pixels at least `radius` from
/// every border.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn sweep(
    values: &mut [f64],
    directions: &[Direction],
    dimensions: Dimensions,
    radius: usize,
    rule: Rule,
) {
    let (w, h) = (dimensions.width_usize(), dimensions.height_usize());
    let r = radius as isize;
    for y in radius..h.saturating_sub(radius) {
        for x in radius..w.saturating_sub(radius) {
            let i = dimensions.index(x, y);
            let value = values[i];
            if value == 0.0 {
                continue;
            }
            let (dx, dy) = directions[i].neighbor_step();
            // In bounds: the loop keeps (x, y) at least `radius` from
            // every border and |dx|, |dy| <= 1.
            let first = dimensions.index(
                (x as isize + dx * r) as usize,
                (y as isize + dy * r) as usize,
            );
            let second = dimensions.index(
                (x as isize - dx * r) as usize,
                (y as isize - dy * r) as usize,
            );
            if rule.suppresses(value, values[first], values[second]) {
                values[i] = 0.0;
            }
        }
    }
}

/// Promote every value above `upper` to a strong edge.
fn snap_strong(values: &mut [f64], upper: f64) {
    for v in values.iter_mut().filter(|v| **v > upper) {
        *v = 1.0;
    }
}
