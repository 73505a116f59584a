//! Hysteresis edge linking.
//!
//! Weak candidates survive only if they connect to a strong edge. Each
//! pass walks the interior in raster order and promotes, in place, any
//! weak pixel that has a strong pixel among its 8 neighbors. Because
//! promotions are visible immediately, a chain extending right or down
//! from a strong pixel can be promoted in a single pass, while one
//! extending left or up advances one pixel per pass.

use tracing::{debug, trace};

use crate::types::{Dimensions, HysteresisMode, Thresholds};

/// Offsets of the 8-connected neighborhood.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Outcome of [`link`].
#[derive(Debug, Clone, PartialEq)]
pub struct Linked {
    /// Final mask; every value is exactly `0.0` or `1.0`.
    pub values: Vec<f64>,
    /// Number of passes run, including a final pass that promoted
    /// nothing.
    pub passes: usize,
    /// Total number of weak pixels promoted across all passes.
    pub promoted: usize,
}

/// Link weak candidates to strong edges and binarize the result.
///
/// `candidates` is the output of [`crate::nms::suppress`]: `1.0` is
/// strong, `0.0` is suppressed, and a nonzero value in
/// `[lower, upper]` is weak. Passes stop early once one promotes
/// nothing. Afterwards every pixel that is not strong becomes `0.0`.
#[must_use = "returns the linked edge mask"]
pub fn link(
    mut candidates: Vec<f64>,
    dimensions: Dimensions,
    thresholds: Thresholds,
    mode: HysteresisMode,
) -> Linked {
    debug_assert_eq!(candidates.len(), dimensions.pixel_count());

    let mut passes = 0;
    let mut promoted = 0;
    loop {
        if let HysteresisMode::FixedPasses(max) = mode
            && passes >= max
        {
            break;
        }
        passes += 1;
        let count = promote_pass(&mut candidates, dimensions, thresholds);
        trace!(pass = passes, promoted = count, "hysteresis pass");
        promoted += count;
        if count == 0 {
            break;
        }
    }

    for v in &mut candidates {
        *v = if *v == 1.0 { 1.0 } else { 0.0 };
    }
    debug!(passes, promoted, ?mode, "hysteresis done");

    Linked {
        values: candidates,
        passes,
        promoted,
    }
}

fn is_weak(value: f64, thresholds: Thresholds) -> bool {
    value != 0.0 && value != 1.0 && (thresholds.lower..=thresholds.upper).contains(&value)
}

/// One raster-order pass over interior pixels. Returns the number of
/// pixels promoted.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn promote_pass(values: &mut [f64], dimensions: Dimensions, thresholds: Thresholds) -> usize {
    let (w, h) = (dimensions.width_usize(), dimensions.height_usize());
    let mut promoted = 0;
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let i = dimensions.index(x, y);
            if !is_weak(values[i], thresholds) {
                continue;
            }
            // Interior pixel, so every neighbor is in bounds.
            let touches_strong = NEIGHBORS.iter().any(|&(dx, dy)| {
                let n = dimensions.index((x as isize + dx) as usize, (y as isize + dy) as usize);
                values[n] == 1.0
            });
            if touches_strong {
                values[i] = 1.0;
                promoted += 1;
            }
        }
    }
    promoted
}
