//! Threshold resolution: magnitude normalization, adaptive estimation,
//! and clamping of caller-supplied thresholds.
//!
//! Thresholds are expressed on the gradient magnitude normalized by its
//! own maximum, so `1.0` is always the strongest gradient in the image.

use tracing::{debug, warn};

use crate::types::{PipelineError, Thresholds};

/// Estimated lower threshold as a fraction of the estimated upper one.
pub const LOWER_RATIO: f64 = 0.4;

/// A resolved threshold pair and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    /// The pair to apply; `0 <= lower <= upper <= 1`.
    pub thresholds: Thresholds,
    /// `true` when estimated from the magnitude distribution.
    pub estimated: bool,
}

/// Divide every magnitude by the maximum so values fall in `[0, 1]`.
///
/// Every value becomes `m / max`. An all-zero buffer (a flat image) has
/// no maximum to divide by and normalizes to all zeros.
#[must_use = "returns the normalized magnitude"]
pub fn normalize_magnitude(magnitude: &[f64]) -> Vec<f64> {
    let max = magnitude.iter().copied().fold(0.0, f64::max);
    if max == 0.0 || !max.is_finite() {
        debug!(max, "gradient magnitude is flat, no edges possible");
        return vec![0.0; magnitude.len()];
    }
    magnitude.iter().map(|&m| m / max).collect()
}

/// Estimate a threshold pair from a normalized magnitude buffer.
///
/// `upper` is the mean of the nonzero values and `lower` is
/// [`LOWER_RATIO`] × `upper`. An all-zero buffer yields `(0, 0)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate(normalized: &[f64]) -> Thresholds {
    let (sum, count) = normalized
        .iter()
        .filter(|&&v| v != 0.0)
        .fold((0.0, 0_usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        return Thresholds::default();
    }
    let upper = sum / count as f64;
    Thresholds::new(LOWER_RATIO * upper, upper)
}

/// Reject NaN thresholds; everything else is clamped later.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidThreshold`] if `value` is NaN.
pub fn validate(value: Option<f64>, which: &'static str) -> Result<Option<f64>, PipelineError> {
    match value {
        Some(v) if v.is_nan() => Err(PipelineError::InvalidThreshold { which, value: v }),
        other => Ok(other),
    }
}

/// Clamp a caller-supplied pair into `0 <= lower <= upper <= 1`.
///
/// A missing value counts as `0.0`. Each value is clamped to `[0, 1]`
/// independently, then `lower` is lowered to `upper` if it exceeds it.
#[must_use]
pub fn clamp_supplied(lower: Option<f64>, upper: Option<f64>) -> Thresholds {
    let raw_lower = lower.unwrap_or(0.0);
    let raw_upper = upper.unwrap_or(0.0);
    let upper = raw_upper.clamp(0.0, 1.0);
    let lower = raw_lower.clamp(0.0, 1.0).min(upper);
    if lower != raw_lower || upper != raw_upper {
        warn!(raw_lower, raw_upper, lower, upper, "supplied thresholds clamped");
    }
    Thresholds::new(lower, upper)
}

/// Pick the threshold pair for a run.
///
/// Each supplied value is clamped to `[0, 1]` first. When both come out
/// as zero (absent, zero, or negative) the pair is [`estimate`]d from
/// `normalized`; otherwise it goes through [`clamp_supplied`].
#[must_use]
pub fn resolve(lower: Option<f64>, upper: Option<f64>, normalized: &[f64]) -> Resolved {
    let is_zero = |v: Option<f64>| v.map_or(0.0, |v| v.clamp(0.0, 1.0)) == 0.0;
    let resolved = if is_zero(lower) && is_zero(upper) {
        Resolved {
            thresholds: estimate(normalized),
            estimated: true,
        }
    } else {
        Resolved {
            thresholds: clamp_supplied(lower, upper),
            estimated: false,
        }
    };
    debug!(
        lower = resolved.thresholds.lower,
        upper = resolved.thresholds.upper,
        estimated = resolved.estimated,
        "thresholds resolved"
    );
    resolved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn uniform_zero_magnitude_normalizes_to_zero() {
        let normalized = normalize_magnitude(&[0.0; 9]);
        assert_eq!(normalized, vec![0.0; 9]);
    }

    #[test]
    fn tiny_magnitudes_normalize_exactly() {
        let normalized = normalize_magnitude(&[5.5e-17, 0.0, 1.1e-16]);
        assert_eq!(normalized, vec![0.5, 0.0, 1.0]);
    }

    #[test]
    fn non_finite_maximum_normalizes_to_zero() {
        let normalized = normalize_magnitude(&[1.0, f64::INFINITY]);
        assert_eq!(normalized, vec![0.0; 2]);
    }

    #[test]
    fn normalization_divides_by_max() {
        let normalized = normalize_magnitude(&[2.0, 4.0, 1.0, 0.0]);
        assert_eq!(normalized, vec![0.5, 1.0, 0.25, 0.0]);
    }

    #[test]
    fn tiny_values_stay_nonzero_beside_a_large_gradient() {
        let normalized = normalize_magnitude(&[2.0, 1e-15]);
        assert_eq!(normalized, vec![1.0, 5e-16]);
        let thresholds = estimate(&normalized);
        assert!((thresholds.upper - (1.0 + 5e-16) / 2.0).abs() < 1e-15);
    }

    #[test]
    fn uniform_zero_estimates_zero_thresholds() {
        let thresholds = estimate(&normalize_magnitude(&[0.0; 16]));
        assert_eq!(thresholds, Thresholds::new(0.0, 0.0));
    }

    #[test]
    fn uniform_nonzero_estimates_upper_at_that_value() {
        let thresholds = estimate(&normalize_magnitude(&[0.37; 16]));
        assert!((thresholds.upper - 1.0).abs() < f64::EPSILON);
        assert!((thresholds.lower - 0.4 * thresholds.upper).abs() < f64::EPSILON);
    }

    #[test]
    fn uniform_tiny_magnitude_estimates_full_upper() {
        let thresholds = estimate(&normalize_magnitude(&[1e-10; 16]));
        assert_eq!(thresholds, Thresholds::new(0.4, 1.0));
    }

    #[test]
    fn estimate_ignores_zeros_in_the_mean() {
        let thresholds = estimate(&[0.0, 0.0, 0.5, 1.0, 0.0, 0.75]);
        assert!((thresholds.upper - 0.75).abs() < 1e-12);
        assert!((thresholds.lower - 0.3).abs() < 1e-12);
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let err = validate(Some(f64::NAN), "lower").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidThreshold { which: "lower", .. }
        ));
        assert_eq!(validate(Some(0.3), "upper").unwrap(), Some(0.3));
        assert_eq!(validate(None, "upper").unwrap(), None);
    }

    #[test]
    fn out_of_range_thresholds_are_clamped() {
        assert_eq!(
            clamp_supplied(Some(-0.5), Some(2.0)),
            Thresholds::new(0.0, 1.0)
        );
    }

    #[test]
    fn lower_above_upper_is_lowered() {
        assert_eq!(
            clamp_supplied(Some(0.9), Some(0.2)),
            Thresholds::new(0.2, 0.2)
        );
    }

    #[test]
    fn missing_supplied_value_counts_as_zero() {
        assert_eq!(clamp_supplied(None, Some(0.5)), Thresholds::new(0.0, 0.5));
        assert_eq!(clamp_supplied(Some(0.5), None), Thresholds::new(0.0, 0.0));
    }

    #[test]
    fn both_absent_estimates() {
        let resolved = resolve(None, None, &[0.5, 1.0]);
        assert!(resolved.estimated);
        assert!((resolved.thresholds.upper - 0.75).abs() < 1e-12);
    }

    #[test]
    fn both_zero_estimates() {
        let resolved = resolve(Some(0.0), Some(0.0), &[0.5, 1.0]);
        assert!(resolved.estimated);
    }

    #[test]
    fn negative_pair_clamps_to_zero_and_estimates() {
        let resolved = resolve(Some(-0.5), Some(-0.2), &[0.5, 1.0]);
        assert!(resolved.estimated);
        assert!((resolved.thresholds.upper - 0.75).abs() < 1e-12);
        assert!((resolved.thresholds.lower - 0.3).abs() < 1e-12);
    }

    #[test]
    fn lone_lower_is_supplied_then_capped_by_upper() {
        let resolved = resolve(Some(0.5), None, &[0.5, 1.0]);
        assert!(!resolved.estimated);
        assert_eq!(resolved.thresholds, Thresholds::new(0.0, 0.0));
    }

    #[test]
    fn negative_lower_with_upper_is_supplied() {
        let resolved = resolve(Some(-0.5), Some(0.6), &[0.5, 1.0]);
        assert!(!resolved.estimated);
        assert_eq!(resolved.thresholds, Thresholds::new(0.0, 0.6));
    }

    #[test]
    fn one_supplied_uses_supplied_values() {
        let resolved = resolve(None, Some(0.6), &[0.5, 1.0]);
        assert!(!resolved.estimated);
        assert_eq!(resolved.thresholds, Thresholds::new(0.0, 0.6));
    }

    #[test]
    fn supplied_pair_passes_through() {
        let resolved = resolve(Some(0.1), Some(0.3), &[0.5, 1.0]);
        assert!(!resolved.estimated);
        assert_eq!(resolved.thresholds, Thresholds::new(0.1, 0.3));
    }

    proptest! {
        #[test]
        fn supplied_pair_is_always_ordered_and_in_range(
            lower in -3.0..3.0f64,
            upper in -3.0..3.0f64,
        ) {
            let t = clamp_supplied(Some(lower), Some(upper));
            prop_assert!(0.0 <= t.lower && t.lower <= t.upper && t.upper <= 1.0);
        }

        #[test]
        fn estimated_pair_is_always_ordered_and_in_range(
            magnitude in prop::collection::vec(0.0..50.0f64, 1..64),
        ) {
            let t = estimate(&normalize_magnitude(&magnitude));
            prop_assert!(0.0 <= t.lower && t.lower <= t.upper && t.upper <= 1.0 + 1e-12);
        }

        #[test]
        fn normalized_magnitude_is_unit_range(
            magnitude in prop::collection::vec(0.0..50.0f64, 1..64),
        ) {
            for v in normalize_magnitude(&magnitude) {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
