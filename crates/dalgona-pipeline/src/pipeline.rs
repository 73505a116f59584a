//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect`] which runs the whole detector in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use dalgona_pipeline::{DetectConfig, Dimensions, Pipeline, PipelineError};
//! # fn run(pixels: &[u8]) -> Result<(), PipelineError> {
//! let detection = Pipeline::new(pixels, Dimensions::new(5, 5), DetectConfig::default())?
//!     .grayscale()
//!     .normalize()
//!     .blur()
//!     .derive_x()
//!     .derive_y()
//!     .gradient()
//!     .resolve_thresholds()
//!     .suppress()
//!     .link()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! All validation happens in [`Pipeline::new`]; every later transition
//! is infallible. Each stage method consumes `self` and returns the next
//! state, carrying forward only the buffers later stages read. Stages
//! that report progress expose an [`event`](Grayscaled::event) for the
//! [`crate::stage`] callback and every stage past [`Pending`] exposes
//! [`metrics`](Grayscaled::metrics) for [`crate::diagnostics`].

use tracing::debug;

use crate::diagnostics::{StageMetrics, value_range};
use crate::gradient::{Direction, Gradient};
use crate::hysteresis::Linked as LinkOutcome;
use crate::stage::{Stage, StageEvent};
use crate::threshold::{self, Resolved};
use crate::types::{DetectConfig, Detection, Dimensions, EdgeMask, PipelineError, Thresholds};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state after validation, before any processing.
///
/// Call [`grayscale`](Self::grayscale) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Pending<'a> {
    config: DetectConfig,
    dimensions: Dimensions,
    pixels: &'a [u8],
}

impl Pending<'_> {
    /// The caller's pixel bytes.
    #[must_use]
    pub const fn pixels(&self) -> &[u8] {
        self.pixels
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Convert the pixels to luma and advance to [`Grayscaled`].
    pub fn grayscale(self) -> Grayscaled {
        let gray = crate::grayscale::to_grayscale(self.pixels, self.config.channel_order);
        debug!(
            width = self.dimensions.width,
            height = self.dimensions.height,
            channel_order = ?self.config.channel_order,
            "grayscale"
        );
        Grayscaled {
            config: self.config,
            dimensions: self.dimensions,
            gray,
        }
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after luma conversion.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Grayscaled {
    config: DetectConfig,
    dimensions: Dimensions,
    gray: Vec<f64>,
}

impl Grayscaled {
    /// Luma per pixel, in `[0, 255]`.
    #[must_use]
    pub fn gray(&self) -> &[f64] {
        &self.gray
    }

    /// The [`Stage::Grayscale`] progress event.
    #[must_use]
    pub fn event(&self) -> StageEvent {
        StageEvent::from_display(Stage::Grayscale, &self.gray)
    }

    /// Metrics for the grayscale conversion.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.dimensions.width,
            height: self.dimensions.height,
            channel_order: self.config.channel_order,
        }
    }

    /// Scale luma to `[0, 1]` and advance to [`Normalized`].
    pub fn normalize(self) -> Normalized {
        let normalized = crate::grayscale::normalize(&self.gray);
        Normalized {
            config: self.config,
            dimensions: self.dimensions,
            normalized,
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after scaling luma to `[0, 1]`.
#[must_use = "pipeline stages are consumed by advancing; call .blur() to continue"]
pub struct Normalized {
    config: DetectConfig,
    dimensions: Dimensions,
    normalized: Vec<f64>,
}

impl Normalized {
    /// Luma per pixel, in `[0, 1]`.
    #[must_use]
    pub fn normalized(&self) -> &[f64] {
        &self.normalized
    }

    /// The [`Stage::Normalized`] progress event (no payload).
    #[must_use]
    pub const fn event(&self) -> StageEvent {
        StageEvent::signal(Stage::Normalized)
    }

    /// Metrics for the normalization step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = value_range(&self.normalized);
        StageMetrics::Normalize { min, max }
    }

    /// Smooth with the 5×5 Gaussian and advance to [`Blurred`].
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::gaussian_blur(&self.normalized, self.dimensions);
        debug!("gaussian blur");
        Blurred {
            config: self.config,
            dimensions: self.dimensions,
            blurred,
        }
    }
}

// ───────────────────────── Stage 3: Blurred ──────────────────────────

/// Pipeline state after Gaussian smoothing.
#[must_use = "pipeline stages are consumed by advancing; call .derive_x() to continue"]
pub struct Blurred {
    config: DetectConfig,
    dimensions: Dimensions,
    blurred: Vec<f64>,
}

impl Blurred {
    /// Smoothed luma per pixel.
    #[must_use]
    pub fn blurred(&self) -> &[f64] {
        &self.blurred
    }

    /// The [`Stage::Blurred`] progress event.
    #[must_use]
    pub fn event(&self) -> StageEvent {
        StageEvent::from_normalized(Stage::Blurred, &self.blurred)
    }

    /// Metrics for the blur.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Blur {
            kernel_size: crate::blur::GAUSSIAN_5X5.size(),
        }
    }

    /// Apply the horizontal derivative kernel and advance to
    /// [`XDerived`].
    pub fn derive_x(self) -> XDerived {
        let gx = crate::gradient::x_derivative(&self.blurred, self.dimensions);
        debug!("x derivative");
        XDerived {
            config: self.config,
            dimensions: self.dimensions,
            blurred: self.blurred,
            gx,
        }
    }
}

// ───────────────────────── Stage 4: XDerived ─────────────────────────

/// Pipeline state after the horizontal derivative.
#[must_use = "pipeline stages are consumed by advancing; call .derive_y() to continue"]
pub struct XDerived {
    config: DetectConfig,
    dimensions: Dimensions,
    blurred: Vec<f64>,
    gx: Vec<f64>,
}

impl XDerived {
    /// Horizontal derivative response per pixel.
    #[must_use]
    pub fn gx(&self) -> &[f64] {
        &self.gx
    }

    /// The [`Stage::XAxis`] progress event.
    #[must_use]
    pub fn event(&self) -> StageEvent {
        StageEvent::from_normalized(Stage::XAxis, &self.gx)
    }

    /// Metrics for the horizontal derivative.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = value_range(&self.gx);
        StageMetrics::Derivative { min, max }
    }

    /// Apply the vertical derivative kernel and advance to [`Derived`].
    pub fn derive_y(self) -> Derived {
        let gy = crate::gradient::y_derivative(&self.blurred, self.dimensions);
        debug!("y derivative");
        Derived {
            config: self.config,
            dimensions: self.dimensions,
            gx: self.gx,
            gy,
        }
    }
}

// ───────────────────────── Stage 5: Derived ──────────────────────────

/// Pipeline state after both derivatives.
#[must_use = "pipeline stages are consumed by advancing; call .gradient() to continue"]
pub struct Derived {
    config: DetectConfig,
    dimensions: Dimensions,
    gx: Vec<f64>,
    gy: Vec<f64>,
}

impl Derived {
    /// Horizontal derivative response per pixel.
    #[must_use]
    pub fn gx(&self) -> &[f64] {
        &self.gx
    }

    /// Vertical derivative response per pixel.
    #[must_use]
    pub fn gy(&self) -> &[f64] {
        &self.gy
    }

    /// The [`Stage::YAxis`] progress event.
    #[must_use]
    pub fn event(&self) -> StageEvent {
        StageEvent::from_normalized(Stage::YAxis, &self.gy)
    }

    /// Metrics for the vertical derivative.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = value_range(&self.gy);
        StageMetrics::Derivative { min, max }
    }

    /// Combine the derivatives into magnitude and direction and advance
    /// to [`GradientComputed`].
    pub fn gradient(self) -> GradientComputed {
        let gradient = crate::gradient::gradient(&self.gx, &self.gy);
        GradientComputed {
            config: self.config,
            dimensions: self.dimensions,
            gradient,
        }
    }
}

// ───────────────────────── Stage 6: GradientComputed ─────────────────

/// Pipeline state after computing gradient magnitude and direction.
#[must_use = "pipeline stages are consumed by advancing; call .resolve_thresholds() to continue"]
pub struct GradientComputed {
    config: DetectConfig,
    dimensions: Dimensions,
    gradient: Gradient,
}

impl GradientComputed {
    /// Raw magnitude and quantized direction per pixel.
    #[must_use]
    pub const fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Metrics for the gradient combination.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (_, max_magnitude) = value_range(&self.gradient.magnitude);
        StageMetrics::Gradient {
            max_magnitude,
            nonzero_count: self
                .gradient
                .magnitude
                .iter()
                .filter(|&&m| m != 0.0)
                .count(),
        }
    }

    /// Normalize the magnitude, pick the threshold pair, and advance to
    /// [`ThresholdsResolved`].
    pub fn resolve_thresholds(self) -> ThresholdsResolved {
        let magnitude = threshold::normalize_magnitude(&self.gradient.magnitude);
        let resolved = threshold::resolve(
            self.config.lower_threshold,
            self.config.upper_threshold,
            &magnitude,
        );
        ThresholdsResolved {
            config: self.config,
            dimensions: self.dimensions,
            magnitude,
            directions: self.gradient.direction,
            resolved,
        }
    }
}

// ───────────────────────── Stage 7: ThresholdsResolved ───────────────

/// Pipeline state after threshold resolution.
#[must_use = "pipeline stages are consumed by advancing; call .suppress() to continue"]
pub struct ThresholdsResolved {
    config: DetectConfig,
    dimensions: Dimensions,
    magnitude: Vec<f64>,
    directions: Vec<Direction>,
    resolved: Resolved,
}

impl ThresholdsResolved {
    /// Magnitude divided by its maximum, in `[0, 1]`.
    #[must_use]
    pub fn normalized_magnitude(&self) -> &[f64] {
        &self.magnitude
    }

    /// Quantized gradient direction per pixel.
    #[must_use]
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// The threshold pair that will be applied.
    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        self.resolved.thresholds
    }

    /// Whether the pair was estimated rather than supplied.
    #[must_use]
    pub const fn estimated(&self) -> bool {
        self.resolved.estimated
    }

    /// Metrics for threshold resolution.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Thresholds {
            lower: self.resolved.thresholds.lower,
            upper: self.resolved.thresholds.upper,
            estimated: self.resolved.estimated,
        }
    }

    /// Thin ridges with non-maximum suppression and advance to
    /// [`Suppressed`].
    pub fn suppress(self) -> Suppressed {
        let candidates = crate::nms::suppress(
            &self.magnitude,
            &self.directions,
            self.dimensions,
            self.resolved.thresholds,
        );
        Suppressed {
            config: self.config,
            dimensions: self.dimensions,
            candidates,
            resolved: self.resolved,
        }
    }
}

// ───────────────────────── Stage 8: Suppressed ───────────────────────

/// Pipeline state after non-maximum suppression.
#[must_use = "pipeline stages are consumed by advancing; call .link() to continue"]
pub struct Suppressed {
    config: DetectConfig,
    dimensions: Dimensions,
    candidates: Vec<f64>,
    resolved: Resolved,
}

impl Suppressed {
    /// Edge candidates: `1.0` strong, `0.0` suppressed, anything else
    /// weak.
    #[must_use]
    pub fn candidates(&self) -> &[f64] {
        &self.candidates
    }

    /// Metrics for the suppression step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Suppression {
            candidate_count: self.candidates.iter().filter(|&&v| v != 0.0).count(),
            strong_count: self.candidates.iter().filter(|&&v| v == 1.0).count(),
        }
    }

    /// Link weak candidates to strong edges and advance to [`Linked`].
    pub fn link(self) -> Linked {
        let LinkOutcome {
            values,
            passes,
            promoted,
        } = crate::hysteresis::link(
            self.candidates,
            self.dimensions,
            self.resolved.thresholds,
            self.config.hysteresis_mode(),
        );
        Linked {
            edges: EdgeMask::new(self.dimensions, values),
            resolved: self.resolved,
            passes,
            promoted,
        }
    }
}

// ───────────────────────── Stage 9: Linked ───────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`Detection`].
#[must_use = "call .into_result() to extract the Detection"]
pub struct Linked {
    edges: EdgeMask,
    resolved: Resolved,
    passes: usize,
    promoted: usize,
}

impl Linked {
    /// The binary edge mask.
    #[must_use]
    pub const fn edges(&self) -> &EdgeMask {
        &self.edges
    }

    /// The threshold pair that was applied.
    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        self.resolved.thresholds
    }

    /// The [`Stage::GradientMagnitude`] progress event carrying the mask
    /// and the applied thresholds.
    #[must_use]
    pub fn event(&self) -> StageEvent {
        StageEvent::from_normalized(Stage::GradientMagnitude, self.edges.values())
            .with_thresholds(self.resolved.thresholds)
    }

    /// Metrics for edge linking.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Hysteresis {
            passes: self.passes,
            promoted: self.promoted,
            edge_pixel_count: self.edges.edge_count(),
            total_pixel_count: self.edges.dimensions().pixel_count(),
        }
    }

    /// Consume the pipeline and return the [`Detection`].
    #[must_use]
    pub fn into_result(self) -> Detection {
        Detection {
            edges: self.edges,
            thresholds: self.resolved.thresholds,
            estimated: self.resolved.estimated,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental Canny edge detector.
///
/// Created via [`Pipeline::new`], which validates the input and returns
/// the [`Pending`] stage.
pub struct Pipeline;

impl Pipeline {
    /// Validate the input and start a pipeline.
    ///
    /// `pixels` holds 4 bytes per pixel, row-major, in the layout named
    /// by `config.channel_order`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ZeroDimension`] or
    /// [`PipelineError::DimensionOverflow`] for unusable dimensions,
    /// [`PipelineError::BufferLength`] if `pixels` is not
    /// `width * height * 4` bytes, and
    /// [`PipelineError::InvalidThreshold`] for a NaN threshold.
    pub fn new(
        pixels: &[u8],
        dimensions: Dimensions,
        config: DetectConfig,
    ) -> Result<Pending<'_>, PipelineError> {
        let expected = dimensions.rgba_len()?;
        if pixels.len() != expected {
            return Err(PipelineError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        threshold::validate(config.lower_threshold, "lower")?;
        threshold::validate(config.upper_threshold, "upper")?;
        Ok(Pending {
            config,
            dimensions,
            pixels,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::RgbaImage;

    /// Dark for `x < width / 2`, bright otherwise.
    fn sharp_edge(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _y| {
            if x < width / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    fn start(img: &RgbaImage, config: DetectConfig) -> Pending<'_> {
        Pipeline::new(
            img.as_raw(),
            Dimensions::new(img.width(), img.height()),
            config,
        )
        .unwrap()
    }

    #[test]
    fn pending_exposes_inputs() {
        let img = sharp_edge(6, 4);
        let pending = start(&img, DetectConfig::default());
        assert_eq!(pending.pixels().len(), 6 * 4 * 4);
        assert_eq!(pending.dimensions(), Dimensions::new(6, 4));
        assert_eq!(pending.config(), &DetectConfig::default());
    }

    #[test]
    fn new_rejects_short_buffer() {
        let result = Pipeline::new(&[0; 15], Dimensions::new(2, 2), DetectConfig::default());
        assert_eq!(
            result.err(),
            Some(PipelineError::BufferLength {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        let result = Pipeline::new(&[], Dimensions::new(0, 0), DetectConfig::default());
        assert!(matches!(result, Err(PipelineError::ZeroDimension { .. })));
    }

    #[test]
    fn new_rejects_nan_threshold() {
        let config = DetectConfig {
            upper_threshold: Some(f64::NAN),
            ..DetectConfig::default()
        };
        let result = Pipeline::new(&[0; 4], Dimensions::new(1, 1), config);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidThreshold { which: "upper", .. })
        ));
    }

    #[test]
    fn grayscaled_exposes_gray() {
        let img = sharp_edge(6, 4);
        let grayscaled = start(&img, DetectConfig::default()).grayscale();
        assert_eq!(grayscaled.gray().len(), 24);
        assert!(grayscaled.gray()[0].abs() < 1e-9);
        let event = grayscaled.event();
        assert_eq!(event.stage, Stage::Grayscale);
        assert_eq!(event.data.unwrap().len(), 24 * 4);
    }

    #[test]
    fn normalized_event_has_no_payload() {
        let img = sharp_edge(6, 4);
        let normalized = start(&img, DetectConfig::default()).grayscale().normalize();
        assert!(normalized.normalized().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(normalized.event(), StageEvent::signal(Stage::Normalized));
    }

    #[test]
    fn derivatives_have_image_length() {
        let img = sharp_edge(6, 4);
        let derived = start(&img, DetectConfig::default())
            .grayscale()
            .normalize()
            .blur()
            .derive_x()
            .derive_y();
        assert_eq!(derived.gx().len(), 24);
        assert_eq!(derived.gy().len(), 24);
        assert_eq!(derived.event().stage, Stage::YAxis);
    }

    #[test]
    fn thresholds_are_estimated_by_default() {
        let img = sharp_edge(10, 10);
        let resolved = start(&img, DetectConfig::default())
            .grayscale()
            .normalize()
            .blur()
            .derive_x()
            .derive_y()
            .gradient()
            .resolve_thresholds();
        assert!(resolved.estimated());
        let t = resolved.thresholds();
        assert!(t.upper > 0.0 && t.upper <= 1.0);
        assert!((t.lower - 0.4 * t.upper).abs() < 1e-12);
        assert_eq!(resolved.directions().len(), 100);
    }

    #[test]
    fn supplied_thresholds_are_used() {
        let img = sharp_edge(10, 10);
        let linked = start(&img, DetectConfig::with_thresholds(0.1, 0.3))
            .grayscale()
            .normalize()
            .blur()
            .derive_x()
            .derive_y()
            .gradient()
            .resolve_thresholds()
            .suppress()
            .link();
        assert_eq!(linked.thresholds(), Thresholds::new(0.1, 0.3));
        let detection = linked.into_result();
        assert!(!detection.estimated);
        assert!(detection.edges.edge_count() > 0);
    }

    #[test]
    fn final_event_carries_mask_and_thresholds() {
        let img = sharp_edge(10, 10);
        let linked = start(&img, DetectConfig::default())
            .grayscale()
            .normalize()
            .blur()
            .derive_x()
            .derive_y()
            .gradient()
            .resolve_thresholds()
            .suppress()
            .link();
        let event = linked.event();
        assert_eq!(event.stage, Stage::GradientMagnitude);
        assert_eq!(event.thresholds, Some(linked.thresholds()));
        let data = event.data.unwrap();
        assert_eq!(data, linked.edges().to_rgba_bytes());
    }

    #[test]
    fn metrics_report_each_stage() {
        let img = sharp_edge(10, 10);
        let grayscaled = start(&img, DetectConfig::default()).grayscale();
        assert!(matches!(
            grayscaled.metrics(),
            StageMetrics::Grayscale {
                width: 10,
                height: 10,
                ..
            }
        ));
        let suppressed = grayscaled
            .normalize()
            .blur()
            .derive_x()
            .derive_y()
            .gradient()
            .resolve_thresholds()
            .suppress();
        let StageMetrics::Suppression {
            candidate_count,
            strong_count,
        } = suppressed.metrics()
        else {
            panic!("expected suppression metrics");
        };
        assert!(strong_count <= candidate_count);
        let StageMetrics::Hysteresis {
            edge_pixel_count,
            total_pixel_count,
            ..
        } = suppressed.link().metrics()
        else {
            panic!("expected hysteresis metrics");
        };
        assert_eq!(total_pixel_count, 100);
        assert!(edge_pixel_count <= total_pixel_count);
    }
}
